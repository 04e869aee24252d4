use std::cmp::{max, Ordering};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::compare::{Compare, NaturalOrder};
use crate::config::Config;
use crate::error::{Result, SortError};
use crate::partition::{Partition, PartitionReader};

const EMPTY_BUFFER_COST: usize = 56;
const SLOT_COST: usize = 8;
const RECORD_OVERHEAD: usize = 49;

fn buffer_cost(len: usize) -> usize {
    if len == 0 {
        EMPTY_BUFFER_COST
    } else {
        EMPTY_BUFFER_COST + SLOT_COST * max(4, len.next_power_of_two())
    }
}

fn record_cost(record: &str) -> usize {
    RECORD_OVERHEAD + record.len()
}

/// Stable top-down merge sort.
///
/// Unlike `slice::sort_by` it never checks the comparator for consistency, so a comparator that
/// is not a total order cannot make it panic. Equal records keep their input order, which is the
/// same rule the partition merge applies.
fn sort_records<C: Compare>(mut records: Vec<String>, comparator: &C) -> Vec<String> {
    if records.len() < 2 {
        return records;
    }
    let right = records.split_off(records.len() / 2);
    let left = sort_records(records, comparator);
    let right = sort_records(right, comparator);
    if comparator.compare(&left[left.len() - 1], &right[0]) != Ordering::Greater {
        let mut merged = left;
        merged.extend(right);
        return merged;
    }

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => comparator.compare(r, l) == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged
}

enum State<C> {
    Ingesting,
    InMemory(std::vec::IntoIter<String>),
    Merging(BinaryHeap<MergeHead<C>>),
    Exhausted,
}

struct MergeHead<C> {
    record: String,
    index: usize,
    reader: PartitionReader,
    comparator: Arc<C>,
}

impl<C: Compare> Eq for MergeHead<C> {}

impl<C: Compare> PartialEq<Self> for MergeHead<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C: Compare> PartialOrd<Self> for MergeHead<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: Compare> Ord for MergeHead<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        // flipped to work with BinaryHeap (max heap), equal records come from the oldest partition
        self.comparator
            .compare(&other.record, &self.record)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// External merge sort over text records.
///
/// Records are buffered in memory until their estimated size reaches the configured budget, then
/// the buffer is sorted and spilled to a temporary partition. The first call to
/// [pull](MergeSort::pull) ends the input: if nothing was spilled the buffer is sorted in memory,
/// otherwise the residue is spilled as a last partition and all partitions are merged lazily,
/// one record per pull.
///
/// The comparator is fixed when the sort is created and orders both the spilled partitions and
/// the merge. Temporary partitions are deleted when the sort is dropped or, during the merge, as
/// soon as they are exhausted.
///
/// # Examples
/// ```
/// use dump_merge_sort::compare::LineComparator;
/// use dump_merge_sort::config::Config;
/// use dump_merge_sort::merge_sort::MergeSort;
///
/// fn sort_rows(rows: &[&str]) -> Result<Vec<String>, dump_merge_sort::error::SortError> {
///     let config = Config::new()
///         .with_tmp_dir(std::env::temp_dir())
///         .with_max_memory(200);
///     let mut merge_sort = MergeSort::new(LineComparator::new(), config);
///     for row in rows {
///         merge_sort.append(*row)?;
///     }
///     merge_sort.collect()
/// }
///
/// let sorted = sort_rows(&["10\tb\n", "2\tz\n", "2\ta\n"])?;
/// assert_eq!(sorted, vec!["2\ta\n", "2\tz\n", "10\tb\n"]);
/// # Ok::<(), dump_merge_sort::error::SortError>(())
/// ```
pub struct MergeSort<C: Compare = NaturalOrder> {
    comparator: Arc<C>,
    config: Config,
    buffer: Vec<String>,
    memory_used: usize,
    partitions: Vec<Partition>,
    spilled: usize,
    state: State<C>,
}

impl<C: Compare> MergeSort<C> {
    /// Create a merge sort ordered by `comparator`.
    pub fn new(comparator: C, config: Config) -> MergeSort<C> {
        let mut merge_sort = MergeSort {
            comparator: Arc::new(comparator),
            config,
            buffer: Vec::new(),
            memory_used: 0,
            partitions: Vec::new(),
            spilled: 0,
            state: State::Ingesting,
        };
        merge_sort.reset_buffer();
        merge_sort
    }

    /// Add a record to the input.
    ///
    /// Fails with [SortError::InvalidState] once the output started being read, and with
    /// [SortError::Storage] when the record pushes the buffer over the budget and the buffer
    /// cannot be spilled.
    pub fn append<S: Into<String>>(&mut self, record: S) -> Result<()> {
        if !matches!(self.state, State::Ingesting) {
            return Err(SortError::InvalidState);
        }
        let record = record.into();
        self.memory_used -= buffer_cost(self.buffer.len());
        self.memory_used += buffer_cost(self.buffer.len() + 1) + record_cost(&record);
        self.buffer.push(record);
        if self.memory_used >= self.config.max_memory() {
            self.flush()?;
        }
        Ok(())
    }

    /// Get the next record in sorted order.
    ///
    /// Returns `Ok(None)` once every record was returned, and keeps returning it on later calls.
    /// The first call ends the input.
    pub fn pull(&mut self) -> Result<Option<String>> {
        if matches!(self.state, State::Ingesting) {
            match self.start_draining() {
                Ok(state) => {
                    self.state = state;
                }
                Err(e) => {
                    self.state = State::Exhausted;
                    return Err(e);
                }
            }
        }

        let pulled = match &mut self.state {
            State::InMemory(records) => Ok(records.next()),
            State::Merging(heads) => Self::pull_merged(heads),
            State::Ingesting | State::Exhausted => Ok(None),
        };

        match pulled {
            Ok(Some(record)) => Ok(Some(record)),
            other => {
                self.state = State::Exhausted;
                other
            }
        }
    }

    /// True once the output started being read.
    pub fn is_draining(&self) -> bool {
        !matches!(self.state, State::Ingesting)
    }

    /// Number of partitions spilled so far.
    pub fn partitions(&self) -> usize {
        self.spilled
    }

    /// Number of records currently held in memory.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Estimated size of the in-memory buffer.
    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let records = sort_records(std::mem::take(&mut self.buffer), self.comparator.as_ref());
            let partition = Partition::write(&records, &self.config)?;
            log::debug!(
                "Spilled partition {}, records: {}, bytes: {}",
                self.spilled,
                partition.records(),
                partition.bytes(),
            );
            self.partitions.push(partition);
            self.spilled += 1;
        }
        self.reset_buffer();
        Ok(())
    }

    fn reset_buffer(&mut self) {
        self.buffer = Vec::new();
        self.memory_used = buffer_cost(0);
    }

    fn start_draining(&mut self) -> Result<State<C>> {
        if self.partitions.is_empty() {
            let records = sort_records(std::mem::take(&mut self.buffer), self.comparator.as_ref());
            self.reset_buffer();
            log::debug!("Sorted {} records in memory", records.len());
            Ok(State::InMemory(records.into_iter()))
        } else {
            self.flush()?;
            let partitions = std::mem::take(&mut self.partitions);
            log::debug!("Merging {} partitions", partitions.len());
            let mut heads = BinaryHeap::with_capacity(partitions.len());
            for (index, partition) in partitions.into_iter().enumerate() {
                let mut reader = partition.into_reader()?;
                if let Some(record) = reader.next_record()? {
                    heads.push(
                        MergeHead {
                            record,
                            index,
                            reader,
                            comparator: self.comparator.clone(),
                        }
                    );
                }
            }
            Ok(State::Merging(heads))
        }
    }

    fn pull_merged(heads: &mut BinaryHeap<MergeHead<C>>) -> Result<Option<String>> {
        let mut head = match heads.pop() {
            Some(head) => head,
            None => return Ok(None),
        };
        match head.reader.next_record()? {
            Some(next) => {
                let record = std::mem::replace(&mut head.record, next);
                heads.push(head);
                Ok(Some(record))
            }
            // the exhausted partition is dropped here, releasing its file
            None => Ok(Some(head.record)),
        }
    }
}

impl Default for MergeSort<NaturalOrder> {
    fn default() -> Self {
        MergeSort::new(NaturalOrder, Config::default())
    }
}

impl<C: Compare> Iterator for MergeSort<C> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pull().transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;
    use std::path::Path;

    use crate::compare::{LineComparator, NaturalOrder};
    use crate::config::Config;
    use crate::error::SortError;
    use crate::merge_sort::{buffer_cost, sort_records, MergeSort, State};

    fn config(tmp: &Path, max_memory: usize) -> Config {
        Config::new()
            .with_tmp_dir(tmp.to_path_buf())
            .with_max_memory(max_memory)
    }

    fn drain<C: crate::compare::Compare>(merge_sort: &mut MergeSort<C>) -> Result<Vec<String>, SortError> {
        let mut records = Vec::new();
        while let Some(record) = merge_sort.pull()? {
            records.push(record);
        }
        Ok(records)
    }

    fn lines(values: &[u32]) -> Vec<String> {
        values.iter().map(|v| format!("{v}\n")).collect()
    }

    #[test]
    fn test_buffer_cost() {
        assert_eq!(buffer_cost(0), 56);
        assert_eq!(buffer_cost(1), 88);
        assert_eq!(buffer_cost(4), 88);
        assert_eq!(buffer_cost(5), 120);
    }

    #[test]
    fn test_sort_records_is_stable() {
        let by_first = |l: &str, r: &str| l.chars().next().cmp(&r.chars().next());
        let records: Vec<String> = ["b1", "a1", "c1", "b2", "a2", "a3", "b3"].iter().map(|r| r.to_string()).collect();
        assert_eq!(
            sort_records(records, &by_first),
            vec!["a1", "a2", "a3", "b1", "b2", "b3", "c1"]
        );
        assert!(sort_records(Vec::new(), &by_first).is_empty());
    }

    #[test]
    fn test_inconsistent_comparator_does_not_panic() -> Result<(), anyhow::Error> {
        // rock, paper, scissors: every record beats the next one
        let cyclic = |l: &str, r: &str| -> Ordering {
            let beats = |a: &str, b: &str| matches!((a, b), ("r", "s") | ("s", "p") | ("p", "r"));
            if l == r {
                Ordering::Equal
            } else if beats(l, r) {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        };
        let mut records: Vec<String> = Vec::new();
        for i in 0..500 {
            records.push(["r", "p", "s"][(i * 7 + i / 3) % 3].to_string());
        }
        let mut expected = records.clone();
        expected.sort();

        let mut sorted = sort_records(records.clone(), &cyclic);
        sorted.sort();
        assert_eq!(sorted, expected);

        for max_memory in [2_000, usize::MAX] {
            let tmp = tempfile::tempdir()?;
            let mut merge_sort = MergeSort::new(cyclic, config(tmp.path(), max_memory));
            for record in &records {
                merge_sort.append(record.as_str())?;
            }
            let mut sorted = drain(&mut merge_sort)?;
            sorted.sort();
            assert_eq!(sorted, expected);
        }
        Ok(())
    }

    #[test]
    fn test_append_spills_at_budget() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 190));
        assert_eq!(merge_sort.memory_used(), 56);

        merge_sort.append("1\n")?;
        assert_eq!(merge_sort.buffer, vec!["1\n"]);
        assert_eq!(merge_sort.memory_used(), 139);

        merge_sort.append("2\n")?;
        assert!(merge_sort.buffer.is_empty());
        assert_eq!(merge_sort.memory_used(), 56);

        merge_sort.append("3\n")?;
        assert_eq!(merge_sort.buffer, vec!["3\n"]);
        assert_eq!(merge_sort.partitions.len(), 1);
        assert_eq!(merge_sort.partitions[0].records(), 2);
        assert_eq!(merge_sort.partitions[0].bytes(), 4);
        assert_eq!(merge_sort.partitions[0].contents()?, vec!["1\n", "2\n"]);
        Ok(())
    }

    #[test]
    fn test_flush_spills_residue() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 190));
        for record in lines(&[1, 2, 3]) {
            merge_sort.append(record)?;
        }
        merge_sort.flush()?;
        assert_eq!(merge_sort.partitions(), 2);
        assert_eq!(merge_sort.partitions[0].contents()?, vec!["1\n", "2\n"]);
        assert_eq!(merge_sort.partitions[1].contents()?, vec!["3\n"]);

        // flushing an empty buffer creates nothing
        merge_sort.flush()?;
        assert_eq!(merge_sort.partitions(), 2);
        assert_eq!(merge_sort.memory_used(), 56);
        Ok(())
    }

    #[test]
    fn test_spilled_partitions_are_sorted() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(LineComparator::new(), config(tmp.path(), 190));
        merge_sort.append("10\n")?;
        merge_sort.append("9\n")?;
        assert_eq!(merge_sort.partitions[0].contents()?, vec!["9\n", "10\n"]);
        Ok(())
    }

    #[test]
    fn test_iterate_disk() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 190));
        for record in lines(&[3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 8, 4]) {
            merge_sort.append(record)?;
        }
        assert_eq!(merge_sort.partitions(), 6);
        assert_eq!(merge_sort.pull()?, Some("1\n".to_string()));
        assert!(matches!(merge_sort.state, State::Merging(_)));
        let rest = drain(&mut merge_sort)?;
        assert_eq!(rest, lines(&[1, 2, 3, 3, 4, 4, 5, 5, 6, 8, 9]));
        assert_eq!(merge_sort.pull()?, None);
        assert!(matches!(merge_sort.state, State::Exhausted));
        Ok(())
    }

    #[test]
    fn test_iterate_memory() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 1_000_000));
        for record in lines(&[3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 8, 4]) {
            merge_sort.append(record)?;
        }
        assert_eq!(merge_sort.pull()?, Some("1\n".to_string()));
        assert!(matches!(merge_sort.state, State::InMemory(_)));
        assert_eq!(merge_sort.partitions(), 0);
        let rest = drain(&mut merge_sort)?;
        assert_eq!(rest, lines(&[1, 2, 3, 3, 4, 4, 5, 5, 6, 8, 9]));
        assert_eq!(merge_sort.pull()?, None);
        assert_eq!(merge_sort.pull()?, None);
        Ok(())
    }

    #[test]
    fn test_in_memory_uses_comparator() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(LineComparator::new(), config(tmp.path(), 1_000_000));
        for record in lines(&[10, 9, 100]) {
            merge_sort.append(record)?;
        }
        assert_eq!(drain(&mut merge_sort)?, lines(&[9, 10, 100]));
        Ok(())
    }

    #[test]
    fn test_append_after_pull() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 190));
        merge_sort.append("a\n")?;
        assert!(!merge_sort.is_draining());
        assert_eq!(merge_sort.pull()?, Some("a\n".to_string()));
        assert!(merge_sort.is_draining());
        assert!(matches!(merge_sort.append("b\n"), Err(SortError::InvalidState)));

        // still rejected once exhausted
        assert_eq!(merge_sort.pull()?, None);
        assert!(matches!(merge_sort.append("b\n"), Err(SortError::InvalidState)));
        Ok(())
    }

    #[test]
    fn test_empty() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 190));
        assert_eq!(merge_sort.pull()?, None);
        assert!(matches!(merge_sort.append("a\n"), Err(SortError::InvalidState)));
        Ok(())
    }

    #[test]
    fn test_ties_prefer_oldest_partition() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        // equal by first character only, the rest tells the partitions apart
        let by_first = |l: &str, r: &str| l.chars().next().cmp(&r.chars().next());
        let mut merge_sort = MergeSort::new(by_first, config(tmp.path(), 190));
        for record in ["b1", "a1", "b2", "a2", "b3", "a3"] {
            merge_sort.append(record)?;
        }
        assert_eq!(merge_sort.partitions(), 3);
        assert_eq!(drain(&mut merge_sort)?, vec!["a1", "a2", "a3", "b1", "b2", "b3"]);
        Ok(())
    }

    #[test]
    fn test_reverse_comparator() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let reversed = |l: &str, r: &str| -> Ordering { r.cmp(l) };
        let mut merge_sort = MergeSort::new(reversed, config(tmp.path(), 190));
        for record in lines(&[3, 1, 2]) {
            merge_sort.append(record)?;
        }
        assert_eq!(drain(&mut merge_sort)?, lines(&[3, 2, 1]));
        Ok(())
    }

    #[test]
    fn test_iterator() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let mut merge_sort = MergeSort::new(NaturalOrder, config(tmp.path(), 190));
        for record in ["c", "a", "b"] {
            merge_sort.append(record)?;
        }
        let sorted = merge_sort.collect::<Result<Vec<String>, SortError>>()?;
        assert_eq!(sorted, vec!["a", "b", "c"]);
        Ok(())
    }
}
