use std::cmp::Ordering;

use crate::key::Key;

/// A total order over text records.
///
/// The comparator is bound to a [MergeSort](crate::merge_sort::MergeSort) when it is created and
/// the same instance orders every spilled partition and the final merge, so an implementation
/// must be deterministic and free of side effects. A comparator that is not a total order never
/// makes the sort panic, but the output is then only a permutation of the input and may depend on
/// where partitions were spilled.
///
/// Any `Fn(&str, &str) -> Ordering` is a comparator.
///
/// # Examples
/// ```
/// use std::cmp::Ordering;
/// use dump_merge_sort::compare::Compare;
///
/// let reversed = |left: &str, right: &str| right.cmp(left);
/// assert_eq!(reversed.compare("a", "b"), Ordering::Greater);
/// ```
pub trait Compare {
    /// Compare two records
    fn compare(&self, left: &str, right: &str) -> Ordering;
}

impl<F> Compare for F
where
    F: Fn(&str, &str) -> Ordering,
{
    fn compare(&self, left: &str, right: &str) -> Ordering {
        self(left, right)
    }
}

/// Plain lexicographic ordering of the complete record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl Compare for NaturalOrder {
    fn compare(&self, left: &str, right: &str) -> Ordering {
        left.cmp(right)
    }
}

/// Compares delimiter separated records field by field, treating fields that look like numbers
/// as numbers.
///
/// Each record is split at the first field separator into a head and an optional rest. A head
/// that starts with one of `0123456789.-` and parses as `f64` is a number, any other head is
/// text. Two numbers compare numerically and two texts compare as strings. A number sorts after
/// text starting below `-` (such as the empty field) and before all other text, so `9` comes
/// before `1a` and `\N`. When the heads are equal and both records have a rest, the rests are
/// compared the same way.
///
/// # Examples
/// ```
/// use std::cmp::Ordering;
/// use dump_merge_sort::compare::{Compare, LineComparator};
///
/// let comparator = LineComparator::new();
/// assert_eq!(comparator.compare("2\tb\n", "10\ta\n"), Ordering::Less);
/// assert_eq!(comparator.compare("x\tb\n", "x\ta\n"), Ordering::Greater);
///
/// let csv = LineComparator::new().with_field_separator(',');
/// assert_eq!(csv.compare("7,z", "7,y"), Ordering::Greater);
/// ```
#[derive(Clone, Debug)]
pub struct LineComparator {
    field_separator: char,
}

impl LineComparator {
    /// Create a comparator for TAB separated records, the pg_dump COPY format.
    pub fn new() -> LineComparator {
        LineComparator {
            field_separator: '\t',
        }
    }

    /// Set the field separator.
    pub fn with_field_separator(mut self, field_separator: char) -> LineComparator {
        self.field_separator = field_separator;
        self
    }

    /// Get the field separator.
    pub fn field_separator(&self) -> char {
        self.field_separator
    }

    fn split<'r>(&self, record: &'r str) -> (&'r str, Option<&'r str>) {
        match record.split_once(self.field_separator) {
            Some((head, rest)) => (head, Some(rest)),
            None => (record, None),
        }
    }
}

impl Default for LineComparator {
    fn default() -> Self {
        LineComparator::new()
    }
}

impl Compare for LineComparator {
    fn compare(&self, left: &str, right: &str) -> Ordering {
        let mut left = left;
        let mut right = right;
        loop {
            let (left_head, left_rest) = self.split(left);
            let (right_head, right_rest) = self.split(right);
            let ordering = Key::new(left_head).cmp(&Key::new(right_head));
            match (ordering, left_rest, right_rest) {
                (Ordering::Equal, Some(l), Some(r)) => {
                    left = l;
                    right = r;
                }
                _ => return ordering,
            }
        }
    }
}
