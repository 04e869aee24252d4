use std::path::PathBuf;

/// Settings for a [MergeSort](crate::merge_sort::MergeSort).
///
/// * temporary partitions are created in the current directory
/// * the memory budget is 190 size units, see [with_max_memory](Config::with_max_memory)
/// * partition files are named `partition-<random>.sorted`
///
/// # Examples
/// ```
/// use dump_merge_sort::config::Config;
///
/// let config = Config::new()
///     .with_tmp_dir(std::env::temp_dir())
///     .with_max_memory(100_000_000);
/// assert_eq!(config.max_memory(), 100_000_000);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    max_memory: usize,
}

impl Config {
    /// Create the default configuration.
    pub fn new() -> Config {
        Config {
            tmp: PathBuf::from("."),
            tmp_prefix: "partition-".to_string(),
            tmp_suffix: ".sorted".to_string(),
            max_memory: 190,
        }
    }

    /// Set the directory for temporary partitions. For large inputs prefer a dedicated directory
    /// on a file system with enough room for a complete copy of the input.
    pub fn with_tmp_dir(mut self, tmp: PathBuf) -> Config {
        self.tmp = tmp;
        self
    }

    /// Set the memory budget. Once the estimated size of the buffered records reaches this value
    /// the buffer is sorted and spilled to a temporary partition.
    ///
    /// The estimate charges 56 units for the empty buffer, 8 units per allocated buffer slot and
    /// 49 units plus the byte length for every record.
    pub fn with_max_memory(mut self, max_memory: usize) -> Config {
        self.max_memory = max_memory;
        self
    }

    /// Set the file name prefix of temporary partitions.
    pub fn with_tmp_prefix(mut self, tmp_prefix: &str) -> Config {
        self.tmp_prefix = tmp_prefix.to_string();
        self
    }

    /// Set the file name suffix of temporary partitions.
    pub fn with_tmp_suffix(mut self, tmp_suffix: &str) -> Config {
        self.tmp_suffix = tmp_suffix.to_string();
        self
    }

    pub fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
