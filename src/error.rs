//! Errors reported by the merge sort engine.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for merge sort operations.
pub type Result<T> = std::result::Result<T, SortError>;

/// Errors that can occur while appending to or draining a [MergeSort](crate::merge_sort::MergeSort).
///
/// Running out of records is not an error: [pull](crate::merge_sort::MergeSort::pull) reports it
/// as `Ok(None)`.
#[derive(Debug, Error)]
pub enum SortError {
    /// A record was appended after the sorted output started being read.
    #[error("cannot append after iteration has begun")]
    InvalidState,

    /// A temporary partition could not be created, written, rewound or read back.
    #[error("partition storage error, path: {}: {source}", path.display())]
    Storage {
        /// The temporary directory or partition file involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl SortError {
    pub(crate) fn storage(path: &Path, source: io::Error) -> SortError {
        SortError::Storage {
            path: path.to_path_buf(),
            source,
        }
    }
}
