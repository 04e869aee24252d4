//! This crate implements an external merge sort for text records, lines that may not fit in
//! memory, ordered by a caller supplied comparator.
//!
//! Records are buffered until their estimated size reaches a memory budget, then sorted and
//! spilled to temporary partition files. Reading the output merges all partitions lazily, one
//! record at a time. The same comparator orders the spilled partitions and the merge, so the
//! output does not depend on how many partitions were spilled.
//!
//! The motivation for this crate is making
//! [pg_dump](https://www.postgresql.org/docs/current/app-pgdump.html) output diff-friendly:
//! PostgreSQL dumps table rows in no particular order, and [split::split_sql_file] rewrites a
//! plain-text dump as one file per table with the rows of each table sorted by
//! [compare::LineComparator], which compares TAB separated fields and treats numeric looking
//! fields as numbers. The `pg_dump_splitsort` binary exposes it on the command line.
//!
//! # Examples
//! ```
//! use dump_merge_sort::compare::LineComparator;
//! use dump_merge_sort::config::Config;
//! use dump_merge_sort::merge_sort::MergeSort;
//!
//! fn sort_rows(rows: Vec<String>) -> Result<Vec<String>, anyhow::Error> {
//!     // partitions are spilled to the given directory once the buffered rows exceed the budget
//!     let config = Config::new()
//!         .with_tmp_dir(std::env::temp_dir())
//!         .with_max_memory(1_000);
//!     let mut merge_sort = MergeSort::new(LineComparator::new(), config);
//!     for row in rows {
//!         merge_sort.append(row)?;
//!     }
//!
//!     let mut sorted = Vec::new();
//!     while let Some(row) = merge_sort.pull()? {
//!         sorted.push(row);
//!     }
//!     Ok(sorted)
//! }
//!
//! let rows = (0..100).rev().map(|i| format!("{i}\trow {i}\n")).collect();
//! let sorted = sort_rows(rows)?;
//! assert_eq!(sorted[0], "0\trow 0\n");
//! assert_eq!(sorted[99], "99\trow 99\n");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!

pub(crate) mod key;
pub(crate) mod partition;

pub mod compare;
pub mod config;
pub mod error;
pub mod merge_sort;
pub mod split;
