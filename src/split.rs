//! Split a plain-text pg_dump into one file per table with the table data sorted.
//!
//! Rows of a `COPY ... FROM stdin;` block are sorted with a [LineComparator], so two dumps of the
//! same data produce identical files and can be compared with ordinary diff tools.
//!
//! The output files are written next to the dump:
//! * `0000_prologue.sql` - everything before the first table data section
//! * `NNNN_<schema>.<table>.sql` - one file per table data section, numbered in dump order
//! * `9999_epilogue.sql` - everything after the last table data section
//!
//! Lines are written with `\n` terminators, a dump saved with `\r\n` is converted while it is read.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use regex::Regex;

use crate::compare::LineComparator;
use crate::config::Config;
use crate::merge_sort::MergeSort;

/// Default memory budget for sorting a single table.
pub const DEFAULT_MAX_MEMORY: usize = 100_000_000;

const PROLOGUE: &str = "0000_prologue.sql";
const EPILOGUE: &str = "9999_epilogue.sql";
const EPILOGUE_COUNTER: usize = 9999;
const END_OF_DATA: &str = "\\.\n";
const SEARCH_PATH: &str = "SET search_path = ";

fn normalize_terminator(mut line: String) -> (String, bool) {
    if line.ends_with("\r\n") {
        line.truncate(line.len() - 2);
        line.push('\n');
        (line, true)
    } else {
        (line, false)
    }
}

struct Patterns {
    data_comment: Regex,
    copy: Regex,
    sequence_set: Regex,
}

impl Patterns {
    fn new() -> Result<Patterns, anyhow::Error> {
        Ok(
            Patterns {
                data_comment: Regex::new(
                    r"^-- Data for Name: (?P<table>.*?); Type: TABLE DATA; Schema: (?P<schema>.*?);"
                )?,
                copy: Regex::new(r"^COPY .*? \(.*?\) FROM stdin;\n$")?,
                sequence_set: Regex::new(
                    r"^(?:-- Name: .+; Type: SEQUENCE SET; Schema: |SELECT pg_catalog\.setval\(')"
                )?,
            }
        )
    }
}

/// The file currently written to, plus blank and `--` lines waiting for the next write.
///
/// Waiting lines go to whichever file is current when the next line is written, so the
/// separator before a table data comment lands in the table's file.
struct SplitOutput {
    directory: PathBuf,
    path: PathBuf,
    writer: BufWriter<File>,
    pending: Vec<String>,
    files: Vec<PathBuf>,
}

impl SplitOutput {
    fn create(directory: &Path) -> Result<SplitOutput, anyhow::Error> {
        let path = directory.join(PROLOGUE);
        let writer = Self::open(&path)?;
        Ok(
            SplitOutput {
                directory: directory.to_path_buf(),
                path: path.clone(),
                writer,
                pending: Vec::new(),
                files: vec![path],
            }
        )
    }

    fn open(path: &Path) -> Result<BufWriter<File>, anyhow::Error> {
        let file = File::create(path)
            .with_context(|| anyhow!("path: {}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    fn switch(&mut self, file_name: &str) -> Result<(), anyhow::Error> {
        self.writer.flush()
            .with_context(|| anyhow!("path: {}", self.path.display()))?;
        let path = self.directory.join(file_name);
        log::info!("Writing {}", path.display());
        self.writer = Self::open(&path)?;
        self.path = path.clone();
        self.files.push(path);
        Ok(())
    }

    fn hold(&mut self, line: String) {
        self.pending.push(line);
    }

    fn write(&mut self, line: &str) -> Result<(), anyhow::Error> {
        self.write_pending()?;
        self.writer.write_all(line.as_bytes())
            .with_context(|| anyhow!("path: {}", self.path.display()))
    }

    fn write_pending(&mut self) -> Result<(), anyhow::Error> {
        for line in self.pending.drain(..) {
            self.writer.write_all(line.as_bytes())
                .with_context(|| anyhow!("path: {}", self.path.display()))?;
        }
        Ok(())
    }

    fn write_sorted(&mut self, rows: MergeSort<LineComparator>) -> Result<usize, anyhow::Error> {
        self.write_pending()?;
        let mut count = 0;
        for row in rows {
            let row = row.with_context(|| anyhow!("sorting rows for {}", self.path.display()))?;
            self.writer.write_all(row.as_bytes())
                .with_context(|| anyhow!("path: {}", self.path.display()))?;
            count += 1;
        }
        Ok(count)
    }

    fn finish(mut self) -> Result<Vec<PathBuf>, anyhow::Error> {
        self.write_pending()?;
        self.writer.flush()
            .with_context(|| anyhow!("path: {}", self.path.display()))?;
        Ok(self.files)
    }
}

/// Split the dump at `sql_path` into prologue, per-table and epilogue files in the same directory,
/// sorting the rows of every table. `max_memory` is the memory budget of each table's
/// [MergeSort], temporary partitions are created in the dump's directory.
///
/// Returns the paths of the written files in the order they were created.
pub fn split_sql_file(sql_path: &Path, max_memory: usize) -> Result<Vec<PathBuf>, anyhow::Error> {
    let directory = match sql_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let patterns = Patterns::new()?;
    let config = Config::new()
        .with_tmp_dir(directory.clone())
        .with_max_memory(max_memory);

    log::info!("Splitting {} into {}", sql_path.display(), directory.display());
    let file = File::open(sql_path)
        .with_context(|| anyhow!("path: {}", sql_path.display()))?;
    let mut reader = BufReader::new(file);
    let mut output = SplitOutput::create(&directory)?;
    let mut rows: Option<MergeSort<LineComparator>> = None;
    let mut counter: usize = 0;
    let mut n: usize = 0;
    let mut crlf: usize = 0;
    let mut line = String::new();

    while reader.read_line(&mut line)
        .with_context(|| anyhow!("path: {}, line: {}", sql_path.display(), n + 1))? != 0 {
        n += 1;
        let (current, converted) = normalize_terminator(std::mem::take(&mut line));
        if converted {
            crlf += 1;
        }

        if let Some(mut data) = rows.take() {
            if current == END_OF_DATA {
                let count = output.write_sorted(data)?;
                log::info!("Sorted {} rows into {}", count, output.path.display());
                output.write(&current)?;
            } else {
                data.append(current)
                    .with_context(|| anyhow!("path: {}, line: {}", sql_path.display(), n))?;
                rows = Some(data);
            }
            continue;
        }

        if current == "\n" || current == "--\n" {
            output.hold(current);
            continue;
        }

        if !current.starts_with(SEARCH_PATH) {
            if let Some(captures) = patterns.data_comment.captures(&current) {
                counter += 1;
                let file_name = format!("{:04}_{}.{}.sql", counter, &captures["schema"], &captures["table"]);
                output.switch(&file_name)?;
            } else if patterns.copy.is_match(&current) {
                log::debug!("Start of table data at line {}", n);
                rows = Some(MergeSort::new(LineComparator::new(), config.clone()));
            } else if patterns.sequence_set.is_match(&current) {
                // sequence values stay with the table they belong to
            } else if (1..EPILOGUE_COUNTER).contains(&counter) {
                counter = EPILOGUE_COUNTER;
                output.switch(EPILOGUE)?;
            }
        }
        output.write(&current)?;
    }

    if crlf > 0 {
        log::info!("Converted {} CRLF line terminators in {}", crlf, sql_path.display());
    }
    if rows.is_some() {
        log::warn!("{} ended inside a COPY block, unterminated rows were dropped", sql_path.display());
    }
    output.finish()
}
