use std::io;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::{Builder, NamedTempFile};

use crate::config::Config;
use crate::error::{Result, SortError};

pub(crate) fn create_tmp_file(config: &Config) -> Result<NamedTempFile> {
    Builder::new()
        .prefix(config.tmp_prefix())
        .suffix(config.tmp_suffix())
        .tempfile_in(config.tmp())
        .map_err(|e| SortError::storage(config.tmp(), e))
}

/// A sorted run of records spilled to a temporary file.
///
/// Records are stored as a little endian `u64` byte length followed by the UTF-8 bytes, so
/// records without a line terminator or with embedded newlines read back unchanged. The file is
/// deleted when the partition, or the reader it turns into, is dropped.
#[derive(Debug)]
pub(crate) struct Partition {
    file: NamedTempFile,
    records: usize,
    bytes: u64,
}

impl Partition {
    pub(crate) fn write(records: &[String], config: &Config) -> Result<Partition> {
        let mut file = create_tmp_file(config)?;
        let bytes = Self::write_records(&mut file, records)
            .map_err(|e| SortError::storage(file.path(), e))?;
        Ok(
            Partition {
                file,
                records: records.len(),
                bytes,
            }
        )
    }

    fn write_records(file: &mut NamedTempFile, records: &[String]) -> io::Result<u64> {
        let mut bytes = 0;
        let mut writer = BufWriter::new(file.as_file_mut());
        for record in records {
            writer.write_all(&(record.len() as u64).to_le_bytes())?;
            writer.write_all(record.as_bytes())?;
            bytes += record.len() as u64;
        }
        writer.flush()?;
        Ok(bytes)
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Rewind the partition and read it from the start.
    pub(crate) fn into_reader(self) -> Result<PartitionReader> {
        let path = self.file.path().to_path_buf();
        let mut file = self.file;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| SortError::storage(&path, e))?;
        Ok(
            PartitionReader {
                path,
                reader: BufReader::new(file),
                remaining: self.records,
            }
        )
    }

    #[cfg(test)]
    pub(crate) fn contents(&self) -> Result<Vec<String>> {
        let file = self.file
            .reopen()
            .map_err(|e| SortError::storage(self.file.path(), e))?;
        let mut reader = PartitionReader {
            path: self.file.path().to_path_buf(),
            reader: BufReader::new(file),
            remaining: self.records,
        };
        let mut records = Vec::with_capacity(self.records);
        while let Some(record) = reader.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

pub(crate) struct PartitionReader<R = NamedTempFile> {
    path: PathBuf,
    reader: BufReader<R>,
    remaining: usize,
}

impl<R: Read> PartitionReader<R> {
    pub(crate) fn next_record(&mut self) -> Result<Option<String>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let record = self.read_record()
            .map_err(|e| SortError::storage(&self.path, e))?;
        self.remaining -= 1;
        Ok(Some(record))
    }

    fn read_record(&mut self) -> io::Result<String> {
        let mut length = [0u8; 8];
        self.reader.read_exact(&mut length)?;
        let mut bytes = vec![0u8; u64::from_le_bytes(length) as usize];
        self.reader.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
