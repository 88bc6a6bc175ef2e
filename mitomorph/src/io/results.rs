//! Append-only result tables.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::analysis::ResultRecord;
use crate::error::{Error, Result};

/// Receives one record per completed ROI, in completion order.
pub trait ResultsSink {
    fn append(&mut self, record: &ResultRecord) -> Result<()>;
}

/// Tab-separated results file. The header is written on creation and every
/// row is flushed, so an aborted run keeps the rows written so far.
#[derive(Debug)]
pub struct TsvResultsSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TsvResultsSink {
    /// Creates (or truncates) `path`, creating missing parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        let write_err = |source| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let file = File::create(path).map_err(write_err)?;
        let mut sink = Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        };
        sink.write_line(ResultRecord::TSV_HEADER)?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}")
            .and_then(|_| self.writer.flush())
            .map_err(|source| Error::Write {
                path: self.path.clone(),
                source,
            })
    }
}

impl ResultsSink for TsvResultsSink {
    fn append(&mut self, record: &ResultRecord) -> Result<()> {
        self.write_line(&record.to_tsv_row())
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<ResultRecord>,
}

impl ResultsSink for MemorySink {
    fn append(&mut self, record: &ResultRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
