use parking_lot::Mutex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::trace;

use super::rows::{managed_rows, native_rows, SummaryRow};
use crate::batch::UnitOutcome;
use crate::error::IoError;
use crate::registry::AlgorithmRegistry;

pub const MANAGED_FILE: &str = "managed.jsonl";
pub const NATIVE_FILE: &str = "native.jsonl";
pub const SUMMARY_FILE: &str = "summary.jsonl";

/// A JSON Lines file shared by every worker. Each call writes its rows as
/// one contiguous block under the lock.
pub struct JsonlSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| IoError::write_error(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_rows<T: Serialize>(&self, rows: &[T]) -> Result<(), IoError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut block = String::new();
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| IoError::serialize_error(&self.path, e.to_string()))?;
            block.push_str(&line);
            block.push('\n');
        }

        let mut writer = self.writer.lock();
        writer
            .write_all(block.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| IoError::write_error(&self.path, e))?;
        trace!(path = %self.path.display(), rows = rows.len(), "rows written");
        Ok(())
    }
}

/// The three output streams of a batch.
pub struct ReportSinks {
    managed: Option<JsonlSink>,
    native: JsonlSink,
    summary: JsonlSink,
}

impl ReportSinks {
    /// Create the sink files in `dir`. The managed stream is omitted when
    /// managed analysis is disabled.
    pub fn create<P: AsRef<Path>>(dir: P, with_managed: bool) -> Result<Self, IoError> {
        let dir = dir.as_ref();
        let managed = if with_managed {
            Some(JsonlSink::create(dir.join(MANAGED_FILE))?)
        } else {
            None
        };
        Ok(Self {
            managed,
            native: JsonlSink::create(dir.join(NATIVE_FILE))?,
            summary: JsonlSink::create(dir.join(SUMMARY_FILE))?,
        })
    }

    /// Write every row of one finished unit. Detail rows exist only for
    /// completed units; every unit gets a summary row.
    pub fn write_unit(
        &self,
        outcome: &UnitOutcome,
        registry: &AlgorithmRegistry,
    ) -> Result<(), IoError> {
        if let Some(report) = &outcome.report {
            if let Some(managed) = &self.managed {
                managed.write_rows(&managed_rows(report, registry))?;
            }
            self.native.write_rows(&native_rows(report, registry))?;
        }
        self.summary.write_rows(&[SummaryRow::from_outcome(outcome)])
    }
}
