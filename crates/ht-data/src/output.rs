//! Reading the external model's simulated output series.

use std::path::{Path, PathBuf};

use ht_types::{HtResult, TimeSeries};
use tracing::debug;

use crate::observations::read_series_csv;

/// Access to the simulated series the model writes each run.
///
/// The concrete format belongs to the external model; the driver only needs
/// to read the current output and, best-effort, archive a copy per iteration.
pub trait OutputReader: Send {
    /// The current model output, or `None` if the model has not produced
    /// any output yet (e.g. before the baseline run).
    fn read(&mut self) -> HtResult<Option<TimeSeries>>;

    /// Keep a copy of the raw output for `iteration`, for audit/debugging.
    /// Callers treat failure as non-fatal.
    fn archive(&self, iteration: u32, id: &str) -> std::io::Result<()>;
}

/// Reads model output from a `timestamp,value` CSV file.
#[derive(Debug, Clone)]
pub struct CsvOutputReader {
    path: PathBuf,
}

impl CsvOutputReader {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputReader for CsvOutputReader {
    fn read(&mut self) -> HtResult<Option<TimeSeries>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no model output yet");
            return Ok(None);
        }
        read_series_csv(&self.path).map(Some)
    }

    fn archive(&self, iteration: u32, id: &str) -> std::io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let archived = dir.join(format!("{id}_output_iter{iteration:04}.csv"));
        std::fs::copy(&self.path, archived)?;
        Ok(())
    }
}
