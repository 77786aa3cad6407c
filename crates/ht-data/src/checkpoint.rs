//! Durable checkpoints for resuming an interrupted calibration run.
//!
//! Two files live in the job working directory: one per calibration target
//! (`{id}_state.json`, the full table plus best state) and one for the
//! search itself (`search_state.json`, the completed iteration and the RNG
//! so a resumed run replays the same draw sequence). Writes go through a
//! temp file and an atomic rename; a crash mid-write leaves the previous
//! checkpoint intact.

use std::fs;
use std::path::{Path, PathBuf};

use ht_types::{CalibrationError, CalibrationTable, HtResult};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot of a single calibration target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCheckpoint {
    pub table: CalibrationTable,
    pub best_score: Option<f64>,
    pub best_iteration: u32,
}

/// Snapshot of the driver's position in the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCheckpoint {
    /// Last iteration whose evaluation and checkpoint both completed.
    pub completed_iteration: u32,
    /// RNG state as of the end of `completed_iteration`.
    pub rng: ChaCha8Rng,
}

/// Checkpoint file manager rooted at a job working directory.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    workdir: PathBuf,
}

impl CheckpointStore {
    pub fn new<P: AsRef<Path>>(workdir: P) -> HtResult<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        fs::create_dir_all(&workdir)?;
        Ok(Self { workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn calibration_path(&self, id: &str) -> PathBuf {
        self.workdir.join(format!("{id}_state.json"))
    }

    fn search_path(&self) -> PathBuf {
        self.workdir.join("search_state.json")
    }

    pub fn save_calibration(&self, id: &str, checkpoint: &CalibrationCheckpoint) -> HtResult<()> {
        self.write_atomic(&self.calibration_path(id), checkpoint)
    }

    pub fn load_calibration(&self, id: &str) -> HtResult<Option<CalibrationCheckpoint>> {
        self.read_optional(&self.calibration_path(id))
    }

    pub fn save_search(&self, checkpoint: &SearchCheckpoint) -> HtResult<()> {
        self.write_atomic(&self.search_path(), checkpoint)
    }

    pub fn load_search(&self) -> HtResult<Option<SearchCheckpoint>> {
        self.read_optional(&self.search_path())
    }

    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> HtResult<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "wrote checkpoint");
        Ok(())
    }

    fn read_optional<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> HtResult<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let value = serde_json::from_slice(&bytes).map_err(|e| CalibrationError::Checkpoint {
            message: format!("cannot decode {}: {}", path.display(), e),
        })?;
        Ok(Some(value))
    }
}
