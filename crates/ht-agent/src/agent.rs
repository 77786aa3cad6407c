//! The agent: single point of contact with the external model process.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use ht_types::{HtResult, ModelError, ParamUpdate};
use tracing::{debug, info};

use crate::config::ConfigWriter;

/// What the search driver needs from a model runner.
///
/// `CommandAgent` is the production implementation; tests substitute stubs
/// that compute output in-process.
pub trait Agent {
    /// Write one iteration's parameter values into the model's native
    /// configuration.
    fn update_config(&mut self, iteration: u32, updates: &[ParamUpdate], id: &str) -> HtResult<()>;

    /// Run the model to completion. A nonzero exit is fatal; there is no
    /// retry.
    fn execute(&mut self) -> HtResult<()>;

    /// The job working directory shared with the model.
    fn workdir(&self) -> &Path;

    /// The model command, for progress reporting.
    fn command(&self) -> &str;
}

/// Runs the model as a blocking `sh -c` subprocess in the job workdir.
///
/// Stdout/stderr are discarded unless a log file is configured, in which
/// case both streams append to it.
pub struct CommandAgent {
    cmd: String,
    workdir: PathBuf,
    log_file: Option<PathBuf>,
    writer: Box<dyn ConfigWriter>,
}

impl CommandAgent {
    pub fn new(
        cmd: impl Into<String>,
        workdir: impl Into<PathBuf>,
        writer: Box<dyn ConfigWriter>,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            workdir: workdir.into(),
            log_file: None,
            writer,
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

impl Agent for CommandAgent {
    fn update_config(&mut self, iteration: u32, updates: &[ParamUpdate], id: &str) -> HtResult<()> {
        debug!(iteration, id, count = updates.len(), "writing model config");
        self.writer.write(iteration, updates, id)
    }

    fn execute(&mut self) -> HtResult<()> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(&self.cmd).current_dir(&self.workdir);

        match &self.log_file {
            Some(path) => {
                let log = OpenOptions::new().create(true).append(true).open(path)?;
                let log_err = log.try_clone()?;
                command.stdout(log).stderr(log_err);
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        info!(cmd = %self.cmd, workdir = %self.workdir.display(), "executing model");
        let status = command.status().map_err(|source| ModelError::SpawnFailed {
            cmd: self.cmd.clone(),
            source,
        })?;

        if !status.success() {
            let err = match status.code() {
                Some(code) => ModelError::NonZeroExit {
                    cmd: self.cmd.clone(),
                    status: code,
                },
                None => ModelError::Terminated {
                    cmd: self.cmd.clone(),
                },
            };
            return Err(err.into());
        }
        Ok(())
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn command(&self) -> &str {
        &self.cmd
    }
}
