//! Scoped working-directory changes with guaranteed restore.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Changes the process working directory until dropped.
///
/// The previous directory is restored on every exit path, including panics
/// and early returns. The working directory is process-wide state, so scopes
/// must not be nested across threads.
#[derive(Debug)]
pub struct WorkdirGuard {
    previous: PathBuf,
}

impl WorkdirGuard {
    pub fn enter<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let previous = env::current_dir()?;
        env::set_current_dir(dir.as_ref())?;
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            warn!(
                previous = %self.previous.display(),
                error = %e,
                "failed to restore working directory"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The working directory is process-wide, so this single test covers
    // enter, scoped state, and restore together.
    #[test]
    fn enter_changes_and_drop_restores() {
        let before = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();

        {
            let guard = WorkdirGuard::enter(dir.path()).unwrap();
            assert_eq!(guard.previous(), before.as_path());
            assert_eq!(
                env::current_dir().unwrap().canonicalize().unwrap(),
                dir.path().canonicalize().unwrap()
            );
        }
        assert_eq!(env::current_dir().unwrap(), before);

        assert!(WorkdirGuard::enter(dir.path().join("missing")).is_err());
        assert_eq!(env::current_dir().unwrap(), before);
    }
}
