//! PID lock file preventing overlapping fetch runs.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Held for the duration of a fetch run; the file is removed on drop.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

/// Result of trying to take the lock.
#[derive(Debug)]
pub enum LockOutcome {
    Acquired(LockFile),
    /// Another run holds the lock. Carries the PID it recorded.
    Held { pid: String },
}

impl LockFile {
    /// Create the lock file with this process's PID, unless it already exists.
    pub fn acquire(path: &Path) -> Result<LockOutcome> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory {}", parent.display()))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())
                    .with_context(|| format!("Failed to write lock file {}", path.display()))?;
                debug!(path = %path.display(), "Acquired lock");
                Ok(LockOutcome::Acquired(LockFile {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                Ok(LockOutcome::Held { pid })
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to create lock file {}", path.display()))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}
