use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use infer_core::{InferError, InferResult};

/// Host-wide claim on a session identifier, held for the lifetime of a run.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    pub fn path_for(dir: &Path, id: u8) -> PathBuf {
        dir.join(format!("{id}.lock"))
    }

    pub fn acquire(dir: &Path, id: u8) -> InferResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path_for(dir, id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(InferError::SessionBusy(id))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!("acquired {}", path.display());
        Ok(Self { path })
    }

    /// Remove a lock left behind by a run that did not exit cleanly.
    pub fn release_stale(dir: &Path, id: u8) -> InferResult<bool> {
        match std::fs::remove_file(Self::path_for(dir, id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("cannot remove {}: {e}", self.path.display());
        }
    }
}
