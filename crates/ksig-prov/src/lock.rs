//! Single-writer lock around a chain file.

use crate::error::ProvError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held for the whole read-extend-write cycle of one run.
///
/// The lock is an OS advisory lock on `<chain>.lock`. The file itself stays
/// on disk; only the lock matters, and the OS drops it when the holding
/// process exits, however it exits.
#[derive(Debug)]
pub struct ChainLock {
    path: PathBuf,
    file: File,
}

impl ChainLock {
    /// Lock `<chain>.lock`, creating it if needed. Fails with
    /// [`ProvError::Locked`] while another live run holds it.
    pub fn acquire(chain_path: &Path) -> Result<Self, ProvError> {
        let mut name = chain_path.as_os_str().to_os_string();
        name.push(".lock");
        let path = PathBuf::from(name);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ProvError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ProvError::io(&path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(ProvError::Locked { path });
            }
            return Err(ProvError::io(&path, e));
        }

        // Informational only.
        let _ = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()));

        debug!(path = %path.display(), "chain lock acquired");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ChainLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "failed to release chain lock");
        }
    }
}
