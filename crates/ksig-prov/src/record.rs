//! Persisting a signed run.
//!
//! Three views of one [`SignedRun`] are written:
//! - the snapshot, `content sha256 ‖ content signature`;
//! - the report, one `[tag]ALGO[len]:HEX` line per signed byte string;
//! - the sealed chain blob, which replaces the prior chain state.
//!
//! All files are staged next to their targets first and renamed into place
//! only once every one of them has been written in full.

use crate::chain::sealed_chain_bytes;
use crate::config::EnvironmentLayout;
use crate::error::ProvError;
use crate::types::{ContentRecord, Role, SignedRun};
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// `content sha256 ‖ content signature`.
pub fn snapshot_bytes(record: &ContentRecord) -> Vec<u8> {
    record.to_bytes()
}

/// Render the six signed byte strings, content (`K`) first, then log (`S`).
pub fn report(run: &SignedRun) -> String {
    let mut out = String::new();
    let sections = [
        (Role::Content, &run.content.digests, &run.content.signature),
        (Role::Log, &run.log.digests, &run.log.signature),
    ];
    for (role, digests, signature) in sections {
        push_line(&mut out, role, "SHA-256", &digests.sha256);
        push_line(&mut out, role, "SHA-512", &digests.sha512);
        push_line(&mut out, role, "RSA-PSS", signature);
    }
    out
}

fn push_line(out: &mut String, role: Role, algorithm: &str, bytes: &[u8]) {
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "[{}]{}[{:04}]:{}",
        role.report_tag(),
        algorithm,
        bytes.len(),
        hex::encode_upper(bytes)
    );
}

/// Output paths of one environment.
#[derive(Debug, Clone)]
pub struct RecordWriter {
    snapshot: PathBuf,
    report: PathBuf,
    chain: PathBuf,
}

impl RecordWriter {
    pub fn new(snapshot: PathBuf, report: PathBuf, chain: PathBuf) -> Self {
        Self {
            snapshot,
            report,
            chain,
        }
    }

    pub fn for_layout(layout: &EnvironmentLayout) -> Self {
        Self::new(
            layout.snapshot.clone(),
            layout.report.clone(),
            layout.chain.clone(),
        )
    }

    /// Write all three outputs or none of them.
    ///
    /// The chain blob is renamed last so that the canonical chain state only
    /// advances once the other outputs are in place. If a rename fails, the
    /// outputs already renamed are put back to their previous contents.
    pub fn write(&self, run: &SignedRun) -> Result<(), ProvError> {
        let staged = [
            stage(&self.snapshot, &snapshot_bytes(&run.content))?,
            stage(&self.report, report(run).as_bytes())?,
            stage(&self.chain, &sealed_chain_bytes(&run.log, &run.entry))?,
        ];

        let mut previous = Vec::with_capacity(staged.len());
        for (_, target) in &staged {
            previous.push(read_replaceable(target)?);
        }

        let mut committed: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::new();
        for ((file, target), old) in staged.into_iter().zip(previous) {
            if let Err(e) = file.persist(&target) {
                let err = ProvError::io(&target, e.error);
                roll_back(committed);
                return Err(err);
            }
            committed.push((target, old));
        }

        info!(
            environment = %run.environment,
            snapshot = %self.snapshot.display(),
            report = %self.report.display(),
            chain = %self.chain.display(),
            "records written"
        );
        Ok(())
    }
}

/// Current contents of `path`, `None` if it does not exist. A target that
/// is not a regular file cannot be replaced by a rename.
fn read_replaceable(path: &Path) -> Result<Option<Vec<u8>>, ProvError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => fs::read(path)
            .map(Some)
            .map_err(|e| ProvError::io(path, e)),
        Ok(_) => Err(ProvError::io(path, io::Error::other("not a regular file"))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ProvError::io(path, e)),
    }
}

/// Restore outputs renamed before a failure, newest first.
fn roll_back(committed: Vec<(PathBuf, Option<Vec<u8>>)>) {
    for (target, old) in committed.into_iter().rev() {
        let restored = match old {
            Some(bytes) => write_atomic(&target, &bytes),
            None => fs::remove_file(&target).map_err(|e| ProvError::io(&target, e)),
        };
        if let Err(e) = restored {
            warn!(path = %target.display(), error = %e, "failed to restore output");
        }
    }
}

/// Write `contents` to a temporary file beside `path` and flush it to disk.
fn stage(path: &Path, contents: &[u8]) -> Result<(NamedTempFile, PathBuf), ProvError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|e| ProvError::io(dir, e))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| ProvError::io(dir, e))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| ProvError::io(file.path(), e))?;
    Ok((file, path.to_path_buf()))
}

/// Atomically replace `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ProvError> {
    let (file, target) = stage(path, contents)?;
    file.persist(&target)
        .map_err(|e| ProvError::io(&target, e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
