//! Building and sealing chain entries.
//!
//! A run signs the artifact (content record), prepends that record to the
//! prior chain state (log entry) and meta-signs the result (log record). The
//! sealed blob `log sha256 ‖ meta-signature ‖ log entry` becomes the next
//! run's prior state, so the newest record is always at the head and every
//! historical byte is covered by every later meta-signature.

use crate::digest::digest_bytes;
use crate::error::{ProvError, Stage};
use crate::keys::{KeyPair, KeyRing};
use crate::signature::sign_and_verify;
use crate::types::{ContentRecord, Digests, LogEntry, LogRecord, SignedRun, DIGEST32_LEN};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// Sign the artifact's SHA-512 digest with the content key and verify it.
pub fn build_content_record(
    content: &KeyPair,
    digests: Digests,
) -> Result<ContentRecord, ProvError> {
    let signature = sign_and_verify(content, &digests.sha512, Stage::Content)?;
    Ok(ContentRecord { digests, signature })
}

/// `content_record ‖ prior_chain_state`. No hashing happens here.
pub fn extend_chain(content_record: &[u8], prior_chain_state: &[u8]) -> LogEntry {
    let mut bytes = Vec::with_capacity(content_record.len() + prior_chain_state.len());
    bytes.extend_from_slice(content_record);
    bytes.extend_from_slice(prior_chain_state);
    LogEntry::from_bytes(bytes)
}

/// Digest the log entry, meta-sign its SHA-512 with the log key and verify.
pub fn seal_chain(log: &KeyPair, entry: &LogEntry) -> Result<LogRecord, ProvError> {
    let digests = digest_bytes(entry.as_bytes());
    let signature = sign_and_verify(log, &digests.sha512, Stage::Chain)?;
    Ok(LogRecord { digests, signature })
}

/// The blob persisted as the new chain state.
pub fn sealed_chain_bytes(log: &LogRecord, entry: &LogEntry) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(DIGEST32_LEN + log.signature.len() + entry.len());
    bytes.extend_from_slice(&log.digests.sha256);
    bytes.extend_from_slice(&log.signature);
    bytes.extend_from_slice(entry.as_bytes());
    bytes
}

/// Read the prior chain state. A missing file is the empty chain.
pub fn read_chain_state(path: &Path) -> Result<Vec<u8>, ProvError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ProvError::io(path, e)),
    }
}

/// Run the whole in-memory pipeline for one artifact:
/// content sign → verify → extend → meta-sign → verify.
pub fn sign_run(
    ring: &KeyRing,
    artifact: Digests,
    prior_chain_state: &[u8],
) -> Result<SignedRun, ProvError> {
    let content = build_content_record(ring.content(), artifact)?;
    info!(
        environment = %ring.environment(),
        sha256 = %hex::encode(artifact.sha256),
        "content signature verified"
    );

    let entry = extend_chain(&content.to_bytes(), prior_chain_state);
    let log = seal_chain(ring.log(), &entry)?;
    info!(
        environment = %ring.environment(),
        entry_len = entry.len(),
        prior_len = prior_chain_state.len(),
        "chain meta-signature verified"
    );

    Ok(SignedRun {
        environment: ring.environment(),
        content,
        entry,
        log,
    })
}
