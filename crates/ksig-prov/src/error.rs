//! Error type shared by every signing stage.

use crate::types::KeySlot;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The step of a run that produced or checked a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Content key over the artifact's SHA-512 digest.
    Content,
    /// Log key over the SHA-512 digest of the new log entry.
    Chain,
    /// Meta-signature of an already sealed chain layer (0 = newest).
    Layer(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Content => f.write_str("content signature"),
            Stage::Chain => f.write_str("chain meta-signature"),
            Stage::Layer(depth) => write!(f, "meta-signature of chain layer {depth}"),
        }
    }
}

/// Errors that can occur while generating keys, signing, writing records or
/// verifying a chain. None of them is retried.
#[derive(Debug, Error)]
pub enum ProvError {
    #[error("failed to load {slot} key from {origin}: {reason}")]
    KeyLoad {
        slot: KeySlot,
        origin: String,
        reason: String,
    },

    #[error("failed to generate {slot} key: {reason}")]
    KeyGeneration { slot: KeySlot, reason: String },

    #[error("refusing to overwrite existing key file {}", path.display())]
    KeyExists { path: PathBuf },

    #[error("artifact not found: {artifact}: {reason}")]
    ArtifactNotFound { artifact: String, reason: String },

    #[error("{stage} could not be produced: {reason}")]
    Signing { stage: Stage, reason: String },

    #[error("{stage} failed verification against the paired public key")]
    SignatureVerification { stage: Stage },

    #[error("{field} needs {actual} bytes but the fixed width is {width}")]
    EncodingOverflow {
        field: &'static str,
        width: usize,
        actual: usize,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("another signing run holds the lock {}", path.display())]
    Locked { path: PathBuf },

    #[error("chain is truncated at layer {depth}")]
    TruncatedChain { depth: usize },

    #[error("stored digest of chain layer {depth} does not match its contents")]
    DigestMismatch { depth: usize },
}

impl ProvError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        ProvError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvError::KeyLoad { .. } | ProvError::KeyExists { .. } => "key-load",
            ProvError::KeyGeneration { .. } => "key-generation",
            ProvError::ArtifactNotFound { .. } | ProvError::Manifest { .. } => "artifact-not-found",
            ProvError::Signing { .. } | ProvError::SignatureVerification { .. } => {
                "signature-verification"
            }
            ProvError::EncodingOverflow { .. } => "encoding-overflow",
            ProvError::Io { .. } | ProvError::Locked { .. } => "io",
            ProvError::Config { .. } => "config",
            ProvError::TruncatedChain { .. } | ProvError::DigestMismatch { .. } => {
                "chain-integrity"
            }
        }
    }
}
