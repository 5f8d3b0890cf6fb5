//! Signing chain data structures.

use std::fmt;

/// Length of a SHA-256 digest.
pub const DIGEST32_LEN: usize = 32;

/// Length of a SHA-512 digest.
pub const DIGEST64_LEN: usize = 64;

pub type Digest32 = [u8; DIGEST32_LEN];
pub type Digest64 = [u8; DIGEST64_LEN];

/// Which key signs what.
///
/// The content key signs the artifact digest directly, the log key signs the
/// chained history (the meta-signature).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Content,
    Log,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Content, Role::Log];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Content => "content",
            Role::Log => "log",
        }
    }

    /// Tag used in front of each line of the human-readable report.
    pub fn report_tag(self) -> char {
        match self {
            Role::Content => 'K',
            Role::Log => 'S',
        }
    }

    /// File stem used for exported key arrays (`kernel_keyn.txt`, ...).
    pub fn export_stem(self) -> &'static str {
        match self {
            Role::Content => "kernel",
            Role::Log => "signature",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build flavour. Each environment has its own, unrelated keys and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Environment {
    Debug,
    Release,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Debug, Environment::Release];

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Debug => "debug",
            Environment::Release => "release",
        }
    }

    /// Capitalized name used for output directories (`sig/Debug`).
    pub fn dir_name(self) -> &'static str {
        match self {
            Environment::Debug => "Debug",
            Environment::Release => "Release",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four key pairs a full signing setup needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeySlot {
    pub role: Role,
    pub environment: Environment,
}

impl KeySlot {
    pub const ALL: [KeySlot; 4] = [
        KeySlot::new(Role::Content, Environment::Debug),
        KeySlot::new(Role::Content, Environment::Release),
        KeySlot::new(Role::Log, Environment::Debug),
        KeySlot::new(Role::Log, Environment::Release),
    ];

    pub const fn new(role: Role, environment: Environment) -> Self {
        Self { role, environment }
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.role, self.environment)
    }
}

/// SHA-256 and SHA-512 of the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digests {
    pub sha256: Digest32,
    pub sha512: Digest64,
}

/// The artifact's digests and the content key's signature over `sha512`.
///
/// Only `sha256 ‖ signature` is serialized; the SHA-512 digest is what the
/// signature covers and can always be recomputed from the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub digests: Digests,
    pub signature: Vec<u8>,
}

impl ContentRecord {
    /// Serialized length: 32 bytes of digest plus the signature.
    pub fn encoded_len(&self) -> usize {
        DIGEST32_LEN + self.signature.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&self.digests.sha256);
        bytes.extend_from_slice(&self.signature);
        bytes
    }
}

/// A content record followed by the prior chain state. This is what the log
/// key meta-signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry(Vec<u8>);

impl LogEntry {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Digests of a [`LogEntry`] and the log key's meta-signature over `sha512`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub digests: Digests,
    pub signature: Vec<u8>,
}

/// Everything one successful signing run produced, in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRun {
    pub environment: Environment,
    pub content: ContentRecord,
    pub entry: LogEntry,
    pub log: LogRecord,
}
