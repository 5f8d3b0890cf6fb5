//! Kernel signing and append-only provenance chain.
//!
//! Each run signs the SHA-512 digest of a build artifact with a *content*
//! key, prepends the resulting record to the existing chain and meta-signs
//! the whole thing with a separate *log* key. Every signature is verified
//! with the paired public key before anything reaches disk, and the sealed
//! chain replaces the previous one atomically.
//!
//! # Example
//!
//! ```
//! use ksig_prov::{digest_bytes, extend_chain};
//!
//! let digests = digest_bytes(b"AAAA");
//! assert_eq!(digests.sha512.len(), 64);
//!
//! // With no prior history the log entry is just the content record.
//! let entry = extend_chain(b"record", &[]);
//! assert_eq!(entry.as_bytes(), b"record");
//! ```

mod chain;
mod config;
mod digest;
mod error;
mod export;
mod keys;
mod lock;
mod manifest;
mod pipeline;
mod record;
mod signature;
mod types;
mod verify;

pub use chain::{
    build_content_record, extend_chain, read_chain_state, seal_chain, sealed_chain_bytes, sign_run,
};
pub use config::{EnvironmentLayout, SigningConfig, DEFAULT_CONFIG_FILE};
pub use digest::{digest_bytes, ArtifactDigester, DEFAULT_CHUNK_SIZE};
pub use error::{ProvError, Stage};
pub use export::{
    export_environment, export_raw_key, format_byte_array, to_fixed_be, RawPublicKey,
    EXPONENT_WIDTH, MODULUS_WIDTH,
};
pub use keys::{
    generate_and_save_all, save as save_key_pair, KeyPair, KeyRing, KeySource, KeyStore,
    DEFAULT_KEY_BITS, PUBLIC_EXPONENT,
};
pub use lock::ChainLock;
pub use manifest::{BuildManifest, ManifestEntry};
pub use pipeline::{sign_artifact, SignedArtifact};
pub use record::{report, snapshot_bytes, write_atomic, RecordWriter};
pub use signature::{sign, sign_and_verify, verify};
pub use types::{
    ContentRecord, Digest32, Digest64, Digests, Environment, KeySlot, LogEntry, LogRecord, Role,
    SignedRun, DIGEST32_LEN, DIGEST64_LEN,
};
pub use verify::{verify_chain, verify_head_content, ChainLayer, ChainSummary};

#[cfg(test)]
pub(crate) mod test_keys {
    //! Keys shared by unit tests. Generated once per test binary at a
    //! smaller size than production keys.

    use crate::keys::{KeyPair, KeyRing, KeyStore};
    use crate::types::{Environment, KeySlot, Role};
    use std::collections::BTreeMap;
    use std::sync::OnceLock;

    pub const TEST_KEY_BITS: usize = 2048;

    fn all() -> &'static BTreeMap<KeySlot, KeyPair> {
        static KEYS: OnceLock<BTreeMap<KeySlot, KeyPair>> = OnceLock::new();
        KEYS.get_or_init(|| {
            KeyStore::new(TEST_KEY_BITS)
                .generate_all()
                .expect("test key generation")
        })
    }

    pub fn test_pair(slot: KeySlot) -> KeyPair {
        all()[&slot].clone()
    }

    pub fn test_ring(environment: Environment) -> KeyRing {
        KeyRing::new(
            test_pair(KeySlot::new(Role::Content, environment)),
            test_pair(KeySlot::new(Role::Log, environment)),
        )
        .expect("test key ring")
    }
}
