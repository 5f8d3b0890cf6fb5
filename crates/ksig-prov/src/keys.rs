//! RSA key generation, loading and persistence.
//!
//! Four independent key pairs exist per installation: a content key and a log
//! key for each of the debug and release environments. Private keys are
//! stored as unencrypted PKCS#8 PEM; anyone with read access to the key
//! directory can sign.

use crate::config::{EnvironmentLayout, SigningConfig};
use crate::error::ProvError;
use crate::types::{Environment, KeySlot, Role};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Modulus size of production keys.
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Public exponent of every generated key.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// An RSA key pair bound to its slot. The private half is absent when only
/// the public key was loaded (verification, export).
#[derive(Debug, Clone)]
pub struct KeyPair {
    slot: KeySlot,
    private: Option<RsaPrivateKey>,
    public: RsaPublicKey,
}

impl KeyPair {
    pub fn slot(&self) -> KeySlot {
        self.slot
    }

    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.private.as_ref()
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// Modulus length in bytes, which is also the signature length.
    pub fn modulus_len(&self) -> usize {
        self.public.size()
    }
}

/// PEM-encoded key material handed to [`KeyStore::load`].
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    /// Private key only; the public half is derived from it.
    Private(&'a str),
    Public(&'a str),
    /// Both halves stored separately. They are not cross-checked here: a
    /// mismatch surfaces as a failed self-verification when signing.
    Pair { private: &'a str, public: &'a str },
}

/// Generates and decodes keys of one fixed modulus size.
#[derive(Debug, Clone, Copy)]
pub struct KeyStore {
    bits: usize,
}

impl KeyStore {
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Generate a fresh key pair with exponent 65537 from the OS CSPRNG.
    ///
    /// This is CPU bound and takes seconds for 4096-bit keys.
    pub fn generate(&self, slot: KeySlot) -> Result<KeyPair, ProvError> {
        let private = RsaPrivateKey::new(&mut OsRng, self.bits).map_err(|e| {
            ProvError::KeyGeneration {
                slot,
                reason: e.to_string(),
            }
        })?;
        let public = private.to_public_key();
        info!(%slot, bits = self.bits, "generated key pair");
        Ok(KeyPair {
            slot,
            private: Some(private),
            public,
        })
    }

    /// Generate all four slots independently.
    pub fn generate_all(&self) -> Result<BTreeMap<KeySlot, KeyPair>, ProvError> {
        KeySlot::ALL
            .iter()
            .map(|&slot| self.generate(slot).map(|pair| (slot, pair)))
            .collect()
    }

    /// Decode PEM material for `slot`. `origin` names where it came from in
    /// error messages.
    pub fn load(
        &self,
        slot: KeySlot,
        source: KeySource<'_>,
        origin: &str,
    ) -> Result<KeyPair, ProvError> {
        let fail = |reason: String| ProvError::KeyLoad {
            slot,
            origin: origin.to_string(),
            reason,
        };

        let (private, public) = match source {
            KeySource::Private(pem) => {
                let private = decode_private(pem).map_err(fail)?;
                let public = private.to_public_key();
                (Some(private), public)
            }
            KeySource::Public(pem) => (None, decode_public(pem).map_err(fail)?),
            KeySource::Pair { private, public } => (
                Some(decode_private(private).map_err(fail)?),
                decode_public(public).map_err(fail)?,
            ),
        };

        if let Some(private) = &private {
            self.check_size(private.n().bits()).map_err(fail)?;
        }
        self.check_size(public.n().bits()).map_err(fail)?;

        Ok(KeyPair {
            slot,
            private,
            public,
        })
    }

    /// Read a key pair from disk. Without `private_path` only the public key
    /// is loaded.
    pub fn load_files(
        &self,
        slot: KeySlot,
        private_path: Option<&Path>,
        public_path: &Path,
    ) -> Result<KeyPair, ProvError> {
        let public_pem = read_pem(slot, public_path)?;
        match private_path {
            Some(private_path) => {
                let private_pem = read_pem(slot, private_path)?;
                let origin = format!("{} + {}", private_path.display(), public_path.display());
                self.load(
                    slot,
                    KeySource::Pair {
                        private: &private_pem,
                        public: &public_pem,
                    },
                    &origin,
                )
            }
            None => self.load(
                slot,
                KeySource::Public(&public_pem),
                &public_path.display().to_string(),
            ),
        }
    }

    fn check_size(&self, bits: usize) -> Result<(), String> {
        if bits == self.bits() {
            Ok(())
        } else {
            Err(format!("modulus is {bits} bits, expected {}", self.bits()))
        }
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_BITS)
    }
}

/// Write `pair` as PKCS#8 private / PKCS#1 public PEM, creating parent
/// directories.
pub fn save(pair: &KeyPair, private_path: &Path, public_path: &Path) -> Result<(), ProvError> {
    let slot = pair.slot();
    let encode_err = |reason: String| ProvError::KeyGeneration { slot, reason };

    let private = pair
        .private_key()
        .ok_or_else(|| encode_err("no private key to save".to_string()))?;
    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| encode_err(e.to_string()))?;
    let public_pem = pair
        .public_key()
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| encode_err(e.to_string()))?;

    write_key_file(private_path, private_pem.as_bytes(), KeyFile::Secret)?;
    write_key_file(public_path, public_pem.as_bytes(), KeyFile::Public)?;
    Ok(())
}

/// Generate every key pair of `config` and persist it. Existing key files
/// are kept unless `force` is set: regenerating orphans every signature made
/// with the old key.
pub fn generate_and_save_all(
    config: &SigningConfig,
    force: bool,
) -> Result<Vec<PathBuf>, ProvError> {
    let targets: Vec<(KeySlot, &Path, &Path)> = KeySlot::ALL
        .iter()
        .map(|&slot| {
            let layout = config.layout(slot.environment);
            (slot, layout.private_key(slot.role), layout.public_key(slot.role))
        })
        .collect();

    if !force {
        for (_, private_path, public_path) in &targets {
            for path in [private_path, public_path] {
                if path.exists() {
                    return Err(ProvError::KeyExists {
                        path: path.to_path_buf(),
                    });
                }
            }
        }
    }

    let store = KeyStore::new(config.key_bits);
    info!(bits = store.bits(), pairs = targets.len(), force, "generating key pairs");
    let mut pairs = store.generate_all()?;
    let mut written = Vec::with_capacity(targets.len() * 2);
    for (slot, private_path, public_path) in targets {
        if let Some(pair) = pairs.remove(&slot) {
            save(&pair, private_path, public_path)?;
            written.push(private_path.to_path_buf());
            written.push(public_path.to_path_buf());
        }
    }
    Ok(written)
}

/// The content and log key pairs of a single environment.
#[derive(Debug, Clone)]
pub struct KeyRing {
    environment: Environment,
    content: KeyPair,
    log: KeyPair,
}

impl KeyRing {
    /// Refuses pairs in the wrong role or from another environment.
    pub fn new(content: KeyPair, log: KeyPair) -> Result<Self, ProvError> {
        let environment = content.slot().environment;
        for (pair, role) in [(&content, Role::Content), (&log, Role::Log)] {
            let expected = KeySlot::new(role, environment);
            if pair.slot() != expected {
                return Err(ProvError::KeyLoad {
                    slot: pair.slot(),
                    origin: "key ring".to_string(),
                    reason: format!("expected the {expected} key"),
                });
            }
        }
        Ok(Self {
            environment,
            content,
            log,
        })
    }

    /// Load both private+public pairs of `environment`.
    pub fn load(
        store: &KeyStore,
        layout: &EnvironmentLayout,
        environment: Environment,
    ) -> Result<Self, ProvError> {
        let load = |role: Role| {
            store.load_files(
                KeySlot::new(role, environment),
                Some(layout.private_key(role)),
                layout.public_key(role),
            )
        };
        Self::new(load(Role::Content)?, load(Role::Log)?)
    }

    /// Load only the public halves of `environment`.
    pub fn load_public(
        store: &KeyStore,
        layout: &EnvironmentLayout,
        environment: Environment,
    ) -> Result<Self, ProvError> {
        let load = |role: Role| {
            store.load_files(KeySlot::new(role, environment), None, layout.public_key(role))
        };
        Self::new(load(Role::Content)?, load(Role::Log)?)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn pair(&self, role: Role) -> &KeyPair {
        match role {
            Role::Content => &self.content,
            Role::Log => &self.log,
        }
    }

    pub fn content(&self) -> &KeyPair {
        &self.content
    }

    pub fn log(&self) -> &KeyPair {
        &self.log
    }
}

fn decode_private(pem: &str) -> Result<RsaPrivateKey, String> {
    if pem.contains("ENCRYPTED") {
        return Err(
            "private key is encrypted; passphrase-protected keys are not supported".to_string(),
        );
    }
    match RsaPrivateKey::from_pkcs8_pem(pem) {
        Ok(key) => Ok(key),
        Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|_| format!("malformed private key: {pkcs8_err}")),
    }
}

fn decode_public(pem: &str) -> Result<RsaPublicKey, String> {
    match RsaPublicKey::from_pkcs1_pem(pem) {
        Ok(key) => Ok(key),
        Err(pkcs1_err) => RsaPublicKey::from_public_key_pem(pem)
            .map_err(|_| format!("malformed public key: {pkcs1_err}")),
    }
}

fn read_pem(slot: KeySlot, path: &Path) -> Result<String, ProvError> {
    fs::read_to_string(path).map_err(|e| ProvError::KeyLoad {
        slot,
        origin: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFile {
    Secret,
    Public,
}

/// Private keys are stored unencrypted, so on unix they are readable by the
/// owner only, including when an existing file is overwritten.
fn write_key_file(path: &Path, contents: &[u8], kind: KeyFile) -> Result<(), ProvError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ProvError::io(parent, e))?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if kind == KeyFile::Secret {
            options.mode(0o600);
        }
    }

    let mut file = options.open(path).map_err(|e| ProvError::io(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if kind == KeyFile::Secret {
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| ProvError::io(path, e))?;
        }
    }
    file.write_all(contents).map_err(|e| ProvError::io(path, e))
}
