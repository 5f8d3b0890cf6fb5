//! Signing configuration loaded from `ksig.toml`.
//!
//! Every field has a default reproducing the historical on-disk layout, so an
//! empty (or absent) file is a valid configuration:
//!
//! ```toml
//! key_bits = 4096
//! chunk_size = 4096
//! artifact = "aos.kernel"
//! project_base = ".."
//!
//! [debug]
//! manifest = "debug.manifest.json"
//! content_private = "sig/kernel.rsa.debug.private.pem"
//! content_public = "sig/kernel.rsa.debug.public.pem"
//! log_private = "sig/signature.rsa.debug.private.pem"
//! log_public = "sig/signature.rsa.debug.public.pem"
//! snapshot = "sig/Debug/current.sig.txt"
//! report = "sig/Debug/aos.kernel.sig.txt"
//! chain = "sig/Debug/aos.kernel.sig"
//! export_dir = "sig/Debug"
//! ```
//!
//! An environment table, when present, must list all of its paths. Relative
//! paths are resolved against the directory holding the configuration file.

use crate::digest::DEFAULT_CHUNK_SIZE;
use crate::error::ProvError;
use crate::keys::DEFAULT_KEY_BITS;
use crate::types::{Environment, Role};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "ksig.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigningConfig {
    /// Expected RSA modulus size for generated and loaded keys.
    pub key_bits: usize,
    /// Read size used while digesting the artifact.
    pub chunk_size: usize,
    /// Manifest `file` name of the artifact to sign.
    pub artifact: String,
    /// Directory manifest `project` entries are relative to.
    pub project_base: PathBuf,
    pub debug: EnvironmentLayout,
    pub release: EnvironmentLayout,
}

/// Where one environment keeps its keys and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentLayout {
    pub manifest: PathBuf,
    pub content_private: PathBuf,
    pub content_public: PathBuf,
    pub log_private: PathBuf,
    pub log_public: PathBuf,
    /// Latest `sha256 ‖ content signature`, overwritten every run.
    pub snapshot: PathBuf,
    /// Human-readable report of the six signed byte strings.
    pub report: PathBuf,
    /// Sealed chain blob; read as prior state and replaced by the new one.
    pub chain: PathBuf,
    /// Directory receiving exported public key arrays.
    pub export_dir: PathBuf,
}

impl EnvironmentLayout {
    pub fn defaults(environment: Environment) -> Self {
        let env = environment.as_str();
        let dir = Path::new("sig").join(environment.dir_name());
        Self {
            manifest: PathBuf::from(format!("{env}.manifest.json")),
            content_private: PathBuf::from(format!("sig/kernel.rsa.{env}.private.pem")),
            content_public: PathBuf::from(format!("sig/kernel.rsa.{env}.public.pem")),
            log_private: PathBuf::from(format!("sig/signature.rsa.{env}.private.pem")),
            log_public: PathBuf::from(format!("sig/signature.rsa.{env}.public.pem")),
            snapshot: dir.join("current.sig.txt"),
            report: dir.join("aos.kernel.sig.txt"),
            chain: dir.join("aos.kernel.sig"),
            export_dir: dir,
        }
    }

    pub fn private_key(&self, role: Role) -> &Path {
        match role {
            Role::Content => &self.content_private,
            Role::Log => &self.log_private,
        }
    }

    pub fn public_key(&self, role: Role) -> &Path {
        match role {
            Role::Content => &self.content_public,
            Role::Log => &self.log_public,
        }
    }

    fn rebase(&mut self, base: &Path) {
        for path in [
            &mut self.manifest,
            &mut self.content_private,
            &mut self.content_public,
            &mut self.log_private,
            &mut self.log_public,
            &mut self.snapshot,
            &mut self.report,
            &mut self.chain,
            &mut self.export_dir,
        ] {
            rebase_path(path, base);
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            artifact: "aos.kernel".to_string(),
            project_base: PathBuf::from(".."),
            debug: EnvironmentLayout::defaults(Environment::Debug),
            release: EnvironmentLayout::defaults(Environment::Release),
        }
    }
}

impl SigningConfig {
    /// Parse a configuration without touching relative paths.
    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self, ProvError> {
        let config: Self = toml::from_str(source).map_err(|e| ProvError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    /// Load `path` and resolve its relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self, ProvError> {
        let source = fs::read_to_string(path).map_err(|e| ProvError::io(path, e))?;
        let config = Self::from_toml_str(&source, path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.rebased(base))
    }

    /// Use `explicit` if given, else `ksig.toml` in `cwd` if it exists, else
    /// the defaults relative to `cwd`.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ProvError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default().rebased(cwd))
        }
    }

    /// Join every relative path onto `base`.
    pub fn rebased(mut self, base: &Path) -> Self {
        rebase_path(&mut self.project_base, base);
        self.debug.rebase(base);
        self.release.rebase(base);
        self
    }

    pub fn layout(&self, environment: Environment) -> &EnvironmentLayout {
        match environment {
            Environment::Debug => &self.debug,
            Environment::Release => &self.release,
        }
    }

    fn validate(&self, origin: &Path) -> Result<(), ProvError> {
        if self.key_bits < 1024 || self.key_bits % 8 != 0 {
            return Err(ProvError::Config {
                path: origin.to_path_buf(),
                reason: format!(
                    "key_bits must be a multiple of 8 and at least 1024, got {}",
                    self.key_bits
                ),
            });
        }
        if self.chunk_size == 0 {
            return Err(ProvError::Config {
                path: origin.to_path_buf(),
                reason: "chunk_size must be positive".to_string(),
            });
        }
        if self.debug.chain == self.release.chain {
            return Err(ProvError::Config {
                path: origin.to_path_buf(),
                reason: "debug and release must not share a chain file".to_string(),
            });
        }
        Ok(())
    }
}

fn rebase_path(path: &mut PathBuf, base: &Path) {
    if path.is_relative() && !base.as_os_str().is_empty() {
        *path = base.join(&*path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = SigningConfig::from_toml_str("", Path::new("ksig.toml")).unwrap();
        assert_eq!(config, SigningConfig::default());
        assert_eq!(config.key_bits, 4096);
        assert_eq!(
            config.debug.content_private,
            PathBuf::from("sig/kernel.rsa.debug.private.pem")
        );
        assert_eq!(
            config.release.chain,
            PathBuf::from("sig/Release/aos.kernel.sig")
        );
    }

    #[test]
    fn test_partial_override() {
        let config = SigningConfig::from_toml_str(
            "key_bits = 2048\nartifact = \"vmlinuz\"\n",
            Path::new("ksig.toml"),
        )
        .unwrap();
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.artifact, "vmlinuz");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = SigningConfig::from_toml_str("bogus = 1\n", Path::new("ksig.toml")).unwrap_err();
        assert!(matches!(err, ProvError::Config { .. }));
    }

    #[test]
    fn test_shared_chain_rejected() {
        let mut config = SigningConfig::default();
        config.release.chain = config.debug.chain.clone();
        let source = toml::to_string(&config).unwrap();
        let err = SigningConfig::from_toml_str(&source, Path::new("ksig.toml")).unwrap_err();
        assert!(err.to_string().contains("share a chain file"));
    }

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ksig.toml");
        fs::write(&path, "project_base = \"/abs/project\"\n").unwrap();

        let config = SigningConfig::load(&path).unwrap();
        assert_eq!(config.project_base, PathBuf::from("/abs/project"));
        assert_eq!(config.debug.chain, dir.path().join("sig/Debug/aos.kernel.sig"));
    }

    #[test]
    fn test_resolve_without_file_uses_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let config = SigningConfig::resolve(None, dir.path()).unwrap();
        assert_eq!(config.debug.manifest, dir.path().join("debug.manifest.json"));
    }

    #[test]
    fn test_layout_role_lookup() {
        let layout = EnvironmentLayout::defaults(Environment::Release);
        assert_eq!(
            layout.public_key(Role::Log),
            Path::new("sig/signature.rsa.release.public.pem")
        );
        assert_eq!(layout.export_dir, PathBuf::from("sig/Release"));
    }
}
