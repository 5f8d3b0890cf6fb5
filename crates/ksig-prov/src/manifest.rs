//! Build manifest lookup.
//!
//! The manifest is written by the build and lists every deployable output:
//!
//! ```json
//! { "manifest": [ { "project": "kernel/build", "file": "aos.kernel" } ] }
//! ```
//!
//! Only `project` and `file` matter here; other fields are ignored.

use crate::error::ProvError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    /// Directory of the producing project, relative to the project base.
    pub project: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildManifest {
    pub manifest: Vec<ManifestEntry>,
    #[serde(skip)]
    origin: PathBuf,
}

impl BuildManifest {
    pub fn from_json(source: &str, origin: &Path) -> Result<Self, ProvError> {
        let mut manifest: Self = serde_json::from_str(source).map_err(|e| ProvError::Manifest {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        manifest.origin = origin.to_path_buf();
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self, ProvError> {
        let source = fs::read_to_string(path).map_err(|e| ProvError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&source, path)
    }

    /// `project_base/project/file` of the first entry whose `file` is `name`.
    pub fn artifact_path(&self, project_base: &Path, name: &str) -> Result<PathBuf, ProvError> {
        self.manifest
            .iter()
            .find(|entry| entry.file == name)
            .map(|entry| project_base.join(&entry.project).join(&entry.file))
            .ok_or_else(|| ProvError::ArtifactNotFound {
                artifact: name.to_string(),
                reason: format!("not listed in {}", self.origin.display()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "disk": "vm/aos.vhd",
        "manifest": [
            { "project": "uefi/Build", "file": "BOOTX64.EFI", "path": "EFI/BOOT" },
            { "project": "kernel/build", "file": "aos.kernel", "path": "system" }
        ]
    }"#;

    #[test]
    fn test_artifact_path_joins_base() {
        let manifest =
            BuildManifest::from_json(MANIFEST, Path::new("debug.manifest.json")).unwrap();
        let path = manifest.artifact_path(Path::new("/work/aos"), "aos.kernel").unwrap();
        assert_eq!(path, PathBuf::from("/work/aos/kernel/build/aos.kernel"));
    }

    #[test]
    fn test_unknown_artifact() {
        let manifest =
            BuildManifest::from_json(MANIFEST, Path::new("debug.manifest.json")).unwrap();
        let err = manifest.artifact_path(Path::new("/work"), "vmlinuz").unwrap_err();
        assert!(matches!(err, ProvError::ArtifactNotFound { .. }));
        assert!(err.to_string().contains("debug.manifest.json"));
    }

    #[test]
    fn test_malformed_manifest() {
        let err = BuildManifest::from_json("{\"files\": []}", Path::new("m.json")).unwrap_err();
        assert!(matches!(err, ProvError::Manifest { .. }));
    }

    #[test]
    fn test_missing_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = BuildManifest::load(&dir.path().join("release.manifest.json")).unwrap_err();
        assert!(matches!(err, ProvError::Manifest { .. }));
    }
}
