//! Streaming SHA-256 + SHA-512 of build artifacts.

use crate::error::ProvError;
use crate::types::{Digest32, Digest64, Digests};
use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Default read size, matching the kernel build's page size.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Feeds an artifact through both hash functions in bounded chunks.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactDigester {
    chunk_size: usize,
}

impl ArtifactDigester {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest everything `reader` yields. Memory use is one chunk regardless
    /// of input size.
    pub fn digest<R: Read>(&self, mut reader: R) -> io::Result<Digests> {
        let mut sha256 = Sha256::new();
        let mut sha512 = Sha512::new();
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            sha256.update(&buf[..n]);
            sha512.update(&buf[..n]);
            total += n as u64;
        }

        debug!(bytes = total, chunk_size = self.chunk_size, "artifact digested");
        Ok(finish(sha256, sha512))
    }

    /// Digest the file at `path`. An unopenable path is an
    /// [`ProvError::ArtifactNotFound`]; a failing read is [`ProvError::Io`].
    pub fn digest_file(&self, path: &Path) -> Result<Digests, ProvError> {
        let file = File::open(path).map_err(|e| ProvError::ArtifactNotFound {
            artifact: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.digest(file).map_err(|e| ProvError::io(path, e))
    }
}

impl Default for ArtifactDigester {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// Digest an in-memory buffer.
pub fn digest_bytes(bytes: &[u8]) -> Digests {
    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();
    sha256.update(bytes);
    sha512.update(bytes);
    finish(sha256, sha512)
}

fn finish(sha256: Sha256, sha512: Sha512) -> Digests {
    let mut short: Digest32 = [0u8; 32];
    short.copy_from_slice(&sha256.finalize());
    let mut long: Digest64 = [0u8; 64];
    long.copy_from_slice(&sha512.finalize());
    Digests {
        sha256: short,
        sha512: long,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_known_vectors() {
        let digests = digest_bytes(b"AAAA");
        assert_eq!(
            hex::encode(digests.sha256),
            "63c1dd951ffedf6f7fd968ad4efa39b8ed584f162f46e715114ee184f8de9201"
        );
        assert_eq!(
            hex::encode(digests.sha512),
            "53b74be8b295b733fdfafbd7d2a22b1686733740de7fdc592b26cf3e1874cfce\
             158170ce9230e24696331a61829244e5d9f48abdacc9ffa8c4cb498724844cf8"
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected = digest_bytes(&data);

        for chunk_size in [1, 7, 4096, 20_000] {
            let digests = ArtifactDigester::new(chunk_size)
                .digest(Cursor::new(&data))
                .unwrap();
            assert_eq!(digests, expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_single_bit_flip_changes_both_digests() {
        let mut data = vec![0x5a; 8192];
        let before = digest_bytes(&data);
        data[4242] ^= 0x01;
        let after = digest_bytes(&data);

        assert_ne!(before.sha256, after.sha256);
        assert_ne!(before.sha512, after.sha512);
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        assert_eq!(ArtifactDigester::new(0).chunk_size(), 1);
    }

    #[test]
    fn test_missing_file_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactDigester::default()
            .digest_file(&dir.path().join("aos.kernel"))
            .unwrap_err();
        assert!(matches!(err, ProvError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_digest_file_matches_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aos.kernel");
        std::fs::write(&path, b"AAAA").unwrap();

        let digests = ArtifactDigester::default().digest_file(&path).unwrap();
        assert_eq!(digests, digest_bytes(b"AAAA"));
    }
}
