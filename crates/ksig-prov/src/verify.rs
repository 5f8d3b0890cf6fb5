//! Sealed chain verification.
//!
//! A chain blob is a nesting of layers, newest first:
//!
//! ```text
//! [log sha256][meta-signature][content sha256][content signature][older blob...]
//!             |<------------------- log entry ------------------------------->|
//! ```
//!
//! Signature widths follow from the public keys, so the blob needs no
//! framing.

use crate::digest::digest_bytes;
use crate::error::{ProvError, Stage};
use crate::signature::verify;
use crate::types::{Digest32, Digests, DIGEST32_LEN};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;

/// One sealed layer of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLayer {
    /// 0 is the newest layer.
    pub depth: usize,
    pub log_sha256: Digest32,
    pub content_sha256: Digest32,
    /// Length of the log entry this layer's meta-signature covers.
    pub entry_len: usize,
}

/// Result of walking a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSummary {
    pub layers: Vec<ChainLayer>,
}

impl ChainSummary {
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Verify every layer's meta-signature and stored digest.
///
/// An empty blob is a valid, empty chain.
pub fn verify_chain(
    blob: &[u8],
    content_public: &RsaPublicKey,
    log_public: &RsaPublicKey,
) -> Result<ChainSummary, ProvError> {
    let meta_len = log_public.size();
    let content_len = DIGEST32_LEN + content_public.size();
    let mut summary = ChainSummary::default();
    let mut rest = blob;

    while !rest.is_empty() {
        let depth = summary.layers.len();
        let header_len = DIGEST32_LEN + meta_len;
        if rest.len() < header_len + content_len {
            return Err(ProvError::TruncatedChain { depth });
        }

        let (stored, tail) = rest.split_at(DIGEST32_LEN);
        let (meta_signature, entry) = tail.split_at(meta_len);
        let digests = digest_bytes(entry);

        if !verify(log_public, meta_signature, &digests.sha512) {
            return Err(ProvError::SignatureVerification {
                stage: Stage::Layer(depth),
            });
        }
        if digests.sha256.as_slice() != stored {
            return Err(ProvError::DigestMismatch { depth });
        }

        let mut content_sha256 = [0u8; DIGEST32_LEN];
        content_sha256.copy_from_slice(&entry[..DIGEST32_LEN]);
        summary.layers.push(ChainLayer {
            depth,
            log_sha256: digests.sha256,
            content_sha256,
            entry_len: entry.len(),
        });

        rest = &entry[content_len..];
    }

    Ok(summary)
}

/// Check the newest layer's content record against an artifact's digests:
/// the stored SHA-256 must match and the content signature must verify over
/// the SHA-512.
pub fn verify_head_content(
    blob: &[u8],
    artifact: &Digests,
    content_public: &RsaPublicKey,
    log_public: &RsaPublicKey,
) -> Result<(), ProvError> {
    let start = DIGEST32_LEN + log_public.size();
    let end = start + DIGEST32_LEN + content_public.size();
    if blob.len() < end {
        return Err(ProvError::TruncatedChain { depth: 0 });
    }

    let record = &blob[start..end];
    if record[..DIGEST32_LEN] != artifact.sha256 {
        return Err(ProvError::DigestMismatch { depth: 0 });
    }
    if !verify(content_public, &record[DIGEST32_LEN..], &artifact.sha512) {
        return Err(ProvError::SignatureVerification {
            stage: Stage::Content,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{sealed_chain_bytes, sign_run};
    use crate::keys::KeyRing;
    use crate::test_keys::test_ring;
    use crate::types::Environment;

    fn build_chain(ring: &KeyRing, artifacts: &[&[u8]]) -> Vec<u8> {
        let mut blob = Vec::new();
        for artifact in artifacts {
            let run = sign_run(ring, digest_bytes(artifact), &blob).unwrap();
            blob = sealed_chain_bytes(&run.log, &run.entry);
        }
        blob
    }

    fn keys(ring: &KeyRing) -> (&RsaPublicKey, &RsaPublicKey) {
        (ring.content().public_key(), ring.log().public_key())
    }

    #[test]
    fn test_empty_chain_is_valid() {
        let ring = test_ring(Environment::Debug);
        let (content, log) = keys(&ring);
        assert!(verify_chain(&[], content, log).unwrap().is_empty());
    }

    #[test]
    fn test_three_runs_give_three_layers_newest_first() {
        let ring = test_ring(Environment::Debug);
        let (content, log) = keys(&ring);
        let blob = build_chain(&ring, &[b"v1", b"v2", b"v3"]);

        let summary = verify_chain(&blob, content, log).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.layers[0].content_sha256, digest_bytes(b"v3").sha256);
        assert_eq!(summary.layers[2].content_sha256, digest_bytes(b"v1").sha256);
        assert!(summary.layers[0].entry_len > summary.layers[1].entry_len);
    }

    #[test]
    fn test_any_flipped_byte_is_detected() {
        let ring = test_ring(Environment::Release);
        let (content, log) = keys(&ring);
        let blob = build_chain(&ring, &[b"v1", b"v2"]);

        // Probe the stored digest, meta-signature, entry and the oldest layer.
        for index in [0, 40, 32 + log.size() + 3, blob.len() - 1] {
            let mut tampered = blob.clone();
            tampered[index] ^= 0x01;
            assert!(
                verify_chain(&tampered, content, log).is_err(),
                "flip at {index} went unnoticed"
            );
        }
    }

    #[test]
    fn test_truncated_chain() {
        let ring = test_ring(Environment::Debug);
        let (content, log) = keys(&ring);
        let blob = build_chain(&ring, &[b"v1"]);

        let err = verify_chain(&blob[..blob.len() - 10], content, log).unwrap_err();
        assert!(matches!(err, ProvError::TruncatedChain { depth: 0 }));
    }

    #[test]
    fn test_wrong_log_key_rejected() {
        let debug = test_ring(Environment::Debug);
        let release = test_ring(Environment::Release);
        let blob = build_chain(&debug, &[b"v1"]);

        let err = verify_chain(&blob, debug.content().public_key(), release.log().public_key())
            .unwrap_err();
        assert!(matches!(
            err,
            ProvError::SignatureVerification {
                stage: Stage::Layer(0)
            }
        ));
    }

    #[test]
    fn test_head_content_matches_artifact() {
        let ring = test_ring(Environment::Debug);
        let (content, log) = keys(&ring);
        let blob = build_chain(&ring, &[b"v1", b"v2"]);

        assert!(verify_head_content(&blob, &digest_bytes(b"v2"), content, log).is_ok());
        let err = verify_head_content(&blob, &digest_bytes(b"v1"), content, log).unwrap_err();
        assert!(matches!(err, ProvError::DigestMismatch { depth: 0 }));
    }
}
