//! RSA-PSS signing and verification of SHA-512 digests.
//!
//! Parameters: PSS with MGF1-SHA-512, SHA-512 as the message hash and a salt
//! as long as the hash output (64 bytes). The 64-byte digest itself is the
//! signed message, so signatures interoperate with any PSS implementation
//! signing the digest bytes with those parameters.

use crate::error::{ProvError, Stage};
use crate::keys::KeyPair;
use crate::types::Digest64;
use rand::rngs::OsRng;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;
use tracing::debug;

/// Produce a randomized PSS signature over `digest64`. The signature is as
/// long as the key's modulus.
pub fn sign(
    private_key: &RsaPrivateKey,
    digest64: &Digest64,
) -> Result<Vec<u8>, rsa::signature::Error> {
    let signing_key = BlindedSigningKey::<Sha512>::new(private_key.clone());
    let signature = signing_key.try_sign_with_rng(&mut OsRng, digest64)?;
    Ok(signature.to_vec())
}

/// Check `signature` over `digest64` with the same PSS parameters as [`sign`].
pub fn verify(public_key: &RsaPublicKey, signature: &[u8], digest64: &Digest64) -> bool {
    let signature = match Signature::try_from(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    let verifying_key = VerifyingKey::<Sha512>::new(public_key.clone());
    verifying_key.verify(digest64, &signature).is_ok()
}

/// Sign with the pair's private key and immediately verify with its public
/// key.
///
/// Every signature in a run goes through here. A failed verification means
/// the private and public halves do not belong together (or the key material
/// is corrupt) and must abort the run before anything is written.
pub fn sign_and_verify(
    pair: &KeyPair,
    digest64: &Digest64,
    stage: Stage,
) -> Result<Vec<u8>, ProvError> {
    let private_key = pair.private_key().ok_or_else(|| ProvError::KeyLoad {
        slot: pair.slot(),
        origin: "key ring".to_string(),
        reason: "private key not loaded".to_string(),
    })?;

    let signature = sign(private_key, digest64).map_err(|e| ProvError::Signing {
        stage,
        reason: e.to_string(),
    })?;

    if !verify(pair.public_key(), &signature, digest64) {
        return Err(ProvError::SignatureVerification { stage });
    }

    debug!(%stage, slot = %pair.slot(), len = signature.len(), "signature verified");
    Ok(signature)
}
