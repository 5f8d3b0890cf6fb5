//! Fixed-width export of public keys for embedding in kernel sources.

use crate::config::SigningConfig;
use crate::error::ProvError;
use crate::keys::{KeyRing, KeyStore};
use crate::record::write_atomic;
use crate::types::{Environment, Role};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use std::path::PathBuf;
use tracing::info;

/// Modulus width: a 4096-bit key.
pub const MODULUS_WIDTH: usize = 512;

/// Exponent width: enough for 65537.
pub const EXPONENT_WIDTH: usize = 3;

/// Byte literals per line in the rendered arrays.
pub const BYTES_PER_LINE: usize = 16;

/// A public key as big-endian, zero-padded byte arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPublicKey {
    pub modulus: [u8; MODULUS_WIDTH],
    pub exponent: [u8; EXPONENT_WIDTH],
}

impl RawPublicKey {
    pub fn modulus_text(&self) -> String {
        format_byte_array(&self.modulus)
    }

    pub fn exponent_text(&self) -> String {
        format_byte_array(&self.exponent)
    }
}

/// Encode `public_key` into fixed-width arrays, failing instead of
/// truncating if a value is too wide.
pub fn export_raw_key(public_key: &RsaPublicKey) -> Result<RawPublicKey, ProvError> {
    Ok(RawPublicKey {
        modulus: to_fixed_be(public_key.n(), "modulus")?,
        exponent: to_fixed_be(public_key.e(), "exponent")?,
    })
}

/// Left-pad the big-endian bytes of `value` to exactly `N` bytes.
pub fn to_fixed_be<const N: usize>(
    value: &BigUint,
    field: &'static str,
) -> Result<[u8; N], ProvError> {
    let bytes = value.to_bytes_be();
    // Zero encodes as a single 0x00 byte.
    let significant = match bytes.iter().position(|&b| b != 0) {
        Some(start) => &bytes[start..],
        None => &[][..],
    };
    if significant.len() > N {
        return Err(ProvError::EncodingOverflow {
            field,
            width: N,
            actual: significant.len(),
        });
    }
    let mut out = [0u8; N];
    out[N - significant.len()..].copy_from_slice(significant);
    Ok(out)
}

/// `0xAB,0xCD,...` with 16 literals per line; lines are separated by `,\n`
/// and the text ends with a newline.
pub fn format_byte_array(bytes: &[u8]) -> String {
    let lines: Vec<String> = bytes
        .chunks(BYTES_PER_LINE)
        .map(|line| {
            line.iter()
                .map(|b| format!("0x{b:02X}"))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    let mut text = lines.join(",\n");
    text.push('\n');
    text
}

/// Export both public keys of `environment` into its export directory as
/// `kernel_keyn.txt`, `kernel_keye.txt`, `signature_keyn.txt` and
/// `signature_keye.txt`.
pub fn export_environment(
    config: &SigningConfig,
    environment: Environment,
) -> Result<Vec<PathBuf>, ProvError> {
    let layout = config.layout(environment);
    let ring = KeyRing::load_public(&KeyStore::new(config.key_bits), layout, environment)?;

    let mut written = Vec::with_capacity(4);
    for role in Role::ALL {
        let raw = export_raw_key(ring.pair(role).public_key())?;
        let stem = role.export_stem();

        let modulus_path = layout.export_dir.join(format!("{stem}_keyn.txt"));
        write_atomic(&modulus_path, raw.modulus_text().as_bytes())?;
        let exponent_path = layout.export_dir.join(format!("{stem}_keye.txt"));
        write_atomic(&exponent_path, raw.exponent_text().as_bytes())?;

        info!(%environment, %role, dir = %layout.export_dir.display(), "public key exported");
        written.push(modulus_path);
        written.push(exponent_path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys::test_pair;
    use crate::types::KeySlot;

    #[test]
    fn test_fixed_lengths_with_left_padding() {
        let pair = test_pair(KeySlot::new(Role::Content, Environment::Debug));
        let raw = export_raw_key(pair.public_key()).unwrap();

        assert_eq!(raw.modulus.len(), MODULUS_WIDTH);
        assert_eq!(raw.exponent, [0x01, 0x00, 0x01]);
        // A 2048-bit test modulus occupies the low 256 bytes only.
        let natural = pair.public_key().n().to_bytes_be();
        assert!(raw.modulus[..MODULUS_WIDTH - natural.len()].iter().all(|&b| b == 0));
        assert_eq!(&raw.modulus[MODULUS_WIDTH - natural.len()..], natural.as_slice());
    }

    #[test]
    fn test_small_values_are_padded() {
        let value = BigUint::from_bytes_be(&[0x03]);
        assert_eq!(to_fixed_be::<3>(&value, "exponent").unwrap(), [0, 0, 3]);
        let zero = BigUint::from_bytes_be(&[]);
        assert_eq!(to_fixed_be::<3>(&zero, "exponent").unwrap(), [0, 0, 0]);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let value = BigUint::from_bytes_be(&[0x01; MODULUS_WIDTH + 1]);
        let err = to_fixed_be::<MODULUS_WIDTH>(&value, "modulus").unwrap_err();
        assert!(matches!(
            err,
            ProvError::EncodingOverflow {
                field: "modulus",
                width: 512,
                actual: 513
            }
        ));

        let exponent = BigUint::from_bytes_be(&[0x01, 0x00, 0x00, 0x01]);
        assert!(to_fixed_be::<EXPONENT_WIDTH>(&exponent, "exponent").is_err());
    }

    #[test]
    fn test_text_layout() {
        let text = format_byte_array(&[0xAB; 20]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches("0xAB").count(), 16);
        assert!(lines[0].ends_with("0xAB,"));
        assert_eq!(lines[1], "0xAB,0xAB,0xAB,0xAB");
        assert!(text.ends_with("0xAB\n"));

        assert_eq!(format_byte_array(&[0x01, 0x00, 0x01]), "0x01,0x00,0x01\n");
    }

    #[test]
    fn test_modulus_text_has_32_lines() {
        let pair = test_pair(KeySlot::new(Role::Log, Environment::Release));
        let raw = export_raw_key(pair.public_key()).unwrap();
        assert_eq!(raw.modulus_text().lines().count(), MODULUS_WIDTH / BYTES_PER_LINE);
    }

    #[test]
    fn test_export_is_idempotent() {
        let pair = test_pair(KeySlot::new(Role::Log, Environment::Debug));
        let first = export_raw_key(pair.public_key()).unwrap();
        let second = export_raw_key(pair.public_key()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.modulus_text(), second.modulus_text());
    }
}
