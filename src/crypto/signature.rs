use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Computes and verifies HMAC-SHA256 tags over an ordered list of byte strings.
///
/// Each part is fed to the MAC separately, in the order given. Callers must
/// always pass the same tuple in the same order on both ends.
#[derive(Clone)]
pub struct MessageHasher {
    mac: HmacSha256,
}

impl MessageHasher {
    /// Creates a new `MessageHasher` keyed with `secret`.
    ///
    /// # Arguments
    ///
    /// * `secret` - The shared signing secret.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `MessageHasher`.
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {}", e)))?;
        Ok(Self { mac })
    }

    /// Computes the tag over `parts`.
    pub fn digest(&self, parts: &[&[u8]]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part);
        }
        mac.finalize().into_bytes().to_vec()
    }

    /// Checks `tag` against the tag recomputed over `parts` in constant time.
    ///
    /// A tag of the wrong length is simply not equal.
    pub fn verify(&self, tag: &[u8], parts: &[&[u8]]) -> bool {
        let expected = self.digest(parts);
        expected.as_slice().ct_eq(tag).into()
    }
}
