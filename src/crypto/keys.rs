//! MaskVault - Symmetric Key Material

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};

use crate::error::{VaultError, VaultResult};

/// Key length for AES-256 / XChaCha20
pub const KEY_LEN: usize = 32;

/// File encryption key, zeroized on drop.
///
/// Text form is URL-safe base64 with padding (44 characters), the same shape
/// as a Fernet key, so it can be pasted and stored as a single line.
pub struct SymmetricKey {
    inner: SecretBox<[u8; KEY_LEN]>,
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: SecretBox::new(Box::new(bytes)),
        }
    }

    /// Generate a random key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// URL-safe base64 with padding, the format written to key files
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(self.expose())
    }

    /// Parse a URL-safe base64 key; anything but 32 bytes is rejected
    pub fn from_base64(text: &str) -> VaultResult<Self> {
        let decoded = URL_SAFE
            .decode(text.trim())
            .map_err(|e| VaultError::invalid_key("symmetric", e.to_string()))?;

        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            VaultError::invalid_key(
                "symmetric",
                format!("expected {} bytes, got {}", KEY_LEN, decoded.len()),
            )
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl Clone for SymmetricKey {
    fn clone(&self) -> Self {
        Self::from_bytes(*self.expose())
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let a = SymmetricKey::generate();
        let b = SymmetricKey::generate();
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn test_base64_form() {
        let key = SymmetricKey::from_bytes([7u8; KEY_LEN]);
        let text = key.to_base64();
        assert_eq!(text.len(), 44);

        let parsed = SymmetricKey::from_base64(&format!("  {}\n", text)).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_rejects_short_key() {
        let short = URL_SAFE.encode([1u8; 16]);
        let err = SymmetricKey::from_base64(&short).unwrap_err();
        assert!(matches!(err, VaultError::InvalidKeyFormat { kind: "symmetric", .. }));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_LEN]);
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }
}
