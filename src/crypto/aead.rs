//! MaskVault - AEAD Encryption
//!
//! Frame format:
//! ```text
//! [MAGIC 4B]["MVSC"]
//! [VERSION 1B][0x01]
//! [CIPHER 1B][0x01 = AES-256-GCM, 0x02 = XChaCha20-Poly1305]
//! [NONCE 12B | 24B][random]
//! [CIPHERTEXT variable][encrypted payload]
//! [TAG 16B][auth tag, header bytes bound as AAD]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};

use super::keys::SymmetricKey;
use crate::error::{VaultError, VaultResult};

const MAGIC: &[u8; 4] = b"MVSC";

const VERSION: u8 = 0x01;

/// MAGIC(4) + VERSION(1) + CIPHER(1)
const HEADER_LEN: usize = 4 + 1 + 1;

/// Authentication tag size, identical for both ciphers
pub const TAG_LEN: usize = 16;

/// AEAD cipher type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeadCipher {
    /// AES-256-GCM (12-byte nonce)
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// XChaCha20-Poly1305 (24-byte nonce) - preferred
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
}

impl Default for AeadCipher {
    fn default() -> Self {
        Self::XChaCha20Poly1305
    }
}

impl AeadCipher {
    pub fn nonce_len(&self) -> usize {
        match self {
            Self::Aes256Gcm => 12,
            Self::XChaCha20Poly1305 => 24,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
            Self::XChaCha20Poly1305 => "XChaCha20-Poly1305",
        }
    }

    fn id(&self) -> u8 {
        match self {
            Self::Aes256Gcm => 0x01,
            Self::XChaCha20Poly1305 => 0x02,
        }
    }

    fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::Aes256Gcm),
            0x02 => Some(Self::XChaCha20Poly1305),
            _ => None,
        }
    }
}

/// Authenticated symmetric encryption of byte payloads.
///
/// The configured cipher only governs encryption; decryption follows the
/// cipher recorded in the frame header.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetricCipher {
    cipher: AeadCipher,
}

impl SymmetricCipher {
    pub fn new(cipher: AeadCipher) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> AeadCipher {
        self.cipher
    }

    pub fn generate_key() -> SymmetricKey {
        SymmetricKey::generate()
    }

    /// Encrypt `plaintext` under `key` with a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
        let header = [MAGIC[0], MAGIC[1], MAGIC[2], MAGIC[3], VERSION, self.cipher.id()];

        let mut nonce = vec![0u8; self.cipher.nonce_len()];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| VaultError::EncryptionFailed(format!("RNG failed: {}", e)))?;

        let sealed = seal(self.cipher, key, &nonce, &header, plaintext)?;

        let mut frame = Vec::with_capacity(HEADER_LEN + nonce.len() + sealed.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&sealed);
        Ok(frame)
    }

    /// Decrypt a frame produced by [`SymmetricCipher::encrypt`].
    ///
    /// Every failure (wrong key, flipped bit, truncation, foreign header)
    /// is reported as [`VaultError::AuthenticationFailed`].
    pub fn decrypt(&self, frame: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
        if frame.len() < HEADER_LEN || &frame[..4] != MAGIC || frame[4] != VERSION {
            return Err(VaultError::AuthenticationFailed);
        }
        let cipher = AeadCipher::from_id(frame[5]).ok_or(VaultError::AuthenticationFailed)?;

        let body = &frame[HEADER_LEN..];
        if body.len() < cipher.nonce_len() + TAG_LEN {
            return Err(VaultError::AuthenticationFailed);
        }
        let (nonce, sealed) = body.split_at(cipher.nonce_len());

        open(cipher, key, nonce, &frame[..HEADER_LEN], sealed)
    }
}

fn seal(
    cipher: AeadCipher,
    key: &SymmetricKey,
    nonce: &[u8],
    aad: &[u8],
    msg: &[u8],
) -> VaultResult<Vec<u8>> {
    let payload = Payload { msg, aad };
    let result = match cipher {
        AeadCipher::Aes256Gcm => Aes256Gcm::new_from_slice(key.expose())
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?
            .encrypt(AesNonce::from_slice(nonce), payload),
        AeadCipher::XChaCha20Poly1305 => XChaCha20Poly1305::new_from_slice(key.expose())
            .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?
            .encrypt(XNonce::from_slice(nonce), payload),
    };
    result.map_err(|e| VaultError::EncryptionFailed(format!("{} encryption failed: {}", cipher.name(), e)))
}

fn open(
    cipher: AeadCipher,
    key: &SymmetricKey,
    nonce: &[u8],
    aad: &[u8],
    sealed: &[u8],
) -> VaultResult<Vec<u8>> {
    let payload = Payload { msg: sealed, aad };
    let result = match cipher {
        AeadCipher::Aes256Gcm => Aes256Gcm::new_from_slice(key.expose())
            .map_err(|_| VaultError::AuthenticationFailed)?
            .decrypt(AesNonce::from_slice(nonce), payload),
        AeadCipher::XChaCha20Poly1305 => XChaCha20Poly1305::new_from_slice(key.expose())
            .map_err(|_| VaultError::AuthenticationFailed)?
            .decrypt(XNonce::from_slice(nonce), payload),
    };
    result.map_err(|_| VaultError::AuthenticationFailed)
}
