//! MaskVault - RSA Primitives
//!
//! Key generation, RSA-OAEP (SHA-256) and PEM encoding. Passphrase
//! protected private keys use encrypted PKCS#8 (PBES2 with
//! PBKDF2-HMAC-SHA256 and AES-256-CBC).

use pkcs8::der::Document;
use pkcs8::pkcs5::pbes2;
use pkcs8::{EncryptedPrivateKeyInfo, LineEnding, PrivateKeyInfo};
use rand::{rngs::OsRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Output length of the OAEP hash (SHA-256)
pub const OAEP_HASH_LEN: usize = 32;

pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
pub const RSA_PUBLIC_KEY_LABEL: &str = "RSA PUBLIC KEY";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
pub const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

/// Public exponent used for generated keys
const PUBLIC_EXPONENT: u64 = 65_537;

/// Supported RSA modulus sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum KeySize {
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl KeySize {
    pub const ALL: [KeySize; 3] = [KeySize::Rsa2048, KeySize::Rsa3072, KeySize::Rsa4096];

    pub fn bits(self) -> usize {
        match self {
            KeySize::Rsa2048 => 2048,
            KeySize::Rsa3072 => 3072,
            KeySize::Rsa4096 => 4096,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() / 8
    }

    pub fn from_bits(bits: usize) -> VaultResult<Self> {
        match bits {
            2048 => Ok(KeySize::Rsa2048),
            3072 => Ok(KeySize::Rsa3072),
            4096 => Ok(KeySize::Rsa4096),
            _ => Err(VaultError::UnsupportedKeySize { bits }),
        }
    }

    /// Largest plaintext RSA-OAEP(SHA-256) accepts for this modulus
    pub fn oaep_max_plaintext(self) -> usize {
        oaep_bound(self.bytes())
    }
}

impl TryFrom<usize> for KeySize {
    type Error = VaultError;

    fn try_from(bits: usize) -> VaultResult<Self> {
        KeySize::from_bits(bits)
    }
}

impl From<KeySize> for usize {
    fn from(size: KeySize) -> usize {
        size.bits()
    }
}

impl std::fmt::Display for KeySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bits())
    }
}

fn oaep_bound(modulus_bytes: usize) -> usize {
    modulus_bytes.saturating_sub(2 * OAEP_HASH_LEN + 2)
}

/// Size class of an existing key
pub fn key_size_of(key: &RsaPublicKey) -> VaultResult<KeySize> {
    KeySize::from_bits(key.n().bits())
}

/// Largest plaintext `key` can encrypt with RSA-OAEP(SHA-256)
pub fn oaep_max_plaintext(key: &RsaPublicKey) -> usize {
    oaep_bound(key.size())
}

pub fn generate_private_key(size: KeySize) -> VaultResult<RsaPrivateKey> {
    let exponent = rsa::BigUint::from(PUBLIC_EXPONENT);
    RsaPrivateKey::new_with_exp(&mut OsRng, size.bits(), &exponent)
        .map_err(|e| VaultError::KeyGenerationFailed(e.to_string()))
}

/// Encrypt with RSA-OAEP, checking the size bound before touching the key
pub fn encrypt_oaep(key: &RsaPublicKey, plaintext: &[u8]) -> VaultResult<Vec<u8>> {
    let max = oaep_max_plaintext(key);
    if plaintext.len() > max {
        return Err(VaultError::PlaintextTooLarge {
            len: plaintext.len(),
            max,
        });
    }

    key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("RSA-OAEP: {}", e)))
}

pub fn decrypt_oaep(key: &RsaPrivateKey, ciphertext: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
    if ciphertext.len() != key.size() {
        return Err(VaultError::DecryptionFailed(format!(
            "ciphertext is {} bytes, key expects {}",
            ciphertext.len(),
            key.size()
        )));
    }

    key.decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::DecryptionFailed("OAEP padding check failed".into()))
}

// ═══════════════════════════════════════════════════════════════════════════
// PEM encoding
// ═══════════════════════════════════════════════════════════════════════════

fn effective_passphrase(passphrase: Option<&SecretString>) -> Option<&str> {
    passphrase
        .map(|p| p.expose_secret())
        .filter(|p| !p.is_empty())
}

/// Serialize a private key as PKCS#8 PEM, encrypted when a non-empty
/// passphrase is given
pub fn encode_private_key(
    key: &RsaPrivateKey,
    passphrase: Option<&SecretString>,
    pbkdf2_iterations: u32,
) -> VaultResult<Zeroizing<String>> {
    let der = key
        .to_pkcs8_der()
        .map_err(|e| VaultError::KeyGenerationFailed(format!("PKCS#8 encoding: {}", e)))?;

    let Some(passphrase) = effective_passphrase(passphrase) else {
        return der
            .to_pem(PRIVATE_KEY_LABEL, LineEnding::LF)
            .map_err(|e| VaultError::KeyGenerationFailed(format!("PEM encoding: {}", e)));
    };

    let mut salt = [0u8; 16];
    let mut iv = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(pbkdf2_iterations, &salt, &iv)
        .map_err(|e| VaultError::KeyGenerationFailed(format!("PBES2 parameters: {}", e)))?;
    let info = PrivateKeyInfo::try_from(der.as_bytes())
        .map_err(|e| VaultError::KeyGenerationFailed(format!("PKCS#8 encoding: {}", e)))?;
    let encrypted = info
        .encrypt_with_params(params, passphrase.as_bytes())
        .map_err(|e| VaultError::KeyGenerationFailed(format!("PKCS#8 encryption: {}", e)))?;

    encrypted
        .to_pem(ENCRYPTED_PRIVATE_KEY_LABEL, LineEnding::LF)
        .map_err(|e| VaultError::KeyGenerationFailed(format!("PEM encoding: {}", e)))
}

pub fn encode_public_key(key: &RsaPublicKey) -> VaultResult<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| VaultError::KeyGenerationFailed(format!("SPKI encoding: {}", e)))
}

/// Why a PEM private key could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDecodeError {
    /// The PEM or its ASN.1 structure is broken
    Malformed(String),
    /// Structure is fine, the passphrase is missing or does not unlock it
    WrongPassphrase,
}

impl std::fmt::Display for KeyDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyDecodeError::Malformed(reason) => write!(f, "{}", reason),
            KeyDecodeError::WrongPassphrase => write!(f, "wrong or missing passphrase"),
        }
    }
}

fn malformed(e: impl std::fmt::Display) -> KeyDecodeError {
    KeyDecodeError::Malformed(e.to_string())
}

/// True if the PEM text carries an encrypted PKCS#8 label
pub fn is_encrypted_pem(pem: &str) -> bool {
    pem.contains(&format!("BEGIN {}", ENCRYPTED_PRIVATE_KEY_LABEL))
}

/// Decode a PKCS#8 (plain or encrypted) or PKCS#1 private key.
///
/// The encrypted container is parsed before the passphrase is tried, so a
/// damaged file is reported as malformed and only a structurally valid key
/// that fails to unlock is reported as a passphrase problem.
pub fn decode_private_key(
    pem: &str,
    passphrase: Option<&SecretString>,
) -> Result<RsaPrivateKey, KeyDecodeError> {
    let (label, doc) = Document::from_pem(pem.trim()).map_err(malformed)?;

    match label {
        ENCRYPTED_PRIVATE_KEY_LABEL => {
            let info = EncryptedPrivateKeyInfo::try_from(doc.as_bytes()).map_err(malformed)?;
            let passphrase =
                effective_passphrase(passphrase).ok_or(KeyDecodeError::WrongPassphrase)?;
            let decrypted = info
                .decrypt(passphrase.as_bytes())
                .map_err(|_| KeyDecodeError::WrongPassphrase)?;
            RsaPrivateKey::from_pkcs8_der(decrypted.as_bytes())
                .map_err(|_| KeyDecodeError::WrongPassphrase)
        }
        PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs8_der(doc.as_bytes()).map_err(malformed),
        RSA_PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs1_der(doc.as_bytes()).map_err(malformed),
        other => Err(KeyDecodeError::Malformed(format!(
            "unexpected PEM label {:?}",
            other
        ))),
    }
}

/// Decode an SPKI or PKCS#1 public key
pub fn decode_public_key(pem: &str) -> Result<RsaPublicKey, String> {
    let (label, doc) = Document::from_pem(pem.trim()).map_err(|e| e.to_string())?;

    match label {
        PUBLIC_KEY_LABEL => RsaPublicKey::from_public_key_der(doc.as_bytes()).map_err(|e| e.to_string()),
        RSA_PUBLIC_KEY_LABEL => RsaPublicKey::from_pkcs1_der(doc.as_bytes()).map_err(|e| e.to_string()),
        other => Err(format!("unexpected PEM label {:?}", other)),
    }
}

/// SHA-256 over the SPKI DER encoding, hex encoded
pub fn public_key_fingerprint(key: &RsaPublicKey) -> VaultResult<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| VaultError::KeyGenerationFailed(format!("SPKI encoding: {}", e)))?;
    Ok(hex::encode(Sha256::digest(der.as_bytes())))
}
