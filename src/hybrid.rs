//! MaskVault - Hybrid Encryption Service
//!
//! Short texts go straight through RSA-OAEP. Files and longer texts use a
//! fresh symmetric key that is handed back to the caller and never stored
//! next to the ciphertext.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::RsaPublicKey;
use secrecy::SecretString;

use crate::config::VaultConfig;
use crate::crypto::asymmetric::{decrypt_oaep, encrypt_oaep};
use crate::crypto::{AeadCipher, SymmetricCipher, SymmetricKey};
use crate::error::{VaultError, VaultResult};
use crate::file_codec::{
    encrypted_file_name, validate_file_name, EncryptedDataRecord, RecordKind,
};
use crate::keystore::KeyPair;
use crate::secure_fs::write_atomic;

/// RSA-OAEP ciphertext of a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    bytes: Vec<u8>,
}

impl EncryptedPayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Parse standard base64, as printed by the CLI and stored in records
    pub fn from_base64(text: &str) -> VaultResult<Self> {
        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(cleaned.as_bytes())
            .map(Self::from_bytes)
            .map_err(|e| VaultError::DecryptionFailed(format!("ciphertext is not base64: {}", e)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_record(&self) -> EncryptedDataRecord {
        EncryptedDataRecord::rsa_text(&self.bytes)
    }
}

/// Result of encrypting one file
#[derive(Debug)]
pub struct EncryptedFileRecord {
    pub original_file_name: String,
    pub encrypted_file_name: String,
    /// The only copy of the key; the caller decides where it goes
    pub symmetric_key: SymmetricKey,
    pub ciphertext: Vec<u8>,
    pub cipher: AeadCipher,
}

impl EncryptedFileRecord {
    /// Record without the key, for `encrypted_data.json`
    pub fn to_record(&self) -> EncryptedDataRecord {
        EncryptedDataRecord::file(
            &self.ciphertext,
            self.cipher,
            &self.original_file_name,
            &self.encrypted_file_name,
        )
    }

    /// Write the ciphertext as `<dir>/<encrypted_file_name>`
    pub fn write_to(&self, dir: &Path) -> VaultResult<PathBuf> {
        let path = dir.join(&self.encrypted_file_name);
        write_atomic(&path, &self.ciphertext)?;
        Ok(path)
    }
}

/// A file small enough to be sealed directly with RSA-OAEP
#[derive(Debug)]
pub struct RsaEncryptedFile {
    pub original_file_name: String,
    pub encrypted_file_name: String,
    pub payload: EncryptedPayload,
}

impl RsaEncryptedFile {
    pub fn to_record(&self) -> EncryptedDataRecord {
        EncryptedDataRecord::rsa_file(
            self.payload.as_bytes(),
            &self.original_file_name,
            &self.encrypted_file_name,
        )
    }

    /// Write the ciphertext as `<dir>/<encrypted_file_name>`
    pub fn write_to(&self, dir: &Path) -> VaultResult<PathBuf> {
        let path = dir.join(&self.encrypted_file_name);
        write_atomic(&path, self.payload.as_bytes())?;
        Ok(path)
    }
}

fn file_name_of(path: &Path) -> VaultResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| VaultError::InvalidFileName(format!("{} has no usable file name", path.display())))
}

/// RSA for short texts, AEAD for everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridService {
    cipher: SymmetricCipher,
}

impl HybridService {
    pub fn new(cipher: AeadCipher) -> Self {
        Self {
            cipher: SymmetricCipher::new(cipher),
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.cipher)
    }

    pub fn cipher(&self) -> AeadCipher {
        self.cipher.cipher()
    }

    /// RSA-OAEP(SHA-256) encryption of a short text.
    ///
    /// Fails with [`VaultError::PlaintextTooLarge`] past `k - 66` bytes.
    pub fn encrypt_text(&self, plaintext: &str, key: &RsaPublicKey) -> VaultResult<EncryptedPayload> {
        let bytes = encrypt_oaep(key, plaintext.as_bytes())?;
        tracing::debug!(len = plaintext.len(), "text encrypted with RSA-OAEP");
        Ok(EncryptedPayload::from_bytes(bytes))
    }

    /// Reverse of `encrypt_text`: base64 ciphertext back to UTF-8 text
    pub fn decrypt_text(
        &self,
        payload: &EncryptedPayload,
        pair: &KeyPair,
        passphrase: Option<&SecretString>,
    ) -> VaultResult<String> {
        let private = pair.private_key(passphrase)?;
        let plaintext = decrypt_oaep(&private, payload.as_bytes())?;

        std::str::from_utf8(&plaintext)
            .map(str::to_owned)
            .map_err(|_| VaultError::DecryptionFailed("plaintext is not UTF-8".into()))
    }

    /// Encrypt `plaintext` under a caller-held key
    pub fn encrypt_bytes(&self, plaintext: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
        self.cipher.encrypt(plaintext, key)
    }

    /// Open a frame produced by `encrypt_bytes`
    pub fn decrypt_bytes(&self, frame: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
        self.cipher.decrypt(frame, key)
    }

    /// Encrypt a file under a fresh key. Nothing is written.
    pub fn encrypt_file(&self, path: &Path) -> VaultResult<EncryptedFileRecord> {
        let original_file_name = file_name_of(path)?;
        let encrypted_file_name = encrypted_file_name(&original_file_name)?;

        let data = zeroize::Zeroizing::new(std::fs::read(path)?);
        let symmetric_key = SymmetricCipher::generate_key();
        let ciphertext = self.cipher.encrypt(&data, &symmetric_key)?;

        tracing::info!(
            file = %original_file_name,
            bytes = data.len(),
            cipher = self.cipher().name(),
            "file encrypted"
        );

        Ok(EncryptedFileRecord {
            original_file_name,
            encrypted_file_name,
            symmetric_key,
            ciphertext,
            cipher: self.cipher(),
        })
    }

    /// Seal a whole file in one RSA-OAEP block. Nothing is written.
    ///
    /// Only files up to `k - 66` bytes fit; larger ones fail with
    /// [`VaultError::PlaintextTooLarge`] and belong in `encrypt_file`.
    pub fn encrypt_small_file(&self, path: &Path, key: &RsaPublicKey) -> VaultResult<RsaEncryptedFile> {
        let original_file_name = file_name_of(path)?;
        let encrypted_file_name = encrypted_file_name(&original_file_name)?;

        let data = zeroize::Zeroizing::new(std::fs::read(path)?);
        let payload = EncryptedPayload::from_bytes(encrypt_oaep(key, &data)?);

        tracing::info!(file = %original_file_name, bytes = data.len(), "file encrypted with RSA-OAEP");
        Ok(RsaEncryptedFile {
            original_file_name,
            encrypted_file_name,
            payload,
        })
    }

    /// Open an RSA-OAEP file ciphertext and write the plaintext to
    /// `output_path`. Nothing is written if decryption fails.
    pub fn decrypt_small_file(
        &self,
        ciphertext: &[u8],
        pair: &KeyPair,
        passphrase: Option<&SecretString>,
        output_path: &Path,
    ) -> VaultResult<PathBuf> {
        let private = pair.private_key(passphrase)?;
        let plaintext = decrypt_oaep(&private, ciphertext)?;
        write_atomic(output_path, &plaintext)?;

        tracing::info!(path = %output_path.display(), bytes = plaintext.len(), "file decrypted with RSA-OAEP");
        Ok(output_path.to_path_buf())
    }

    /// Restore an RSA file record as `<output_dir>/<original_file_name>`
    pub fn decrypt_small_record(
        &self,
        record: &EncryptedDataRecord,
        pair: &KeyPair,
        passphrase: Option<&SecretString>,
        output_dir: &Path,
    ) -> VaultResult<PathBuf> {
        let name = record_file_name(record, RecordKind::RsaFile)?;
        self.decrypt_small_file(&record.ciphertext_bytes()?, pair, passphrase, &output_dir.join(name))
    }

    /// Decrypt a frame and write the plaintext to `output_path`.
    ///
    /// Nothing is written unless authentication succeeds.
    pub fn decrypt_file(
        &self,
        ciphertext: &[u8],
        key: &SymmetricKey,
        output_path: &Path,
    ) -> VaultResult<PathBuf> {
        let plaintext = zeroize::Zeroizing::new(self.cipher.decrypt(ciphertext, key)?);
        write_atomic(output_path, &plaintext)?;

        tracing::info!(path = %output_path.display(), bytes = plaintext.len(), "file decrypted");
        Ok(output_path.to_path_buf())
    }

    /// Restore a file record as `<output_dir>/<original_file_name>`
    pub fn decrypt_record(
        &self,
        record: &EncryptedDataRecord,
        key: &SymmetricKey,
        output_dir: &Path,
    ) -> VaultResult<PathBuf> {
        let name = record_file_name(record, RecordKind::File)?;
        self.decrypt_file(&record.ciphertext_bytes()?, key, &output_dir.join(name))
    }
}

fn record_file_name(record: &EncryptedDataRecord, expected: RecordKind) -> VaultResult<&str> {
    if record.kind != expected {
        return Err(VaultError::InvalidRecord(format!(
            "expected a {:?} record, found {:?}",
            expected, record.kind
        )));
    }
    let name = record
        .original_file_name
        .as_deref()
        .ok_or_else(|| VaultError::InvalidRecord("missing original_file_name".into()))?;
    validate_file_name(name)?;
    Ok(name)
}
