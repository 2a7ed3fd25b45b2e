//! MaskVault - On-Disk Formats
//!
//! Encrypted file naming, the `encrypted_data.json` record and the
//! symmetric key file.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{AeadCipher, SymmetricKey};
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::write_atomic;

/// Default name of the encrypted data record
pub const RECORDS_FILE: &str = "encrypted_data.json";

/// Default name of an exported file encryption key
pub const SYMMETRIC_KEY_FILE: &str = "file_encryption_key.txt";

/// Inserted between stem and extension of encrypted files
pub const ENCRYPTED_MARKER: &str = "<encrypted>";

pub const RECORD_VERSION: u32 = 1;

/// Split at the last dot, ignoring a leading one (`.bashrc` has no extension)
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

pub(crate) fn validate_file_name(name: &str) -> VaultResult<()> {
    let plain = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    if name.is_empty() || !plain || name == "." || name == ".." {
        return Err(VaultError::InvalidFileName(format!(
            "{:?} is not a plain file name",
            name
        )));
    }
    Ok(())
}

/// `report.txt` -> `report<encrypted>.txt`, `notes` -> `notes<encrypted>`
pub fn encrypted_file_name(original: &str) -> VaultResult<String> {
    validate_file_name(original)?;
    Ok(match split_extension(original) {
        (stem, Some(ext)) => format!("{}{}.{}", stem, ENCRYPTED_MARKER, ext),
        (stem, None) => format!("{}{}", stem, ENCRYPTED_MARKER),
    })
}

/// Inverse of [`encrypted_file_name`]; `None` when the marker is absent
pub fn decrypted_file_name(encrypted: &str) -> Option<String> {
    let (stem, ext) = split_extension(encrypted);
    let stem = stem.strip_suffix(ENCRYPTED_MARKER).filter(|s| !s.is_empty())?;
    Some(match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    })
}

/// What an [`EncryptedDataRecord`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// RSA-OAEP ciphertext of a short text
    RsaText,
    /// AEAD frame of a text, key kept by the user
    SymmetricText,
    /// AEAD frame of a file, key kept by the user
    File,
    /// RSA-OAEP ciphertext of a file small enough for one block
    RsaFile,
}

impl RecordKind {
    /// Whether the record stands for a file and must name it
    pub fn is_file(self) -> bool {
        matches!(self, RecordKind::File | RecordKind::RsaFile)
    }
}

/// Contents of `encrypted_data.json`. Never carries key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedDataRecord {
    pub version: u32,
    pub kind: RecordKind,
    /// Standard base64
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<AeadCipher>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EncryptedDataRecord {
    fn new(kind: RecordKind, ciphertext: &[u8], cipher: Option<AeadCipher>) -> Self {
        Self {
            version: RECORD_VERSION,
            kind,
            ciphertext: STANDARD.encode(ciphertext),
            cipher,
            original_file_name: None,
            encrypted_file_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn rsa_text(ciphertext: &[u8]) -> Self {
        Self::new(RecordKind::RsaText, ciphertext, None)
    }

    pub fn symmetric_text(frame: &[u8], cipher: AeadCipher) -> Self {
        Self::new(RecordKind::SymmetricText, frame, Some(cipher))
    }

    pub fn file(
        frame: &[u8],
        cipher: AeadCipher,
        original_file_name: &str,
        encrypted_file_name: &str,
    ) -> Self {
        Self {
            original_file_name: Some(original_file_name.to_string()),
            encrypted_file_name: Some(encrypted_file_name.to_string()),
            ..Self::new(RecordKind::File, frame, Some(cipher))
        }
    }

    pub fn rsa_file(ciphertext: &[u8], original_file_name: &str, encrypted_file_name: &str) -> Self {
        Self {
            original_file_name: Some(original_file_name.to_string()),
            encrypted_file_name: Some(encrypted_file_name.to_string()),
            ..Self::new(RecordKind::RsaFile, ciphertext, None)
        }
    }

    pub fn ciphertext_bytes(&self) -> VaultResult<Vec<u8>> {
        STANDARD
            .decode(self.ciphertext.trim())
            .map_err(|e| VaultError::InvalidRecord(format!("ciphertext is not base64: {}", e)))
    }

    /// Write as pretty JSON via an atomic replace
    pub fn save(&self, path: &Path) -> VaultResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)?;
        tracing::info!(path = %path.display(), kind = ?self.kind, "encrypted data record saved");
        Ok(())
    }

    pub fn load(path: &Path) -> VaultResult<Self> {
        let json = std::fs::read(path)?;
        let record: Self = serde_json::from_slice(&json)
            .map_err(|e| VaultError::InvalidRecord(format!("{}: {}", path.display(), e)))?;
        if record.version != RECORD_VERSION {
            return Err(VaultError::InvalidRecord(format!(
                "unsupported record version {}",
                record.version
            )));
        }
        if record.kind.is_file() && record.original_file_name.is_none() {
            return Err(VaultError::InvalidRecord("file record without original_file_name".into()));
        }
        Ok(record)
    }
}

/// Store a file key as its single-line base64 form
pub fn write_symmetric_key(path: &Path, key: &SymmetricKey) -> VaultResult<()> {
    write_atomic(path, key.to_base64().as_bytes())?;
    tracing::info!(path = %path.display(), "file encryption key written");
    Ok(())
}

pub fn read_symmetric_key(path: &Path) -> VaultResult<SymmetricKey> {
    let text = zeroize::Zeroizing::new(std::fs::read_to_string(path)?);
    SymmetricKey::from_base64(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_encrypted_names() {
        let cases = [
            ("report.txt", "report<encrypted>.txt"),
            ("notes", "notes<encrypted>"),
            ("a.tar.gz", "a.tar<encrypted>.gz"),
            (".bashrc", ".bashrc<encrypted>"),
            ("photo.JPG", "photo<encrypted>.JPG"),
        ];
        for (original, encrypted) in cases {
            assert_eq!(encrypted_file_name(original).unwrap(), encrypted);
            assert_eq!(decrypted_file_name(encrypted).as_deref(), Some(original));
        }
    }

    #[test]
    fn test_decrypted_name_requires_marker() {
        assert_eq!(decrypted_file_name("report.txt"), None);
        assert_eq!(decrypted_file_name("<encrypted>.txt"), None);
        assert_eq!(decrypted_file_name("report<encrypted>x.txt"), None);
    }

    #[test]
    fn test_rejects_paths_as_names() {
        for name in ["", ".", "..", "dir/file.txt", "/etc/passwd"] {
            assert!(
                matches!(encrypted_file_name(name), Err(VaultError::InvalidFileName(_))),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn test_record_json_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RECORDS_FILE);

        let record = EncryptedDataRecord::file(
            b"frame bytes",
            AeadCipher::XChaCha20Poly1305,
            "report.txt",
            "report<encrypted>.txt",
        );
        record.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["cipher"], "xchacha20-poly1305");
        assert_eq!(json["original_file_name"], "report.txt");
        assert!(json.get("key").is_none());

        let loaded = EncryptedDataRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.ciphertext_bytes().unwrap(), b"frame bytes");
    }

    #[test]
    fn test_rsa_record_omits_optional_fields() {
        let json = serde_json::to_value(EncryptedDataRecord::rsa_text(&[1, 2, 3])).unwrap();
        assert_eq!(json["kind"], "rsa_text");
        assert!(json.get("cipher").is_none());
        assert!(json.get("original_file_name").is_none());
    }

    #[test]
    fn test_rsa_file_record_needs_a_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RECORDS_FILE);

        let record = EncryptedDataRecord::rsa_file(&[9; 256], "note.txt", "note<encrypted>.txt");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "rsa_file");
        assert!(json.get("cipher").is_none());
        record.save(&path).unwrap();
        assert_eq!(EncryptedDataRecord::load(&path).unwrap(), record);

        let mut nameless = record;
        nameless.original_file_name = None;
        std::fs::write(&path, serde_json::to_vec(&nameless).unwrap()).unwrap();
        assert!(matches!(EncryptedDataRecord::load(&path), Err(VaultError::InvalidRecord(_))));
    }

    #[test]
    fn test_bad_records_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RECORDS_FILE);

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(EncryptedDataRecord::load(&path), Err(VaultError::InvalidRecord(_))));

        let mut record = EncryptedDataRecord::rsa_text(b"x");
        record.version = 99;
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();
        assert!(matches!(EncryptedDataRecord::load(&path), Err(VaultError::InvalidRecord(_))));

        record.version = RECORD_VERSION;
        record.ciphertext = "***".into();
        assert!(matches!(record.ciphertext_bytes(), Err(VaultError::InvalidRecord(_))));
    }

    #[test]
    fn test_symmetric_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SYMMETRIC_KEY_FILE);
        let key = SymmetricKey::generate();

        write_symmetric_key(&path, &key).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().len(), 44);
        assert_eq!(read_symmetric_key(&path).unwrap(), key);

        std::fs::write(&path, "too short").unwrap();
        assert!(matches!(
            read_symmetric_key(&path),
            Err(VaultError::InvalidKeyFormat { kind: "symmetric", .. })
        ));
    }
}
