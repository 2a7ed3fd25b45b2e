//! MaskVault - Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════
    #[error("No writable key directory (tried {} and {})", .primary.display(), .fallback.display())]
    StorageUnavailable { primary: PathBuf, fallback: PathBuf },

    #[error("Key file not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    #[error("Key file is corrupted ({}): {reason}", .path.display())]
    KeyCorrupt { path: PathBuf, reason: String },

    // ═══════════════════════════════════════════════════════════════
    // KEY ERRORS
    // ═══════════════════════════════════════════════════════════════
    #[error("Wrong or missing passphrase for the private key")]
    WrongPassphrase,

    #[error("Invalid {kind} key format: {reason}")]
    InvalidKeyFormat { kind: &'static str, reason: String },

    #[error("Public key does not belong to the private key")]
    KeyMismatch,

    #[error("Unsupported RSA key size: {bits} bits (expected 2048, 3072 or 4096)")]
    UnsupportedKeySize { bits: usize },

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════
    #[error("Plaintext is {len} bytes, RSA-OAEP limit for this key is {max} bytes")]
    PlaintextTooLarge { len: usize, max: usize },

    #[error("Authentication failed - wrong key or corrupted data")]
    AuthenticationFailed,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // FILE ERRORS
    // ═══════════════════════════════════════════════════════════════
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Invalid encrypted data record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl VaultError {
    /// Errors the caller can recover from by prompting, retrying with
    /// different input or re-importing. Everything else is fatal for the
    /// current operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::KeyNotFound(_)
                | VaultError::KeyCorrupt { .. }
                | VaultError::WrongPassphrase
                | VaultError::InvalidKeyFormat { .. }
                | VaultError::KeyMismatch
                | VaultError::UnsupportedKeySize { .. }
                | VaultError::PlaintextTooLarge { .. }
                | VaultError::AuthenticationFailed
                | VaultError::DecryptionFailed(_)
                | VaultError::InvalidFileName(_)
        )
    }

    /// Retrying with the same inputs cannot succeed; the caller has to
    /// ask for a different key, passphrase or payload.
    pub fn requires_new_input(&self) -> bool {
        matches!(
            self,
            VaultError::WrongPassphrase
                | VaultError::AuthenticationFailed
                | VaultError::DecryptionFailed(_)
                | VaultError::PlaintextTooLarge { .. }
        )
    }

    pub(crate) fn invalid_key(kind: &'static str, reason: impl Into<String>) -> Self {
        VaultError::InvalidKeyFormat {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        VaultError::KeyCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
