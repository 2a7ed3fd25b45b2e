//! MaskVault - Configuration
//!
//! Plain JSON configuration. Every field has a default, so an empty object
//! (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::{AeadCipher, KeySize};
use crate::error::{VaultError, VaultResult};

/// Lowest PBKDF2 iteration count accepted for passphrase-wrapped keys
pub const MIN_PBKDF2_ITERATIONS: u32 = 1_000;

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Application name used for the key directory names
    pub app_name: String,
    /// Explicit key directory; replaces the Documents candidate
    pub key_dir: Option<PathBuf>,
    /// Key size used when the caller does not pick one
    pub default_key_size: KeySize,
    /// PBKDF2-HMAC-SHA256 iterations for encrypted PKCS#8 private keys
    pub pbkdf2_iterations: u32,
    /// AEAD used for file encryption
    pub cipher: AeadCipher,
    /// Name of the encrypted data record file
    pub records_file: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            app_name: crate::APP_NAME.into(),
            key_dir: None,
            default_key_size: KeySize::Rsa2048,
            pbkdf2_iterations: 600_000,
            cipher: AeadCipher::default(),
            records_file: crate::file_codec::RECORDS_FILE.into(),
        }
    }
}

impl VaultConfig {
    /// Configuration for tests and constrained devices: cheap key wrapping
    pub fn low_cost() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            VaultError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: VaultConfig = serde_json::from_str(&json)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> VaultResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> VaultResult<()> {
        let name = self.app_name.trim();
        if name.is_empty() {
            return Err(VaultError::Config("app_name must not be empty".into()));
        }
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(VaultError::Config(format!(
                "app_name {:?} must be a plain directory name",
                self.app_name
            )));
        }
        if self.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(VaultError::Config(format!(
                "pbkdf2_iterations must be at least {}, got {}",
                MIN_PBKDF2_ITERATIONS, self.pbkdf2_iterations
            )));
        }
        if self.records_file.trim().is_empty() {
            return Err(VaultError::Config("records_file must not be empty".into()));
        }
        Ok(())
    }
}
