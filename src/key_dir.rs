//! MaskVault - Key Directory Resolution
//!
//! Finds a writable home for key material, independent of where the binary
//! runs from (a packaged app may live on a read-only mount).

use std::path::{Path, PathBuf};

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::secure_fs::ensure_writable_dir;

/// The resolved key directory plus both candidates, for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDirectory {
    /// Directory that passed the writability probe
    pub path: PathBuf,
    /// First candidate (`~/Documents/<AppName>_Keys` or the configured override)
    pub primary: PathBuf,
    /// Second candidate (`~/.<appname>_keys`)
    pub fallback: PathBuf,
    /// Whether the primary candidate was rejected
    pub used_fallback: bool,
}

impl KeyDirectory {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered candidate list for the key directory
#[derive(Debug, Clone)]
pub struct KeyDirectoryResolver {
    primary: PathBuf,
    fallback: PathBuf,
}

impl KeyDirectoryResolver {
    /// Standard candidates under the user's home directory
    pub fn new(app_name: &str) -> VaultResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            VaultError::Config("cannot determine the user's home directory".into())
        })?;
        Ok(Self::under_home(&home, app_name))
    }

    /// Candidates derived from configuration: an explicit `key_dir`
    /// replaces the Documents candidate, the home fallback stays.
    pub fn from_config(config: &VaultConfig) -> VaultResult<Self> {
        let mut resolver = Self::new(&config.app_name)?;
        if let Some(dir) = &config.key_dir {
            resolver.primary = dir.clone();
        }
        Ok(resolver)
    }

    /// `~/Documents/<app>_Keys` with `~/.<app>_keys` as fallback
    pub fn under_home(home: &Path, app_name: &str) -> Self {
        Self {
            primary: home.join("Documents").join(format!("{}_Keys", app_name)),
            fallback: home.join(format!(".{}_keys", app_name.to_lowercase())),
        }
    }

    /// Explicit primary and fallback directories
    pub fn with_candidates(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    /// Preferred directory
    pub fn primary(&self) -> &Path {
        &self.primary
    }

    /// Directory used when the primary is not writable
    pub fn fallback(&self) -> &Path {
        &self.fallback
    }

    /// Return the first candidate that can be created and written to
    pub fn resolve(&self) -> VaultResult<KeyDirectory> {
        for (candidate, used_fallback) in [(&self.primary, false), (&self.fallback, true)] {
            match ensure_writable_dir(candidate) {
                Ok(()) => {
                    if used_fallback {
                        tracing::warn!(
                            primary = %self.primary.display(),
                            fallback = %candidate.display(),
                            "primary key directory not writable, using fallback"
                        );
                    } else {
                        tracing::debug!(path = %candidate.display(), "key directory resolved");
                    }
                    return Ok(KeyDirectory {
                        path: candidate.clone(),
                        primary: self.primary.clone(),
                        fallback: self.fallback.clone(),
                        used_fallback,
                    });
                }
                Err(e) => {
                    tracing::debug!(path = %candidate.display(), error = %e, "key directory candidate rejected");
                }
            }
        }

        Err(VaultError::StorageUnavailable {
            primary: self.primary.clone(),
            fallback: self.fallback.clone(),
        })
    }
}
