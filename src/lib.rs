//! # MaskVault
//!
//! RSA key lifecycle management and hybrid encryption for texts and files.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        MASKVAULT                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │  KEY DIR     │  │  KEY STORE   │  │  PEM FORMAT    │  │
//! │  │  Documents → │  │  RSA + PKCS8 │  │  paste cleanup │  │
//! │  │  ~/.fallback │  │  PBES2 wrap  │  │  notes parser  │  │
//! │  └──────┬───────┘  └──────┬───────┘  └───────┬────────┘  │
//! │         │                 │                  │           │
//! │  ┌──────┴─────────────────┴──────────────────┴────────┐  │
//! │  │                  HYBRID SERVICE                     │  │
//! │  │   RSA-OAEP (short text) │ XChaCha20 / AES-GCM file  │  │
//! │  └─────────────────────────┬──────────────────────────┘  │
//! │                            │                             │
//! │  ┌─────────────────────────┴──────────────────────────┐  │
//! │  │  FILE CODEC: name<encrypted>.ext, records, key file │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - RSA-OAEP with SHA-256, bound checked before encryption
//! - Private keys optionally wrapped as encrypted PKCS#8
//! - Per-file random keys, returned to the caller and never stored
//! - Atomic owner-only writes for every artifact
//! - Key material zeroized after use

pub mod config;
pub mod crypto;
pub mod error;
pub mod file_codec;
pub mod hybrid;
pub mod key_dir;
pub mod keystore;
pub mod pem_format;
pub mod secure_fs;

pub use config::VaultConfig;
pub use crypto::{AeadCipher, KeySize, SymmetricCipher, SymmetricKey};
pub use error::{VaultError, VaultResult};
pub use file_codec::{EncryptedDataRecord, RecordKind};
pub use hybrid::{EncryptedFileRecord, EncryptedPayload, HybridService, RsaEncryptedFile};
pub use key_dir::{KeyDirectory, KeyDirectoryResolver};
pub use keystore::{KeyPair, KeyStore, StoredKeyPair};
pub use pem_format::{format_key, parse_key_notes, KeyKind, KeyNotes};

/// MaskVault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default application name, used for key directory names
pub const APP_NAME: &str = "MaskVault";
