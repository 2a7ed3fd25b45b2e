//! MaskVault - Cryptographic Core
//!
//! RSA-OAEP and PKCS#8 handling for the asymmetric side, AES-256-GCM and
//! XChaCha20-Poly1305 for the symmetric side.

pub mod aead;
pub mod asymmetric;
pub mod keys;

pub use aead::{AeadCipher, SymmetricCipher};
pub use asymmetric::{KeyDecodeError, KeySize, OAEP_HASH_LEN};
pub use keys::{SymmetricKey, KEY_LEN};
