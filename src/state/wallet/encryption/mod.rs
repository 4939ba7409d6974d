//! Password-based encryption of wallet secrets at rest.
//!
//! Two profiles share this module:
//!
//! ```text
//! modern (master seed, account records, exports)
//!   password ── PBKDF2-HMAC-SHA256, 100k rounds, 16-byte salt ──▶ 256-bit key
//!   key ── AES-256-CBC, random IV, PKCS7 ──▶ EncryptedBlob
//!
//! legacy (MCM archives, read-only)
//!   password ── PBKDF2-HMAC-SHA1, archive-specified rounds ──▶ 128-bit key
//!   key ── AES-128-CBC, per-record IV, PKCS7 ──▶ plaintext
//! ```
//!
//! Neither profile authenticates its ciphertext. A wrong password is
//! detected by padding failure, so every decryption failure surfaces as the
//! single [`InvalidPassword`] error and callers must not try to tell the
//! causes apart.

pub use cipher::CbcCipher;
pub use format::EncryptedBlob;
pub use key_manager::KdfProfile;
pub use key_manager::LegacyKey;
pub use key_manager::PasswordVault;

mod cipher;
mod format;
mod key_manager;


/// Decryption failed. Deliberately carries no cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid password")]
pub struct InvalidPassword;
