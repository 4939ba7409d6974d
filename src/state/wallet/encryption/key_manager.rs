//! Password-to-key derivation for both encryption profiles.

use std::fmt;

use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use sha1::Sha1;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::cipher::CbcCipher;
use super::cipher::IV_LEN;
use super::format::EncryptedBlob;
use super::InvalidPassword;
use crate::state::wallet::secret_bytes::SecretBytes;

pub const SALT_LEN: usize = 16;

/// PBKDF2 work factor for the modern profile.
///
/// `Testing` exists so that test suites can exercise the full encryption
/// path without spending seconds per derivation. Blobs written under one
/// profile do not decrypt under the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum KdfProfile {
    #[default]
    Production,
    Testing,
}

impl KdfProfile {
    pub fn iterations(self) -> u32 {
        match self {
            Self::Production => 100_000,
            Self::Testing => 10,
        }
    }
}

/// Modern profile: PBKDF2-HMAC-SHA256 into AES-256-CBC.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordVault {
    profile: KdfProfile,
}

impl PasswordVault {
    pub fn new(profile: KdfProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> KdfProfile {
        self.profile
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.profile.iterations(), &mut *key);
        key
    }

    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        salt
    }

    /// Encrypt under a fresh random salt and IV.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> EncryptedBlob {
        let salt = Self::generate_salt();
        let iv = CbcCipher::generate_iv();
        let key = self.derive_key(password, &salt);
        EncryptedBlob {
            ciphertext: CbcCipher::Aes256(&key).encrypt(plaintext, &iv),
            iv,
            salt: salt.to_vec(),
        }
    }

    pub fn decrypt(
        &self,
        blob: &EncryptedBlob,
        password: &str,
    ) -> Result<Zeroizing<Vec<u8>>, InvalidPassword> {
        let key = self.derive_key(password, &blob.salt);
        CbcCipher::Aes256(&key).decrypt(&blob.ciphertext, &blob.iv)
    }

    /// Encrypt under an already-derived key. The blob's salt is left empty.
    pub fn encrypt_with_key(plaintext: &[u8], key: &SecretBytes<32>) -> EncryptedBlob {
        let iv = CbcCipher::generate_iv();
        EncryptedBlob {
            ciphertext: CbcCipher::Aes256(key.expose()).encrypt(plaintext, &iv),
            iv,
            salt: Vec::new(),
        }
    }

    pub fn decrypt_with_key(
        blob: &EncryptedBlob,
        key: &SecretBytes<32>,
    ) -> Result<Zeroizing<Vec<u8>>, InvalidPassword> {
        CbcCipher::Aes256(key.expose()).decrypt(&blob.ciphertext, &blob.iv)
    }
}

/// Legacy profile key: PBKDF2-HMAC-SHA1 truncated to 128 bits, for
/// AES-128-CBC.
pub struct LegacyKey(SecretBytes<16>);

impl LegacyKey {
    pub fn derive(password: &str, salt: &[u8], iterations: u32) -> Self {
        let mut key = [0u8; 16];
        pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, iterations, &mut key);
        Self(SecretBytes::new(key))
    }

    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, InvalidPassword> {
        CbcCipher::Aes128(self.0.expose()).decrypt(ciphertext, iv)
    }

    /// Only archives produced by other software are ever decrypted; this
    /// side exists to build test archives.
    #[cfg(test)]
    pub(crate) fn encrypt(&self, plaintext: &[u8], iv: &[u8; IV_LEN]) -> Vec<u8> {
        CbcCipher::Aes128(self.0.expose()).encrypt(plaintext, iv)
    }
}

impl fmt::Debug for LegacyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LegacyKey(..)")
    }
}
