//! AES-CBC with PKCS7 padding.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::BlockDecryptMut;
use aes::cipher::BlockEncryptMut;
use aes::cipher::KeyIvInit;
use rand::Rng;
use zeroize::Zeroizing;

use super::InvalidPassword;

pub const IV_LEN: usize = 16;

/// AES-CBC keyed for either profile: 32-byte keys select AES-256, 16-byte
/// keys AES-128.
pub enum CbcCipher<'k> {
    Aes256(&'k [u8; 32]),
    Aes128(&'k [u8; 16]),
}

impl CbcCipher<'_> {
    pub fn generate_iv() -> [u8; IV_LEN] {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill(&mut iv);
        iv
    }

    pub fn encrypt(&self, plaintext: &[u8], iv: &[u8; IV_LEN]) -> Vec<u8> {
        let iv = GenericArray::from_slice(iv);
        match self {
            Self::Aes256(key) => cbc::Encryptor::<aes::Aes256>::new(GenericArray::from_slice(*key), iv)
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Self::Aes128(key) => cbc::Encryptor::<aes::Aes128>::new(GenericArray::from_slice(*key), iv)
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        }
    }

    /// Fails on bad padding or a ciphertext that is not a whole number of
    /// blocks, the only signals CBC gives of a wrong key.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, InvalidPassword> {
        let iv = GenericArray::from_slice(iv);
        let plaintext = match self {
            Self::Aes256(key) => cbc::Decryptor::<aes::Aes256>::new(GenericArray::from_slice(*key), iv)
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            Self::Aes128(key) => cbc::Decryptor::<aes::Aes128>::new(GenericArray::from_slice(*key), iv)
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        };
        plaintext.map(Zeroizing::new).map_err(|_| InvalidPassword)
    }
}
