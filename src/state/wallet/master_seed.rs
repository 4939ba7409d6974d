use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bip39::Language;
use bip39::Mnemonic;
use bip39::Seed;
use zeroize::Zeroizing;

use super::derivation;
use super::derivation::WotsKeypair;
use super::encryption::EncryptedBlob;
use super::encryption::PasswordVault;
use super::errors::WalletError;
use super::kdf;
use super::secret_bytes::SecretBytes;
use super::wots::AccountTag;

/// Entropy length for freshly created seeds: a 24-word phrase.
const CREATE_ENTROPY_LEN: usize = 32;

// leading byte of the exported payload
const PAYLOAD_RAW_SECRET: u8 = 0;
const PAYLOAD_ENTROPY: u8 = 1;

struct SeedMaterial {
    secret: SecretBytes<32>,
    entropy: Option<Zeroizing<Vec<u8>>>,
}

impl SeedMaterial {
    fn from_entropy(entropy: &[u8]) -> Result<Self, WalletError> {
        let mnemonic = Mnemonic::from_entropy(entropy, Language::English)
            .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
        Ok(Self::from_mnemonic(&mnemonic))
    }

    /// The master secret is the first half of the BIP-39 seed, with an
    /// empty passphrase.
    fn from_mnemonic(mnemonic: &Mnemonic) -> Self {
        let seed = Seed::new(mnemonic, "");
        let secret = SecretBytes::from_slice(&seed.as_bytes()[..32])
            .expect("BIP-39 seeds are 64 bytes");
        Self {
            secret,
            entropy: Some(Zeroizing::new(mnemonic.entropy().to_vec())),
        }
    }

    fn encode_payload(&self) -> Zeroizing<String> {
        let mut raw = Zeroizing::new(Vec::with_capacity(1 + CREATE_ENTROPY_LEN));
        match &self.entropy {
            Some(entropy) => {
                raw.push(PAYLOAD_ENTROPY);
                raw.extend_from_slice(entropy);
            }
            None => {
                raw.push(PAYLOAD_RAW_SECRET);
                raw.extend_from_slice(self.secret.expose());
            }
        }
        Zeroizing::new(BASE64.encode(&*raw))
    }

    fn decode_payload(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        let raw = Zeroizing::new(BASE64.decode(text.trim()).ok()?);
        let (kind, body) = raw.split_first()?;
        match *kind {
            PAYLOAD_RAW_SECRET => Some(Self {
                secret: SecretBytes::from_slice(body)?,
                entropy: None,
            }),
            PAYLOAD_ENTROPY => Self::from_entropy(body).ok(),
            _ => None,
        }
    }
}

/// The wallet's root secret.
///
/// A `MasterSeed` is either unlocked, holding the 32-byte master secret and,
/// when it came from a recovery phrase, the phrase's entropy; or locked,
/// holding nothing. Locking is terminal: a locked seed is never unlocked
/// again, a new one is imported instead. Every derivation fails with
/// [`WalletError::Locked`] on a locked seed.
pub struct MasterSeed {
    material: Option<SeedMaterial>,
    exported: Option<EncryptedBlob>,
    vault: PasswordVault,
}

impl MasterSeed {
    fn unlocked(material: SeedMaterial) -> Self {
        Self {
            material: Some(material),
            exported: None,
            vault: PasswordVault::default(),
        }
    }

    /// A new seed from 32 bytes of fresh entropy.
    pub fn create() -> Self {
        let entropy = SecretBytes::<CREATE_ENTROPY_LEN>::random();
        let mnemonic = Mnemonic::from_entropy(entropy.expose(), Language::English)
            .expect("32 bytes is a valid BIP-39 entropy length");
        Self::unlocked(SeedMaterial::from_mnemonic(&mnemonic))
    }

    /// Restore from a BIP-39 English phrase; the checksum word is verified.
    pub fn from_phrase(phrase: &str) -> Result<Self, WalletError> {
        let normalized = Zeroizing::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
        let mnemonic = Mnemonic::from_phrase(&normalized, Language::English)
            .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
        Ok(Self::unlocked(SeedMaterial::from_mnemonic(&mnemonic)))
    }

    /// Wrap a raw master secret. Such a seed has no recovery phrase.
    pub fn from_secret(secret: SecretBytes<32>) -> Self {
        Self::unlocked(SeedMaterial {
            secret,
            entropy: None,
        })
    }

    /// Decrypt a blob produced by [`export`](Self::export).
    ///
    /// Every failure, from bad padding to a malformed payload, is reported
    /// as [`WalletError::InvalidPassword`].
    pub fn import(blob: &EncryptedBlob, password: &str) -> Result<Self, WalletError> {
        Self::import_with_vault(blob, password, PasswordVault::default())
    }

    pub fn import_with_vault(
        blob: &EncryptedBlob,
        password: &str,
        vault: PasswordVault,
    ) -> Result<Self, WalletError> {
        let payload = vault.decrypt(blob, password)?;
        let material = SeedMaterial::decode_payload(&payload).ok_or(WalletError::InvalidPassword)?;
        Ok(Self {
            material: Some(material),
            exported: Some(blob.clone()),
            vault,
        })
    }

    /// Use `vault` for subsequent exports.
    pub fn with_vault(mut self, vault: PasswordVault) -> Self {
        self.vault = vault;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.material.is_none()
    }

    pub fn has_entropy(&self) -> bool {
        self.material
            .as_ref()
            .is_some_and(|material| material.entropy.is_some())
    }

    fn material(&self) -> Result<&SeedMaterial, WalletError> {
        self.material.as_ref().ok_or(WalletError::Locked)
    }

    fn secret(&self) -> Result<&SecretBytes<32>, WalletError> {
        Ok(&self.material()?.secret)
    }

    pub fn to_phrase(&self) -> Result<Zeroizing<String>, WalletError> {
        let entropy = self.material()?.entropy.as_ref().ok_or(WalletError::NoEntropy)?;
        let mnemonic = Mnemonic::from_entropy(entropy, Language::English)
            .map_err(|e| WalletError::InvalidPhrase(e.to_string()))?;
        Ok(Zeroizing::new(mnemonic.phrase().to_string()))
    }

    /// Encrypt the seed under `password`.
    ///
    /// If this seed was exported or imported before, `password` must decrypt
    /// that earlier blob, so an export can never silently change the
    /// password protecting the wallet.
    pub fn export(&mut self, password: &str) -> Result<EncryptedBlob, WalletError> {
        self.verify_password(password)?;
        let material = self.material()?;
        let blob = self.vault.encrypt(material.encode_payload().as_bytes(), password);
        self.exported = Some(blob.clone());
        Ok(blob)
    }

    /// Re-encrypt under `new_password` after verifying `old_password`
    /// against the last exported blob.
    pub fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
    ) -> Result<EncryptedBlob, WalletError> {
        self.verify_password(old_password)?;
        let material = self.material()?;
        let blob = self.vault.encrypt(material.encode_payload().as_bytes(), new_password);
        self.exported = Some(blob.clone());
        Ok(blob)
    }

    /// Padding alone accepts roughly one wrong password in 256, so the
    /// earlier blob must also decode to this very secret.
    fn verify_password(&self, password: &str) -> Result<(), WalletError> {
        let material = self.material()?;
        let Some(previous) = &self.exported else {
            return Ok(());
        };
        let payload = self.vault.decrypt(previous, password)?;
        match SeedMaterial::decode_payload(&payload) {
            Some(decoded) if decoded.secret == material.secret => Ok(()),
            _ => Err(WalletError::InvalidPassword),
        }
    }

    /// Zero all secret material. Terminal.
    pub fn lock(&mut self) {
        self.material = None;
        self.exported = None;
    }

    pub fn derive_account_seed(&self, account_index: u32) -> Result<SecretBytes<32>, WalletError> {
        Ok(kdf::derive_account_seed(self.secret()?, account_index))
    }

    pub fn derive_account_tag(&self, account_index: u32) -> Result<AccountTag, WalletError> {
        Ok(derivation::derive_account_tag(self.secret()?, account_index))
    }

    /// Keypair `wots_index` of account `account_index`, tagged with the
    /// account's tag.
    pub fn derive_wots_keypair(
        &self,
        account_index: u32,
        wots_index: i64,
    ) -> Result<WotsKeypair, WalletError> {
        let account_seed = self.derive_account_seed(account_index)?;
        let tag = self.derive_account_tag(account_index)?;
        derivation::derive_wots_keypair(&account_seed, wots_index, Some(&tag))
    }

    pub fn derive_first_keypair(&self, account_index: u32) -> Result<WotsKeypair, WalletError> {
        let account_seed = self.derive_account_seed(account_index)?;
        let tag = self.derive_account_tag(account_index)?;
        Ok(derivation::derive_first_keypair(&account_seed, &tag))
    }

    pub fn derive_storage_key(&self) -> Result<SecretBytes<32>, WalletError> {
        Ok(kdf::derive_storage_key(self.secret()?))
    }

    pub fn derive_scan_tag(&self, account_index: u32) -> Result<String, WalletError> {
        Ok(kdf::derive_scan_tag(self.secret()?, account_index))
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSeed")
            .field("locked", &self.is_locked())
            .field("has_entropy", &self.has_entropy())
            .field("kdf_profile", &self.vault.profile())
            .finish()
    }
}
