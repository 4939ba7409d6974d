//! Wallet records on top of a [`KeyValueStore`].
//!
//! Layout:
//!
//! | key                  | value                                         |
//! |----------------------|-----------------------------------------------|
//! | `master_seed`        | JSON [`EncryptedBlob`], password-encrypted    |
//! | `account:<tag>`      | JSON [`EncryptedAccount`], storage-key encrypted |
//! | `active_account`     | tag hex                                       |
//! | `next_account_index` | decimal, never decreases                      |

use zeroize::Zeroizing;

use super::account::Account;
use super::encryption::EncryptedBlob;
use super::encryption::PasswordVault;
use super::errors::WalletError;
use super::secret_bytes::SecretBytes;
use super::wallet_export::EncryptedAccount;
use super::wots::AccountTag;
use crate::application::storage::KeyValueStore;
use crate::application::storage::StorageError;

const MASTER_SEED_KEY: &str = "master_seed";
const ACCOUNT_PREFIX: &str = "account:";
const ACTIVE_ACCOUNT_KEY: &str = "active_account";
const NEXT_ACCOUNT_INDEX_KEY: &str = "next_account_index";

fn account_key(tag: &AccountTag) -> String {
    format!("{ACCOUNT_PREFIX}{tag}")
}

fn corrupt(key: &str, reason: impl ToString) -> StorageError {
    StorageError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Everything needed to replace a wallet's stored state in one batch.
#[derive(Debug)]
pub struct WalletSnapshot {
    pub master_seed: EncryptedBlob,
    pub accounts: Vec<EncryptedAccount>,
    pub active_account: Option<AccountTag>,
    pub next_account_index: u32,
}

#[derive(Debug, Clone)]
pub struct WalletStore<S> {
    store: S,
}

impl<S: KeyValueStore> WalletStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn encrypt_account(
        account: &Account,
        storage_key: &SecretBytes<32>,
    ) -> Result<EncryptedAccount, WalletError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(account)?);
        Ok(EncryptedAccount {
            tag: account.tag,
            data: PasswordVault::encrypt_with_key(&plaintext, storage_key),
        })
    }

    /// A record that does not decrypt, or decrypts to something that is not
    /// an account, means the storage key is wrong.
    pub fn decrypt_account(
        record: &EncryptedAccount,
        storage_key: &SecretBytes<32>,
    ) -> Result<Account, WalletError> {
        let plaintext = PasswordVault::decrypt_with_key(&record.data, storage_key)?;
        let account: Account =
            serde_json::from_slice(&plaintext).map_err(|_| WalletError::InvalidPassword)?;
        if account.tag != record.tag {
            return Err(WalletError::InvalidPassword);
        }
        Ok(account)
    }

    fn record_entry(record: &EncryptedAccount) -> Result<(String, Vec<u8>), WalletError> {
        Ok((account_key(&record.tag), serde_json::to_vec(record)?))
    }

    pub async fn has_master_seed(&self) -> Result<bool, WalletError> {
        Ok(self.store.load(MASTER_SEED_KEY).await?.is_some())
    }

    pub async fn save_master_seed(&self, blob: &EncryptedBlob) -> Result<(), WalletError> {
        self.store
            .save(MASTER_SEED_KEY, &serde_json::to_vec(blob)?)
            .await?;
        Ok(())
    }

    pub async fn load_master_seed(&self) -> Result<Option<EncryptedBlob>, WalletError> {
        let Some(bytes) = self.store.load(MASTER_SEED_KEY).await? else {
            return Ok(None);
        };
        let blob = serde_json::from_slice(&bytes).map_err(|e| corrupt(MASTER_SEED_KEY, e))?;
        Ok(Some(blob))
    }

    pub async fn save_account(
        &self,
        account: &Account,
        storage_key: &SecretBytes<32>,
    ) -> Result<(), WalletError> {
        let (key, value) = Self::record_entry(&Self::encrypt_account(account, storage_key)?)?;
        self.store.save(&key, &value).await?;
        Ok(())
    }

    /// Save several accounts, all or none.
    pub async fn save_accounts(
        &self,
        accounts: &[Account],
        storage_key: &SecretBytes<32>,
    ) -> Result<(), WalletError> {
        let batch = accounts
            .iter()
            .map(|account| Self::record_entry(&Self::encrypt_account(account, storage_key)?))
            .collect::<Result<Vec<_>, _>>()?;
        self.store.save_batch(batch).await?;
        Ok(())
    }

    /// Save a newly created account together with the advanced account
    /// index, so neither is persisted without the other.
    pub async fn save_new_account(
        &self,
        account: &Account,
        storage_key: &SecretBytes<32>,
        next_account_index: u32,
    ) -> Result<(), WalletError> {
        let batch = vec![
            Self::record_entry(&Self::encrypt_account(account, storage_key)?)?,
            (
                NEXT_ACCOUNT_INDEX_KEY.to_string(),
                next_account_index.to_string().into_bytes(),
            ),
        ];
        self.store.save_batch(batch).await?;
        Ok(())
    }

    pub async fn load_encrypted_accounts(&self) -> Result<Vec<EncryptedAccount>, WalletError> {
        let mut records = Vec::new();
        for key in self.store.keys(ACCOUNT_PREFIX).await? {
            let Some(bytes) = self.store.load(&key).await? else {
                continue;
            };
            let record = serde_json::from_slice(&bytes).map_err(|e| corrupt(&key, e))?;
            records.push(record);
        }
        Ok(records)
    }

    pub async fn load_accounts(
        &self,
        storage_key: &SecretBytes<32>,
    ) -> Result<Vec<Account>, WalletError> {
        self.load_encrypted_accounts()
            .await?
            .iter()
            .map(|record| Self::decrypt_account(record, storage_key))
            .collect()
    }

    pub async fn save_active_account(&self, tag: Option<&AccountTag>) -> Result<(), WalletError> {
        match tag {
            Some(tag) => {
                self.store
                    .save(ACTIVE_ACCOUNT_KEY, tag.to_string().as_bytes())
                    .await?
            }
            None => self.store.remove(ACTIVE_ACCOUNT_KEY).await?,
        }
        Ok(())
    }

    pub async fn load_active_account(&self) -> Result<Option<AccountTag>, WalletError> {
        let Some(bytes) = self.store.load(ACTIVE_ACCOUNT_KEY).await? else {
            return Ok(None);
        };
        let tag = std::str::from_utf8(&bytes)
            .map_err(|e| corrupt(ACTIVE_ACCOUNT_KEY, e))?
            .parse()
            .map_err(|e| corrupt(ACTIVE_ACCOUNT_KEY, e))?;
        Ok(Some(tag))
    }

    /// Index the next derived account will use.
    pub async fn next_account_index(&self) -> Result<u32, WalletError> {
        let Some(bytes) = self.store.load(NEXT_ACCOUNT_INDEX_KEY).await? else {
            return Ok(0);
        };
        let index = std::str::from_utf8(&bytes)
            .map_err(|e| corrupt(NEXT_ACCOUNT_INDEX_KEY, e))?
            .parse()
            .map_err(|e| corrupt(NEXT_ACCOUNT_INDEX_KEY, e))?;
        Ok(index)
    }

    /// Write `snapshot` in one batch, then drop account records it does not
    /// contain.
    pub async fn replace_all(&self, snapshot: WalletSnapshot) -> Result<(), WalletError> {
        let stale = self.store.keys(ACCOUNT_PREFIX).await?;

        let mut batch = vec![
            (
                MASTER_SEED_KEY.to_string(),
                serde_json::to_vec(&snapshot.master_seed)?,
            ),
            (
                NEXT_ACCOUNT_INDEX_KEY.to_string(),
                snapshot.next_account_index.to_string().into_bytes(),
            ),
        ];
        if let Some(tag) = &snapshot.active_account {
            batch.push((ACTIVE_ACCOUNT_KEY.to_string(), tag.to_string().into_bytes()));
        }
        for record in &snapshot.accounts {
            batch.push(Self::record_entry(record)?);
        }
        self.store.save_batch(batch).await?;

        if snapshot.active_account.is_none() {
            self.store.remove(ACTIVE_ACCOUNT_KEY).await?;
        }
        for key in stale {
            if !snapshot
                .accounts
                .iter()
                .any(|record| account_key(&record.tag) == key)
            {
                self.store.remove(&key).await?;
            }
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), WalletError> {
        self.store.clear().await?;
        Ok(())
    }
}
