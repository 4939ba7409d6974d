//! The wallet orchestrator: accounts, one-time index issuance, signing,
//! and whole-wallet export.
//!
//! Every account lives behind its own [`AtomicMutex`]. Index issuance reads
//! the account's `wots_index`, persists the advanced index, and only then
//! updates memory and hands out the keypair, all under that mutex. Two
//! callers can therefore never observe the same index, and a crash after
//! persistence burns an index rather than reusing one.
//!
//! Operations that add or replace accounts (creation, imports, unlock)
//! additionally hold the wallet-wide writer lock from the moment they read
//! the stored state until the new accounts are in the table.

use std::collections::BTreeMap;
use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use zeroize::Zeroizing;

use super::account::Account;
use super::account::AccountSource;
use super::account::WotsIndex;
use super::derivation::WotsKeypair;
use super::errors::WalletError;
use super::master_seed::MasterSeed;
use super::mcm;
use super::secret_bytes::SecretBytes;
use super::wallet_configuration::WalletConfiguration;
use super::wallet_export::WalletExport;
use super::wallet_store::WalletSnapshot;
use super::wallet_store::WalletStore;
use super::wots;
use super::wots::transaction::SignedTransaction;
use super::wots::AccountTag;
use super::wots::WotsAddress;
use crate::application::ledger;
use crate::application::ledger::LedgerClient;
use crate::application::ledger::TxReceipt;
use crate::application::locks::tokio::AtomicMutex;
use crate::application::locks::tokio::AtomicRw;
use crate::application::storage::KeyValueStore;
use crate::state::session::Session;

type AccountMap = BTreeMap<AccountTag, AtomicMutex<Account>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum WalletStatus {
    /// No master seed has been stored yet.
    Uninitialized,
    Locked,
    Unlocked,
}

/// A keypair handed out by [`HdWallet::issue_wots_keypair`].
///
/// The index it was issued at is already persisted as consumed. The value
/// cannot be cloned; [`into_keypair`](Self::into_keypair) consumes it.
#[derive(Debug)]
pub struct IssuedKeypair {
    tag: AccountTag,
    wots_index: WotsIndex,
    keypair: WotsKeypair,
}

impl IssuedKeypair {
    pub fn tag(&self) -> AccountTag {
        self.tag
    }

    pub fn wots_index(&self) -> WotsIndex {
        self.wots_index
    }

    pub fn address(&self) -> &WotsAddress {
        &self.keypair.address
    }

    pub fn into_keypair(self) -> WotsKeypair {
        self.keypair
    }
}

/// Handle to a wallet backed by `S`. Clones share the session, the account
/// table and the store.
#[derive(Debug, Clone)]
pub struct HdWallet<S> {
    session: Session,
    store: WalletStore<S>,
    accounts: AtomicRw<AccountMap>,
    writer: AtomicMutex<()>,
    configuration: WalletConfiguration,
}

fn account_table(accounts: Vec<Account>) -> AccountMap {
    accounts
        .into_iter()
        .map(|account| (account.tag, AtomicMutex::<Account>::from((account, "Account"))))
        .collect()
}

impl<S: KeyValueStore> HdWallet<S> {
    /// A locked wallet over `store`.
    pub fn new(store: S, configuration: WalletConfiguration) -> Self {
        Self {
            session: Session::new(),
            store: WalletStore::new(store),
            accounts: AtomicRw::from((AccountMap::new(), "HdWallet::accounts")),
            writer: AtomicMutex::<()>::from(((), "HdWallet::writer")),
            configuration,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &WalletStore<S> {
        &self.store
    }

    pub fn configuration(&self) -> &WalletConfiguration {
        &self.configuration
    }

    pub async fn status(&self) -> Result<WalletStatus, WalletError> {
        if self.session.is_unlocked().await {
            return Ok(WalletStatus::Unlocked);
        }
        Ok(match self.store.has_master_seed().await? {
            true => WalletStatus::Locked,
            false => WalletStatus::Uninitialized,
        })
    }

    /// Store `seed` under `password` and unlock with it. The wallet starts
    /// without accounts.
    pub async fn initialize(&mut self, seed: MasterSeed, password: &str) -> Result<(), WalletError> {
        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        if self.store.has_master_seed().await? {
            return Err(WalletError::AlreadyInitialized);
        }
        let mut seed = seed.with_vault(self.configuration.vault());
        let blob = seed.export(password)?;
        self.store.save_master_seed(&blob).await?;

        let mut table = self.accounts.lock_guard_mut().await;
        self.session.unlock(seed).await?;
        *table = AccountMap::new();
        info!("wallet initialized");
        Ok(())
    }

    /// Decrypt the stored master seed and load every account.
    ///
    /// The records are read with the account table write-locked, so no
    /// issuance can persist between the read and the install.
    pub async fn unlock(&mut self, password: &str) -> Result<(), WalletError> {
        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        let blob = self
            .store
            .load_master_seed()
            .await?
            .ok_or(WalletError::NotInitialized)?;
        let seed = MasterSeed::import_with_vault(&blob, password, self.configuration.vault())?;
        let storage_key = seed.derive_storage_key()?;

        let mut table = self.accounts.lock_guard_mut().await;
        let accounts = self.store.load_accounts(&storage_key).await?;
        self.session.unlock(seed).await?;
        info!("wallet unlocked with {} account(s)", accounts.len());
        *table = account_table(accounts);
        Ok(())
    }

    /// Zero the master seed and drop every account from memory.
    pub async fn lock(&mut self) {
        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        self.session.lock().await;
        self.accounts.lock_mut(AccountMap::clear).await;
        info!("wallet locked");
    }

    pub async fn recovery_phrase(&self) -> Result<Zeroizing<String>, WalletError> {
        self.session.with_seed(MasterSeed::to_phrase).await
    }

    pub async fn change_password(
        &mut self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), WalletError> {
        let blob = self
            .session
            .with_seed_mut(|seed| seed.change_password(old_password, new_password))
            .await?;
        self.store.save_master_seed(&blob).await?;
        info!("wallet password changed");
        Ok(())
    }

    async fn next_order(&self) -> u32 {
        let accounts = self.accounts.lock_guard().await;
        let mut next = 0;
        for slot in accounts.values() {
            next = next.max(slot.lock(|account| account.order).await + 1);
        }
        next
    }

    async fn contains(&self, tag: &AccountTag) -> bool {
        self.accounts.lock(|accounts| accounts.contains_key(tag)).await
    }

    /// Add freshly persisted accounts. An existing entry is never replaced:
    /// its mutex guards an index that may already have advanced.
    async fn insert_accounts(&mut self, new_accounts: &[Account]) -> Result<(), WalletError> {
        self.accounts
            .lock_mut(|accounts| {
                if let Some(taken) = new_accounts.iter().find(|a| accounts.contains_key(&a.tag)) {
                    return Err(WalletError::DuplicateTag(taken.tag));
                }
                for account in new_accounts {
                    accounts.insert(
                        account.tag,
                        AtomicMutex::<Account>::from((account.clone(), "Account")),
                    );
                }
                Ok(())
            })
            .await
    }

    /// Derive the account at the wallet's next account index.
    ///
    /// The index is a persisted high-water mark: deleting an account never
    /// frees its index.
    pub async fn create_account(&mut self, name: Option<String>) -> Result<Account, WalletError> {
        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        let storage_key = self.session.storage_key().await?;
        let index = self.store.next_account_index().await?;
        let next_index = index
            .checked_add(1)
            .ok_or_else(|| WalletError::invalid_input("account index", "exhausted"))?;

        let (seed, tag) = self
            .session
            .with_seed(|seed| Ok((seed.derive_account_seed(index)?, seed.derive_account_tag(index)?)))
            .await?;
        if self.contains(&tag).await {
            return Err(WalletError::DuplicateTag(tag));
        }

        let name = name.unwrap_or_else(|| self.configuration.default_account_name(index));
        let account = Account::derived(name, index, seed, tag, self.next_order().await);
        self.store
            .save_new_account(&account, &storage_key, next_index)
            .await?;
        self.insert_accounts(std::slice::from_ref(&account)).await?;

        if self.store.load_active_account().await?.is_none() {
            self.store.save_active_account(Some(&tag)).await?;
        }
        info!(%tag, index, "created account '{}'", account.name);
        Ok(account)
    }

    /// Add an account for a keypair generated elsewhere.
    ///
    /// `secret` must produce `address`'s public key.
    pub async fn import_keypair(
        &mut self,
        name: String,
        secret: SecretBytes<32>,
        address: WotsAddress,
    ) -> Result<Account, WalletError> {
        let storage_key = self.session.storage_key().await?;
        let public_key = wots::public_key_gen(secret.expose(), address.pub_seed(), address.rnd2());
        if public_key != address.public_key() {
            return Err(WalletError::invalid_input("keypair", "secret does not match the address"));
        }
        let tag = address.tag();
        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        if self.contains(&tag).await {
            return Err(WalletError::DuplicateTag(tag));
        }

        let keypair = WotsKeypair { secret, address };
        let account = Account::imported(name, keypair, AccountSource::Keypair, self.next_order().await);
        self.store.save_account(&account, &storage_key).await?;
        self.insert_accounts(std::slice::from_ref(&account)).await?;
        info!(%tag, "imported keypair as '{}'", account.name);
        Ok(account)
    }

    /// Import entries of an MCM archive as accounts.
    ///
    /// `selection` picks entries by position; `None` imports all of them.
    /// The batch is rejected as a whole if any tag repeats or is already
    /// in the wallet.
    ///
    /// Decoding runs on the blocking pool. Cancelling `cancel` before the
    /// last entry is decoded imports nothing.
    pub async fn import_mcm(
        &mut self,
        archive: &[u8],
        password: &str,
        selection: Option<&[usize]>,
        cancel: CancellationToken,
    ) -> Result<Vec<Account>, WalletError> {
        let storage_key = self.session.storage_key().await?;
        let partial = mcm::decode_cancellable(
            archive.to_vec(),
            Zeroizing::new(password.to_string()),
            cancel,
        )
        .await?;
        if !partial.completed {
            return Err(WalletError::Cancelled);
        }
        let decoded = partial.archive;

        let entries: Vec<&mcm::WotsEntry> = match selection {
            None => decoded.entries.iter().collect(),
            Some(positions) => positions
                .iter()
                .map(|&position| {
                    decoded.entries.get(position).ok_or_else(|| {
                        WalletError::invalid_input(
                            "selection",
                            format!("archive has {} entries, no entry {position}", decoded.entries.len()),
                        )
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        let mut seen = HashSet::new();
        for entry in &entries {
            let tag = entry.tag();
            if !seen.insert(tag) || self.contains(&tag).await {
                warn!(%tag, "rejected MCM import: duplicate tag");
                return Err(WalletError::DuplicateTag(tag));
            }
        }

        let first_order = self.next_order().await;
        let accounts = entries
            .into_iter()
            .zip(first_order..)
            .map(|(entry, order)| {
                let name = match entry.name.is_empty() {
                    true => self.configuration.default_account_name(order),
                    false => entry.name.clone(),
                };
                Account::imported(name, entry.clone().into_keypair(), AccountSource::Mcm, order)
            })
            .collect::<Vec<_>>();

        self.store.save_accounts(&accounts, &storage_key).await?;
        self.insert_accounts(&accounts).await?;
        info!(
            "imported {} account(s) from MCM archive '{}'",
            accounts.len(),
            decoded.private_header.name
        );
        Ok(accounts)
    }

    /// Live accounts, in display order.
    pub async fn accounts(&self) -> Vec<Account> {
        let table = self.accounts.lock_guard().await;
        let mut accounts = Vec::with_capacity(table.len());
        for slot in table.values() {
            let account = slot.lock(Account::clone).await;
            if !account.is_deleted {
                accounts.push(account);
            }
        }
        accounts.sort_by_key(|account| (account.order, account.tag));
        accounts
    }

    pub async fn account(&self, tag: &AccountTag) -> Result<Account, WalletError> {
        let table = self.accounts.lock_guard().await;
        let slot = table.get(tag).ok_or(WalletError::AccountNotFound(*tag))?;
        let account = slot.lock(Account::clone).await;
        match account.is_deleted {
            true => Err(WalletError::AccountNotFound(*tag)),
            false => Ok(account),
        }
    }

    /// Apply `update` to a copy of the account, persist the copy, then
    /// commit it to memory. The account stays locked throughout, and
    /// nothing is committed if `update` or persistence fails.
    async fn update_account<R>(
        &self,
        tag: &AccountTag,
        update: impl FnOnce(&mut Account) -> Result<R, WalletError>,
    ) -> Result<R, WalletError> {
        let storage_key = self.session.storage_key().await?;
        let table = self.accounts.lock_guard().await;
        let slot = table.get(tag).ok_or(WalletError::AccountNotFound(*tag))?;
        let mut account = slot.lock_guard().await;
        if account.is_deleted {
            return Err(WalletError::AccountNotFound(*tag));
        }

        let mut updated = account.clone();
        let result = update(&mut updated)?;
        self.store.save_account(&updated, &storage_key).await?;
        *account = updated;
        Ok(result)
    }

    /// The keypair at the account's current index.
    ///
    /// With `increment`, the index is consumed: the advanced index is
    /// persisted before the keypair is returned. Without it the keypair is
    /// only for display and must not sign.
    pub async fn issue_wots_keypair(
        &self,
        tag: &AccountTag,
        increment: bool,
    ) -> Result<IssuedKeypair, WalletError> {
        if !increment {
            if !self.session.is_unlocked().await {
                return Err(WalletError::Locked);
            }
            let account = self.account(tag).await?;
            return Ok(IssuedKeypair {
                tag: *tag,
                wots_index: account.wots_index,
                keypair: account.keypair_at(account.wots_index)?,
            });
        }

        let issued = self
            .update_account(tag, |account| {
                let wots_index = account.wots_index;
                let keypair = account.keypair_at(wots_index)?;
                account.wots_index = wots_index.next();
                Ok(IssuedKeypair {
                    tag: *tag,
                    wots_index,
                    keypair,
                })
            })
            .await?;
        debug!(%tag, wots_index = %issued.wots_index, "issued WOTS keypair");
        Ok(issued)
    }

    /// Sign a transfer of `amount` plus `fee` out of `balance`.
    ///
    /// The account's current keypair signs, the next one receives the
    /// change, and the index advances by one. Insufficient funds are
    /// detected before any index is consumed.
    pub async fn create_transaction(
        &self,
        tag: &AccountTag,
        destination: WotsAddress,
        amount: u64,
        balance: u64,
        fee: u64,
    ) -> Result<SignedTransaction, WalletError> {
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| WalletError::invalid_input("amount", "amount plus fee overflows"))?;
        let change_total = balance
            .checked_sub(required)
            .ok_or(WalletError::InsufficientFunds { balance, required })?;

        let (wots_index, source, change) = self
            .update_account(tag, |account| {
                let wots_index = account.wots_index;
                let source = account.keypair_at(wots_index)?;
                let change = account.keypair_at(wots_index.next())?;
                account.wots_index = wots_index.next();
                account.balance = change_total;
                Ok((wots_index, source, change))
            })
            .await?;

        let transaction = SignedTransaction::sign(
            balance,
            amount,
            fee,
            source.address,
            &source.secret,
            destination,
            change.address,
        )?;
        info!(%tag, %wots_index, txid = %transaction.txid(), "signed transaction");
        Ok(transaction)
    }

    /// Resolve `destination`, sign against the ledger's balance for `tag`,
    /// and submit.
    pub async fn send(
        &self,
        tag: &AccountTag,
        destination: &AccountTag,
        amount: u64,
        fee: u64,
        ledger: &dyn LedgerClient,
    ) -> Result<TxReceipt, WalletError> {
        let destination_address = ledger.resolve_tag(destination).await?;
        let balance = ledger::parse_balance(&ledger.get_balance(tag).await?)?;
        let transaction = self
            .create_transaction(tag, destination_address, amount, balance, fee)
            .await?;
        let receipt = ledger.push_transaction(&transaction.datagram_base64()).await?;
        info!(%tag, txid = %receipt.txid, "transaction accepted");
        Ok(receipt)
    }

    /// Fetch the ledger balance and cache it on the account.
    pub async fn refresh_balance(
        &self,
        tag: &AccountTag,
        ledger: &dyn LedgerClient,
    ) -> Result<u64, WalletError> {
        let balance = ledger::parse_balance(&ledger.get_balance(tag).await?)?;
        self.update_account(tag, |account| {
            account.balance = balance;
            Ok(balance)
        })
        .await
    }

    pub async fn rename_account(&self, tag: &AccountTag, name: String) -> Result<(), WalletError> {
        if name.trim().is_empty() {
            return Err(WalletError::invalid_input("name", "must not be empty"));
        }
        self.update_account(tag, |account| {
            account.name = name;
            Ok(())
        })
        .await
    }

    pub async fn set_avatar(
        &self,
        tag: &AccountTag,
        avatar: Option<String>,
    ) -> Result<(), WalletError> {
        self.update_account(tag, |account| {
            account.avatar = avatar;
            Ok(())
        })
        .await
    }

    /// Tombstone the account. Its record and index stay in storage.
    pub async fn delete_account(&self, tag: &AccountTag) -> Result<(), WalletError> {
        self.update_account(tag, |account| {
            account.is_deleted = true;
            Ok(())
        })
        .await?;
        if self.store.load_active_account().await? == Some(*tag) {
            self.store.save_active_account(None).await?;
        }
        info!(%tag, "deleted account");
        Ok(())
    }

    /// Give the live accounts the display order of `tags`, which must name
    /// each of them exactly once. All records are written in one batch.
    pub async fn reorder_accounts(&self, tags: &[AccountTag]) -> Result<(), WalletError> {
        let storage_key = self.session.storage_key().await?;
        let table = self.accounts.lock_guard().await;

        // map order, so concurrent reorders lock in the same sequence
        let mut guards = Vec::new();
        for slot in table.values() {
            let guard = slot.lock_guard().await;
            if !guard.is_deleted {
                guards.push(guard);
            }
        }

        let unique = tags.iter().collect::<HashSet<_>>();
        if unique.len() != tags.len() || tags.len() != guards.len() {
            return Err(WalletError::invalid_input(
                "order",
                "must list every live account exactly once",
            ));
        }

        let mut updated = Vec::with_capacity(guards.len());
        for guard in &guards {
            let position = tags
                .iter()
                .position(|tag| *tag == guard.tag)
                .ok_or_else(|| WalletError::invalid_input("order", format!("account {} is not listed", guard.tag)))?;
            let mut account = Account::clone(guard);
            account.order = u32::try_from(position).map_err(|_| WalletError::invalid_input("order", "too many accounts"))?;
            updated.push(account);
        }

        self.store.save_accounts(&updated, &storage_key).await?;
        for (guard, account) in guards.iter_mut().zip(updated) {
            **guard = account;
        }
        debug!("reordered {} account(s)", tags.len());
        Ok(())
    }

    pub async fn set_active_account(&self, tag: &AccountTag) -> Result<(), WalletError> {
        self.account(tag).await?;
        self.store.save_active_account(Some(tag)).await
    }

    pub async fn active_account(&self) -> Result<Option<AccountTag>, WalletError> {
        self.store.load_active_account().await
    }

    /// The master seed under `password`, which must be the wallet's
    /// password, and every account record, deleted ones included.
    pub async fn export(&mut self, password: &str) -> Result<WalletExport, WalletError> {
        let blob = self.session.with_seed_mut(|seed| seed.export(password)).await?;
        let storage_key = self.session.storage_key().await?;

        let table = self.accounts.lock_guard().await;
        let mut records = Vec::with_capacity(table.len());
        for slot in table.values() {
            let account = slot.lock(Account::clone).await;
            records.push(WalletStore::<S>::encrypt_account(&account, &storage_key)?);
        }
        info!("exported wallet with {} account(s)", records.len());
        Ok(WalletExport::new(blob, records))
    }

    /// Replace this wallet's contents with `export` and unlock it.
    ///
    /// Nothing is written unless the version is supported, the password
    /// decrypts the seed, and every account record decrypts.
    pub async fn import(&mut self, export: &WalletExport, password: &str) -> Result<(), WalletError> {
        let writer = self.writer.clone();
        let _writing = writer.lock_guard().await;
        if let Err(e) = export.check_version() {
            warn!("rejected wallet import: {e}");
            return Err(e);
        }
        let seed = MasterSeed::import_with_vault(&export.encrypted, password, self.configuration.vault())?;
        let storage_key = seed.derive_storage_key()?;

        let mut seen = HashSet::new();
        let mut accounts = Vec::with_capacity(export.accounts.len());
        for record in &export.accounts {
            if !seen.insert(record.tag) {
                return Err(WalletError::DuplicateTag(record.tag));
            }
            accounts.push(WalletStore::<S>::decrypt_account(record, &storage_key)?);
        }

        let next_account_index = accounts
            .iter()
            .filter_map(|account| account.index)
            .max()
            .map_or(Ok(0), |index| {
                index
                    .checked_add(1)
                    .ok_or_else(|| WalletError::invalid_input("account index", "exhausted"))
            })?;
        let active_account = accounts
            .iter()
            .filter(|account| !account.is_deleted)
            .min_by_key(|account| (account.order, account.tag))
            .map(|account| account.tag);

        let mut table = self.accounts.lock_guard_mut().await;
        self.store
            .replace_all(WalletSnapshot {
                master_seed: export.encrypted.clone(),
                accounts: export.accounts.clone(),
                active_account,
                next_account_index,
            })
            .await?;

        self.session.unlock(seed).await?;
        info!("imported wallet with {} account(s)", accounts.len());
        *table = account_table(accounts);
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use assert2::let_assert;
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    use super::*;
    use crate::application::ledger::MemoryLedger;
    use crate::application::storage::MemoryStore;
    use crate::application::storage::StorageError;
    use crate::state::wallet::wallet_export::EXPORT_VERSION;
    use crate::tests::shared::fixed_seed;
    use crate::tests::shared::memory_wallet;
    use crate::tests::shared::unlocked_memory_wallet;
    use crate::tests::shared::PASSWORD;

    #[traced_test]
    #[tokio::test]
    async fn status_follows_lifecycle() {
        let (mut wallet, _) = memory_wallet();
        assert_eq!(WalletStatus::Uninitialized, wallet.status().await.unwrap());
        let_assert!(Err(WalletError::NotInitialized) = wallet.unlock(PASSWORD).await);

        wallet.initialize(fixed_seed(), PASSWORD).await.unwrap();
        assert_eq!(WalletStatus::Unlocked, wallet.status().await.unwrap());
        let_assert!(
            Err(WalletError::AlreadyInitialized) =
                wallet.initialize(fixed_seed(), PASSWORD).await
        );

        wallet.lock().await;
        assert_eq!(WalletStatus::Locked, wallet.status().await.unwrap());
        let_assert!(Err(WalletError::InvalidPassword) = wallet.unlock("wrong password").await);

        wallet.unlock(PASSWORD).await.unwrap();
        assert_eq!(WalletStatus::Unlocked, wallet.status().await.unwrap());
        assert!(logs_contain("wallet unlocked"));
    }

    #[tokio::test]
    async fn first_account_is_deterministic() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let account = wallet.create_account(None).await.unwrap();

        assert_eq!("9ac9720a263f00847167b5a4", account.tag.to_string());
        assert_eq!(Some(0), account.index);
        assert_eq!(WotsIndex::FIRST, account.wots_index);
        assert_eq!("Account 1", account.name);
        assert_eq!(Some(account.tag), wallet.active_account().await.unwrap());
    }

    #[tokio::test]
    async fn account_indices_never_reused() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let first = wallet.create_account(None).await.unwrap();
        let second = wallet.create_account(Some("savings".into())).await.unwrap();
        wallet.delete_account(&second.tag).await.unwrap();

        let third = wallet.create_account(None).await.unwrap();
        assert_eq!(Some(2), third.index);
        assert_ne!(second.tag, third.tag);
        assert_eq!(
            vec![first.tag, third.tag],
            wallet.accounts().await.iter().map(|a| a.tag).collect::<Vec<_>>()
        );
        let_assert!(Err(WalletError::AccountNotFound(_)) = wallet.account(&second.tag).await);
    }

    #[tokio::test]
    async fn issuance_is_monotonic_and_persisted() {
        let (mut wallet, store) = unlocked_memory_wallet().await;
        let tag = wallet.create_account(None).await.unwrap().tag;

        let mut addresses = HashSet::new();
        for expected in -1..4 {
            let issued = wallet.issue_wots_keypair(&tag, true).await.unwrap();
            assert_eq!(expected, issued.wots_index().value());
            assert!(addresses.insert(issued.address().clone()));
        }

        let mut reopened = HdWallet::new(store, wallet.configuration().clone());
        reopened.unlock(PASSWORD).await.unwrap();
        assert_eq!(4, reopened.account(&tag).await.unwrap().wots_index.value());
    }

    #[tokio::test]
    async fn peeking_does_not_consume() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let account = wallet.create_account(None).await.unwrap();

        let peeked = wallet.issue_wots_keypair(&account.tag, false).await.unwrap();
        assert_eq!(account.first_address, *peeked.address());
        let issued = wallet.issue_wots_keypair(&account.tag, true).await.unwrap();
        assert_eq!(peeked.address(), issued.address());
        assert_eq!(0, wallet.account(&account.tag).await.unwrap().wots_index.value());
    }

    #[tokio::test]
    async fn failed_persistence_keeps_index() {
        let (mut wallet, store) = unlocked_memory_wallet().await;
        let tag = wallet.create_account(None).await.unwrap().tag;

        store.fail_writes(true);
        let_assert!(Err(WalletError::Storage(_)) = wallet.issue_wots_keypair(&tag, true).await);
        store.fail_writes(false);

        assert_eq!(WotsIndex::FIRST, wallet.account(&tag).await.unwrap().wots_index);
    }

    #[tokio::test]
    async fn locked_wallet_refuses_secret_operations() {
        let (mut wallet, store) = unlocked_memory_wallet().await;
        let tag = wallet.create_account(None).await.unwrap().tag;
        wallet.lock().await;
        let writes_before = store.len().await;

        let_assert!(Err(WalletError::Locked) = wallet.create_account(None).await);
        let_assert!(Err(WalletError::Locked) = wallet.issue_wots_keypair(&tag, true).await);
        let_assert!(Err(WalletError::Locked) = wallet.issue_wots_keypair(&tag, false).await);
        let_assert!(Err(WalletError::Locked) = wallet.export(PASSWORD).await);
        let_assert!(Err(WalletError::Locked) = wallet.recovery_phrase().await);
        assert!(wallet.accounts().await.is_empty());
        assert_eq!(writes_before, store.len().await);
    }

    #[tokio::test]
    async fn transaction_consumes_one_index() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let account = wallet.create_account(None).await.unwrap();
        let destination = wallet.create_account(None).await.unwrap().first_address;

        let_assert!(
            Err(WalletError::InsufficientFunds { balance: 100, required: 150 }) =
                wallet
                    .create_transaction(&account.tag, destination.clone(), 100, 100, 50)
                    .await
        );
        assert_eq!(WotsIndex::FIRST, wallet.account(&account.tag).await.unwrap().wots_index);

        let transaction = wallet
            .create_transaction(&account.tag, destination, 1_000, 5_000, 500)
            .await
            .unwrap();
        assert!(transaction.verify());
        assert_eq!(account.first_address, *transaction.source());
        assert_eq!(3_500, transaction.change_total());

        let updated = wallet.account(&account.tag).await.unwrap();
        assert_eq!(0, updated.wots_index.value());
        assert_eq!(updated.keypair_at(updated.wots_index).unwrap().address, *transaction.change());
    }

    #[tokio::test]
    async fn send_settles_on_ledger() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let payer = wallet.create_account(None).await.unwrap();
        let payee = wallet.create_account(None).await.unwrap();

        let ledger = MemoryLedger::new();
        ledger.register(payer.first_address.clone(), 10_000).await;
        ledger.register(payee.first_address.clone(), 0).await;

        wallet.send(&payer.tag, &payee.tag, 2_500, 100, &ledger).await.unwrap();
        assert_eq!(7_400, wallet.refresh_balance(&payer.tag, &ledger).await.unwrap());
        assert_eq!(2_500, wallet.refresh_balance(&payee.tag, &ledger).await.unwrap());

        // the payer's tag now resolves to its change address
        wallet.send(&payer.tag, &payee.tag, 400, 0, &ledger).await.unwrap();
        assert_eq!(2, ledger.accepted().await.len());
        assert_eq!(1, wallet.account(&payer.tag).await.unwrap().wots_index.value());
    }

    #[tokio::test]
    async fn imported_keypair_signs_from_its_own_address() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let secret = SecretBytes::new([7u8; 32]);
        let address = wots::generate_random_address(None, &secret, |buffer| buffer.fill(3));

        let account = wallet
            .import_keypair("paper".into(), secret.clone(), address.clone())
            .await
            .unwrap();
        assert_eq!(address.tag(), account.tag);
        assert_eq!(AccountSource::Keypair, account.source);

        let_assert!(
            Err(WalletError::DuplicateTag(_)) =
                wallet.import_keypair("again".into(), secret, address.clone()).await
        );
        let_assert!(
            Err(WalletError::InvalidInput { what: "keypair", .. }) =
                wallet
                    .import_keypair("wrong".into(), SecretBytes::new([8u8; 32]), address.clone())
                    .await
        );

        let issued = wallet.issue_wots_keypair(&account.tag, true).await.unwrap();
        assert_eq!(address, issued.into_keypair().address);
    }

    #[tokio::test]
    async fn rename_avatar_and_active_account() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let first = wallet.create_account(None).await.unwrap();
        let second = wallet.create_account(None).await.unwrap();

        wallet.rename_account(&first.tag, "daily".into()).await.unwrap();
        wallet.set_avatar(&first.tag, Some("fox".into())).await.unwrap();
        let renamed = wallet.account(&first.tag).await.unwrap();
        assert_eq!(("daily", Some("fox")), (renamed.name.as_str(), renamed.avatar.as_deref()));
        let_assert!(
            Err(WalletError::InvalidInput { .. }) =
                wallet.rename_account(&first.tag, "  ".into()).await
        );

        wallet.set_active_account(&second.tag).await.unwrap();
        assert_eq!(Some(second.tag), wallet.active_account().await.unwrap());
        wallet.delete_account(&second.tag).await.unwrap();
        assert_eq!(None, wallet.active_account().await.unwrap());
        let_assert!(
            Err(WalletError::AccountNotFound(_)) = wallet.set_active_account(&second.tag).await
        );
    }

    #[tokio::test]
    async fn reorder_is_all_or_nothing() {
        let (mut wallet, store) = unlocked_memory_wallet().await;
        let mut tags = Vec::new();
        for _ in 0..3 {
            tags.push(wallet.create_account(None).await.unwrap().tag);
        }
        let reversed = tags.iter().rev().copied().collect::<Vec<_>>();

        let_assert!(Err(WalletError::InvalidInput { .. }) = wallet.reorder_accounts(&tags[..2]).await);
        let_assert!(
            Err(WalletError::InvalidInput { .. }) =
                wallet.reorder_accounts(&[tags[0], tags[0], tags[1]]).await
        );

        store.fail_writes(true);
        assert!(wallet.reorder_accounts(&reversed).await.is_err());
        store.fail_writes(false);
        let current = wallet.accounts().await.iter().map(|a| a.tag).collect::<Vec<_>>();
        assert_eq!(tags, current);

        wallet.reorder_accounts(&reversed).await.unwrap();
        let current = wallet.accounts().await.iter().map(|a| a.tag).collect::<Vec<_>>();
        assert_eq!(reversed, current);
    }

    #[tokio::test]
    async fn change_password_rotates_stored_seed() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let_assert!(
            Err(WalletError::InvalidPassword) =
                wallet.change_password("not it", "new password").await
        );
        wallet.change_password(PASSWORD, "new password").await.unwrap();

        wallet.lock().await;
        let_assert!(Err(WalletError::InvalidPassword) = wallet.unlock(PASSWORD).await);
        wallet.unlock("new password").await.unwrap();
    }

    #[tokio::test]
    async fn export_import_round_trip() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let kept = wallet.create_account(None).await.unwrap();
        let deleted = wallet.create_account(None).await.unwrap();
        wallet.issue_wots_keypair(&kept.tag, true).await.unwrap();
        wallet.delete_account(&deleted.tag).await.unwrap();

        let_assert!(Err(WalletError::InvalidPassword) = wallet.export("not it").await);
        let export = wallet.export(PASSWORD).await.unwrap();
        assert_eq!(EXPORT_VERSION, export.version);
        assert_eq!(2, export.accounts.len());

        let (mut restored, _) = memory_wallet();
        let_assert!(Err(WalletError::InvalidPassword) = restored.import(&export, "not it").await);
        assert_eq!(WalletStatus::Uninitialized, restored.status().await.unwrap());

        restored.import(&export, PASSWORD).await.unwrap();
        assert_eq!(wallet.accounts().await, restored.accounts().await);
        assert_eq!(Some(kept.tag), restored.active_account().await.unwrap());
        assert_eq!(Some(2), restored.create_account(None).await.unwrap().index);
    }

    #[tokio::test]
    async fn unsupported_export_version_leaves_wallet_untouched() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let tag = wallet.create_account(None).await.unwrap().tag;
        let mut export = wallet.export(PASSWORD).await.unwrap();
        export.version = "2.0".to_string();

        let_assert!(Err(WalletError::UnsupportedVersion(v)) = wallet.import(&export, PASSWORD).await);
        assert_eq!("2.0", v);
        assert_eq!(vec![tag], wallet.accounts().await.iter().map(|a| a.tag).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let clone = wallet.clone();
        let tag = wallet.create_account(None).await.unwrap().tag;

        clone.issue_wots_keypair(&tag, true).await.unwrap();
        assert_eq!(0, wallet.account(&tag).await.unwrap().wots_index.value());

        wallet.lock().await;
        assert_eq!(WalletStatus::Locked, clone.status().await.unwrap());
    }

    /// Holds the first batch write until released.
    #[derive(Debug, Clone, Default)]
    struct StalledStore {
        inner: MemoryStore,
        armed: Arc<AtomicBool>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl KeyValueStore for StalledStore {
        async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
            self.inner.save(key, value).await
        }

        async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.load(key).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }

        async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.keys(prefix).await
        }

        async fn save_batch(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StorageError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.save_batch(entries).await
        }

        async fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear().await
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn racing_account_creation_never_shares_an_index() {
        let store = StalledStore::default();
        let mut wallet = HdWallet::new(store.clone(), crate::tests::shared::testing_configuration());
        wallet.initialize(fixed_seed(), PASSWORD).await.unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let mut stalled = wallet.clone();
        let first = tokio::spawn(async move { stalled.create_account(None).await });
        store.entered.notified().await;

        let mut racing = wallet.clone();
        let second = tokio::spawn(async move {
            let account = racing.create_account(None).await?;
            let issued = racing.issue_wots_keypair(&account.tag, true).await?;
            Ok::<_, WalletError>((account, issued))
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.release.notify_one();

        let first = first.await.unwrap().unwrap();
        let (second, second_issued) = second.await.unwrap().unwrap();
        assert_eq!(Some(0), first.index);
        assert_eq!(Some(1), second.index);
        assert_ne!(first.tag, second.tag);

        let mut addresses = HashSet::from([second_issued.address().clone()]);
        for tag in [first.tag, second.tag] {
            let issued = wallet.issue_wots_keypair(&tag, true).await.unwrap();
            assert!(addresses.insert(issued.address().clone()));
        }
        assert_eq!(0, wallet.account(&first.tag).await.unwrap().wots_index.value());
        assert_eq!(1, wallet.account(&second.tag).await.unwrap().wots_index.value());
    }

    #[tokio::test]
    async fn unlock_keeps_indices_issued_by_clones() {
        let (mut wallet, _) = unlocked_memory_wallet().await;
        let tag = wallet.create_account(None).await.unwrap().tag;
        let issuer = wallet.clone();

        let issuing = tokio::spawn(async move {
            for _ in 0..20 {
                issuer.issue_wots_keypair(&tag, true).await.unwrap();
            }
        });
        for _ in 0..5 {
            wallet.unlock(PASSWORD).await.unwrap();
            tokio::task::yield_now().await;
        }
        issuing.await.unwrap();

        assert_eq!(19, wallet.account(&tag).await.unwrap().wots_index.value());
        wallet.lock().await;
        wallet.unlock(PASSWORD).await.unwrap();
        assert_eq!(19, wallet.account(&tag).await.unwrap().wots_index.value());
    }

    #[tokio::test]
    async fn store_is_shared_with_memory_backend() {
        let store = MemoryStore::new();
        let mut wallet = HdWallet::new(store.clone(), crate::tests::shared::testing_configuration());
        wallet.initialize(fixed_seed(), PASSWORD).await.unwrap();
        assert!(!store.is_empty().await);
    }
}
