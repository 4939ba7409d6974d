mod common;

use assert2::let_assert;
use common::logging::tracing_logger;
use common::wallet::configuration;
use common::wallet::file_wallet;
use common::wallet::fixed_seed;
use common::wallet::unlocked_memory_wallet;
use common::wallet::ABANDON_PHRASE;
use common::wallet::PASSWORD;
use wots_vault::application::storage::MemoryStore;
use wots_vault::state::wallet::derivation::derive_wots_keypair;
use wots_vault::state::wallet::hd_wallet::WalletStatus;
use wots_vault::state::wallet::secret_bytes::SecretBytes;
use wots_vault::state::wallet::wallet_export::WalletExport;
use wots_vault::HdWallet;
use wots_vault::MasterSeed;
use wots_vault::WalletError;

#[tokio::test]
async fn file_backed_wallet_survives_restart() -> anyhow::Result<()> {
    tracing_logger();
    let directory = tempfile::tempdir()?;

    let (tag, issued_addresses) = {
        let mut wallet = file_wallet(directory.path()).await?;
        wallet.initialize(fixed_seed(), PASSWORD).await?;
        let account = wallet.create_account(Some("main".into())).await?;
        let mut addresses = vec![];
        for _ in 0..3 {
            addresses.push(wallet.issue_wots_keypair(&account.tag, true).await?.address().clone());
        }
        wallet.lock().await;
        (account.tag, addresses)
    };

    let mut reopened = file_wallet(directory.path()).await?;
    assert_eq!(WalletStatus::Locked, reopened.status().await?);
    let_assert!(Err(WalletError::InvalidPassword) = reopened.unlock("not the password").await);
    reopened.unlock(PASSWORD).await?;

    let account = reopened.account(&tag).await?;
    assert_eq!("main", account.name);
    assert_eq!(2, account.wots_index.value());
    assert_eq!(issued_addresses[0], account.first_address);

    let next = reopened.issue_wots_keypair(&tag, true).await?;
    assert_eq!(2, next.wots_index().value());
    assert!(!issued_addresses.contains(next.address()));
    assert_eq!(Some(tag), reopened.active_account().await?);
    Ok(())
}

#[tokio::test]
async fn restoring_a_phrase_reproduces_accounts() -> anyhow::Result<()> {
    let mut first = HdWallet::new(MemoryStore::new(), configuration());
    first.initialize(MasterSeed::from_phrase(ABANDON_PHRASE)?, PASSWORD).await?;
    let mut second = HdWallet::new(MemoryStore::new(), configuration());
    // extra whitespace is not significant
    let spaced = format!("  {}\n", ABANDON_PHRASE.replace(' ', "   "));
    second.initialize(MasterSeed::from_phrase(&spaced)?, "another password").await?;

    for _ in 0..2 {
        let a = first.create_account(None).await?;
        let b = second.create_account(None).await?;
        assert_eq!(a.tag, b.tag);
        assert_eq!(a.first_address, b.first_address);
    }
    assert_eq!(ABANDON_PHRASE, *second.recovery_phrase().await?);

    let_assert!(
        Err(WalletError::InvalidPhrase(_)) =
            MasterSeed::from_phrase(&ABANDON_PHRASE.replace("about", "abandon"))
    );
    Ok(())
}

#[tokio::test]
async fn raw_secret_wallet_has_no_phrase() -> anyhow::Result<()> {
    let (wallet, _) = unlocked_memory_wallet().await?;
    let_assert!(Err(WalletError::NoEntropy) = wallet.recovery_phrase().await);
    Ok(())
}

#[tokio::test]
async fn export_file_restores_into_another_directory() -> anyhow::Result<()> {
    let source_directory = tempfile::tempdir()?;
    let target_directory = tempfile::tempdir()?;

    let mut source = file_wallet(source_directory.path()).await?;
    source.initialize(fixed_seed(), PASSWORD).await?;
    let spending = source.create_account(None).await?;
    source.create_account(Some("cold".into())).await?;
    source.issue_wots_keypair(&spending.tag, true).await?;
    let json = source.export(PASSWORD).await?.to_json()?;

    let export = WalletExport::from_json(&json)?;
    let mut target = file_wallet(target_directory.path()).await?;
    target.import(&export, PASSWORD).await?;
    assert_eq!(source.accounts().await, target.accounts().await);

    // the import is durable, not just in memory
    let mut reopened = file_wallet(target_directory.path()).await?;
    reopened.unlock(PASSWORD).await?;
    assert_eq!(source.accounts().await, reopened.accounts().await);
    Ok(())
}

#[tokio::test]
async fn only_major_version_one_is_imported() -> anyhow::Result<()> {
    let (mut source, _) = unlocked_memory_wallet().await?;
    source.create_account(None).await?;
    let export = source.export(PASSWORD).await?;

    for version in ["2.0", "1", "0.9", ""] {
        let mut foreign = export.clone();
        foreign.version = version.to_string();
        let directory = tempfile::tempdir()?;
        let mut target = file_wallet(directory.path()).await?;
        let_assert!(Err(WalletError::UnsupportedVersion(_)) = target.import(&foreign, PASSWORD).await);
        assert_eq!(WalletStatus::Uninitialized, target.status().await?);
    }

    let mut newer_minor = export.clone();
    newer_minor.version = "1.7".to_string();
    let (mut target, _) = unlocked_memory_wallet().await?;
    target.import(&newer_minor, PASSWORD).await?;
    Ok(())
}

#[tokio::test]
async fn first_transaction_matches_recorded_datagram() -> anyhow::Result<()> {
    let (mut wallet, _) = unlocked_memory_wallet().await?;
    let account = wallet.create_account(None).await?;
    let counting = SecretBytes::new(std::array::from_fn(|i| i as u8));
    let destination = derive_wots_keypair(&counting, 0, None)?.address;

    let transaction = wallet
        .create_transaction(&account.tag, destination, 1_000, 5_000, 500)
        .await?;

    assert_eq!(8792, transaction.datagram().len());
    assert_eq!(
        "27b5009a2bed43b35d18d3d7b588443e93d34b5159f736d3575969ac0e4a4ace",
        transaction.txid()
    );
    Ok(())
}
