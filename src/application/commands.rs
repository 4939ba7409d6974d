//! The `wots-vault` command-line front end.

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use rpassword::prompt_password;
use sha2::Digest;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zeroize::Zeroizing;

use super::config::cli_args::Args;
use super::config::cli_args::Command;
use super::config::data_directory::DataDirectory;
use super::config::password_source::PasswordSource;
use super::storage::FileStore;
use crate::state::wallet::account::Account;
use crate::state::wallet::hd_wallet::HdWallet;
use crate::state::wallet::hd_wallet::WalletStatus;
use crate::state::wallet::master_seed::MasterSeed;
use crate::state::wallet::mcm;
use crate::state::wallet::wallet_configuration::WalletConfiguration;
use crate::state::wallet::wallet_export::WalletExport;

type Wallet = HdWallet<FileStore>;

/// Run the command named by `args` against the wallet in the data
/// directory.
pub async fn run(args: Args) -> Result<()> {
    let data_directory = DataDirectory::get(args.data_dir.clone())?;
    DataDirectory::create_dir_if_not_exists(&data_directory.root_dir_path()).await?;
    let store = FileStore::open(data_directory.wallet_directory_path())
        .await
        .with_context(|| format!("Could not open wallet in {data_directory}"))?;
    let configuration = WalletConfiguration::new().absorb_options(&args);
    let mut wallet = HdWallet::new(store, configuration);
    info!("Data directory is {}", data_directory);

    let Some(command) = args.command.clone() else {
        println!("wallet: {}", wallet.status().await?);
        println!("data directory: {data_directory}");
        return Ok(());
    };

    match command {
        Command::Generate => initialize(&mut wallet, &args, MasterSeed::create()).await,
        Command::Restore { phrase } => {
            let phrase = match phrase {
                Some(phrase) => Zeroizing::new(phrase),
                None => Zeroizing::new(prompt_password("Recovery phrase: ")?),
            };
            initialize(&mut wallet, &args, MasterSeed::from_phrase(&phrase)?).await
        }
        Command::Phrase => {
            unlock(&mut wallet, &args).await?;
            println!("{}", *wallet.recovery_phrase().await?);
            Ok(())
        }
        Command::ChangePassword => {
            let old_password = unlock(&mut wallet, &args).await?;
            let new_password = PasswordSource::get_other_password(None, "New wallet password: ")?;
            wallet.change_password(&old_password, &new_password).await?;
            println!("Password changed.");
            Ok(())
        }
        Command::NewAccount { name } => {
            unlock(&mut wallet, &args).await?;
            let account = wallet.create_account(name).await?;
            print_account(&account, false);
            Ok(())
        }
        Command::Accounts => {
            unlock(&mut wallet, &args).await?;
            let active = wallet.active_account().await?;
            for account in wallet.accounts().await {
                print_account(&account, Some(account.tag) == active);
            }
            Ok(())
        }
        Command::NextAddress { tag } => {
            unlock(&mut wallet, &args).await?;
            let next = wallet.issue_wots_keypair(&tag, false).await?;
            println!("tag:   {}", next.tag());
            println!("index: {}", next.wots_index());
            println!("{}", next.address().to_hex());
            Ok(())
        }
        Command::Rename { tag, name } => {
            unlock(&mut wallet, &args).await?;
            wallet.rename_account(&tag, name).await?;
            Ok(())
        }
        Command::Delete { tag } => {
            unlock(&mut wallet, &args).await?;
            wallet.delete_account(&tag).await?;
            Ok(())
        }
        Command::SetActive { tag } => {
            unlock(&mut wallet, &args).await?;
            wallet.set_active_account(&tag).await?;
            Ok(())
        }
        Command::Export { file } => {
            let password = unlock(&mut wallet, &args).await?;
            let export = wallet.export(&password).await?;
            tokio::fs::write(&file, export.to_json()?)
                .await
                .with_context(|| format!("Failed to write {}", file.display()))?;
            println!("Wallet exported to {}", file.display());
            Ok(())
        }
        Command::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let export = WalletExport::from_json(&json)?;
            let password = wallet_password(&args)?;
            wallet.import(&export, &password).await?;
            println!("Imported {} account(s).", wallet.accounts().await.len());
            Ok(())
        }
        Command::DecodeMcm {
            file,
            archive_password,
        } => decode_mcm(&file, archive_password.as_deref()).await,
        Command::ImportMcm {
            file,
            archive_password,
        } => {
            unlock(&mut wallet, &args).await?;
            let bytes = read_archive(&file).await?;
            let password =
                PasswordSource::get_other_password(archive_password.as_deref(), "Archive password: ")?;
            for account in wallet
                .import_mcm(&bytes, &password, None, cancel_on_interrupt())
                .await? {
                print_account(&account, false);
            }
            Ok(())
        }
        Command::ScanTags { count } => {
            unlock(&mut wallet, &args).await?;
            let tags: Vec<String> = wallet
                .session()
                .with_seed(|seed| (0..count).map(|i| seed.derive_scan_tag(i)).collect())
                .await?;
            for (i, tag) in tags.iter().enumerate() {
                println!("{i:>4}  {tag}");
            }
            Ok(())
        }
    }
}

fn wallet_password(args: &Args) -> Result<Zeroizing<String>> {
    PasswordSource::get_password(args.password.as_deref(), !args.non_interactive_password)
}

/// Unlock, returning the password that did it.
async fn unlock(wallet: &mut Wallet, args: &Args) -> Result<Zeroizing<String>> {
    if wallet.status().await? == WalletStatus::Uninitialized {
        bail!("No wallet yet. Run `wots-vault generate` or `wots-vault restore` first.");
    }
    let password = wallet_password(args)?;
    wallet.unlock(&password).await?;
    Ok(password)
}

async fn initialize(wallet: &mut Wallet, args: &Args, seed: MasterSeed) -> Result<()> {
    if wallet.status().await? != WalletStatus::Uninitialized {
        bail!("A wallet already exists in this data directory.");
    }
    let phrase = seed.to_phrase()?;
    let password =
        PasswordSource::get_new_password(args.password.as_deref(), !args.non_interactive_password)?;
    wallet.initialize(seed, &password).await?;
    let account = wallet.create_account(None).await?;

    println!("Recovery phrase (write it down, it is shown only now):\n");
    println!("{}\n", *phrase);
    print_account(&account, true);
    Ok(())
}

async fn read_archive(file: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

/// A token cancelled by Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    cancel
}

async fn decode_mcm(file: &std::path::Path, archive_password: Option<&str>) -> Result<()> {
    let bytes = read_archive(file).await?;
    let password = PasswordSource::get_other_password(archive_password, "Archive password: ")?;

    let decoded = mcm::decode_cancellable(bytes, password, cancel_on_interrupt()).await?;
    let archive = decoded.archive;
    println!(
        "{} (format version {}), {} entries",
        archive.private_header.name,
        archive.public_header.version,
        archive.entries.len()
    );
    for (i, entry) in archive.entries.iter().enumerate() {
        println!(
            "{i:>4}  {}  {}  address sha256 {}",
            entry.tag(),
            entry.name,
            hex::encode(Sha256::digest(entry.address.as_bytes()))
        );
    }
    if !decoded.completed {
        println!("Interrupted; remaining entries were not read.");
    }
    Ok(())
}

fn print_account(account: &Account, active: bool) {
    println!(
        "{} {}  {:<20} {:<9} index {:<4} wots {:<4} balance {}",
        if active { "*" } else { " " },
        account.tag,
        account.name,
        account.account_type,
        account.index.map_or("-".to_string(), |i| i.to_string()),
        account.wots_index,
        account.balance
    );
}
