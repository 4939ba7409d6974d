use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

use crate::state::wallet::encryption::KdfProfile;
use crate::state::wallet::wots::AccountTag;

/// `wots-vault` manages a WOTS+ wallet stored on this machine.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// The data directory that contains the wallet
    ///
    /// The default varies by operating system, e.g.
    ///
    /// Linux:   /home/alice/.local/share/wots-vault
    ///
    /// Windows: C:\Users\Alice\AppData\Roaming\wots-vault\data
    ///
    /// macOS:   /Users/Alice/Library/Application Support/org.wots-vault.wots-vault
    #[clap(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Wallet password (INSECURE: visible in the process list)
    ///
    /// Prefer the interactive prompt, or the `WOTS_VAULT_PASSWORD`
    /// environment variable for automation.
    #[clap(long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Fail instead of prompting when no password is supplied
    #[clap(long)]
    pub non_interactive_password: bool,

    /// Work factor for password-based key derivation
    ///
    /// `testing` is only meant for throwaway wallets in test environments.
    /// A wallet written under one profile cannot be opened under the other.
    #[clap(long, default_value_t = KdfProfile::Production, hide = true)]
    pub kdf_profile: KdfProfile,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a wallet with a fresh 24-word recovery phrase
    Generate,

    /// Create a wallet from an existing recovery phrase
    Restore {
        /// Read from stdin without echo when omitted
        #[clap(long)]
        phrase: Option<String>,
    },

    /// Show the recovery phrase
    Phrase,

    /// Re-encrypt the wallet under a new password
    ChangePassword,

    /// Derive the next account from the master seed
    NewAccount {
        #[clap(long)]
        name: Option<String>,
    },

    /// List accounts
    Accounts,

    /// Show the address an account will receive change at next
    NextAddress { tag: AccountTag },

    /// Rename an account
    Rename { tag: AccountTag, name: String },

    /// Hide an account from listings
    Delete { tag: AccountTag },

    /// Make an account the active one
    SetActive { tag: AccountTag },

    /// Write an encrypted backup of the whole wallet
    Export { file: PathBuf },

    /// Replace the wallet with an encrypted backup
    Import { file: PathBuf },

    /// List the entries of a legacy MCM archive without importing them
    DecodeMcm {
        file: PathBuf,
        /// Archive password; prompted for when omitted
        #[clap(long)]
        archive_password: Option<String>,
    },

    /// Import every entry of a legacy MCM archive as an account
    ImportMcm {
        file: PathBuf,
        #[clap(long)]
        archive_password: Option<String>,
    },

    /// Print legacy scan tags for the first accounts
    ScanTags {
        #[clap(long, default_value_t = 10)]
        count: u32,
    },
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}
