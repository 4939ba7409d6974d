use tracing::info;

use super::encryption::KdfProfile;
use super::encryption::PasswordVault;
use crate::application::config::cli_args;

const DEFAULT_ACCOUNT_NAME_PREFIX: &str = "Account";

/// Configuration options for [`HdWallet`](super::hd_wallet::HdWallet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfiguration {
    kdf_profile: KdfProfile,

    /// Accounts created without a name are called `<prefix> <n>`.
    account_name_prefix: String,
}

impl Default for WalletConfiguration {
    fn default() -> Self {
        Self {
            kdf_profile: KdfProfile::Production,
            account_name_prefix: DEFAULT_ACCOUNT_NAME_PREFIX.to_string(),
        }
    }
}

impl WalletConfiguration {
    /// Best used in combination with self-consuming constructor-helper
    /// [`Self::absorb_options`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract those configuration options from the CLI arguments that are
    /// relevant for the wallet.
    pub fn absorb_options(mut self, cli_args: &cli_args::Args) -> Self {
        if cli_args.kdf_profile != KdfProfile::Production {
            info!("Using KDF profile `{}`.", cli_args.kdf_profile);
        }
        self.kdf_profile = cli_args.kdf_profile;
        self
    }

    pub fn with_kdf_profile(mut self, kdf_profile: KdfProfile) -> Self {
        self.kdf_profile = kdf_profile;
        self
    }

    pub fn kdf_profile(&self) -> KdfProfile {
        self.kdf_profile
    }

    pub fn vault(&self) -> PasswordVault {
        PasswordVault::new(self.kdf_profile)
    }

    pub fn default_account_name(&self, account_index: u32) -> String {
        format!("{} {}", self.account_name_prefix, account_index + 1)
    }
}
