//! Where wallet passwords come from when running the command-line tool.

use anyhow::anyhow;
use anyhow::Result;
use rpassword::prompt_password;
use tracing::warn;
use zeroize::Zeroizing;

/// Environment variable for the wallet password (INSECURE: for automation only).
pub const WALLET_PASSWORD_ENV_VAR: &str = "WOTS_VAULT_PASSWORD";

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct PasswordSource;

impl PasswordSource {
    /// Password for an existing wallet.
    ///
    /// Priority order:
    /// 1. CLI argument
    /// 2. Environment variable
    /// 3. Interactive prompt, if allowed
    pub fn get_password(
        cli_password: Option<&str>,
        allow_interactive: bool,
    ) -> Result<Zeroizing<String>> {
        if let Some(password) = Self::non_interactive(cli_password) {
            return Ok(password);
        }
        if allow_interactive {
            return Ok(Zeroizing::new(prompt_password("Wallet password: ")?));
        }
        Err(anyhow!(
            "No password available. Use --password, set {}, or remove --non-interactive-password",
            WALLET_PASSWORD_ENV_VAR
        ))
    }

    /// Password for a wallet about to be created. Prompts twice and
    /// rejects passwords shorter than [`MIN_PASSWORD_LEN`].
    pub fn get_new_password(
        cli_password: Option<&str>,
        allow_interactive: bool,
    ) -> Result<Zeroizing<String>> {
        if let Some(password) = Self::non_interactive(cli_password) {
            Self::check_length(&password)?;
            return Ok(password);
        }
        if !allow_interactive {
            return Err(anyhow!(
                "No password available for new wallet. Use --password, set {}, or remove --non-interactive-password",
                WALLET_PASSWORD_ENV_VAR
            ));
        }

        loop {
            let password = Zeroizing::new(prompt_password("New wallet password: ")?);
            if let Err(e) = Self::check_length(&password) {
                eprintln!("{e}");
                continue;
            }
            let confirm = Zeroizing::new(prompt_password("Confirm wallet password: ")?);
            if password != confirm {
                eprintln!("Passwords do not match. Please try again.");
                continue;
            }
            return Ok(password);
        }
    }

    /// Password for something other than the wallet itself, such as a
    /// legacy archive. Never read from the environment.
    pub fn get_other_password(cli_password: Option<&str>, prompt: &str) -> Result<Zeroizing<String>> {
        match cli_password {
            Some(password) => Ok(Zeroizing::new(password.to_string())),
            None => Ok(Zeroizing::new(prompt_password(prompt)?)),
        }
    }

    fn non_interactive(cli_password: Option<&str>) -> Option<Zeroizing<String>> {
        if let Some(password) = cli_password {
            warn!("Using password from CLI argument (INSECURE! Visible in process list)");
            return Some(Zeroizing::new(password.to_string()));
        }
        if let Ok(env_password) = std::env::var(WALLET_PASSWORD_ENV_VAR) {
            warn!(
                "Using password from environment variable {} (INSECURE!)",
                WALLET_PASSWORD_ENV_VAR
            );
            return Some(Zeroizing::new(env_password));
        }
        None
    }

    fn check_length(password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(anyhow!(
                "Password is too short: minimum {} characters",
                MIN_PASSWORD_LEN
            ));
        }
        Ok(())
    }
}
