use thiserror::Error;

use super::encryption::InvalidPassword;
use super::mcm::McmError;
use super::wots::transaction::TransactionError;
use super::wots::AccountTag;
use crate::application::ledger::LedgerError;
use crate::application::storage::StorageError;

/// Every failure a wallet operation can surface.
///
/// Secret-bearing operations fail with [`WalletError::Locked`] once the
/// session is locked, and every decryption failure, whatever its cause, is
/// reported as [`WalletError::InvalidPassword`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WalletError {
    #[error("wallet is locked")]
    Locked,

    #[error("invalid password")]
    InvalidPassword,

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error(transparent)]
    McmDecode(McmError),

    #[error("invalid WOTS index {0}: must be non-negative")]
    InvalidIndex(i64),

    #[error("unsupported export version '{0}'")]
    UnsupportedVersion(String),

    #[error("an account with tag {0} already exists")]
    DuplicateTag(AccountTag),

    #[error("no account with tag {0}")]
    AccountNotFound(AccountTag),

    #[error("invalid recovery phrase: {0}")]
    InvalidPhrase(String),

    #[error("master seed was created without recovery entropy")]
    NoEntropy,

    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("wallet is already initialized")]
    AlreadyInitialized,

    #[error("wallet is not initialized")]
    NotInitialized,

    #[error("operation cancelled before completion")]
    Cancelled,

    #[error("invalid {what}: {reason}")]
    InvalidInput { what: &'static str, reason: String },

    #[error("storage failure")]
    Storage(#[from] StorageError),

    #[error("ledger failure")]
    Ledger(#[from] LedgerError),

    #[error("serialization failure")]
    Serialization(#[from] serde_json::Error),
}

impl From<InvalidPassword> for WalletError {
    fn from(_: InvalidPassword) -> Self {
        Self::InvalidPassword
    }
}

impl From<McmError> for WalletError {
    fn from(error: McmError) -> Self {
        match error {
            McmError::InvalidPassword => Self::InvalidPassword,
            McmError::Malformed(cause) => Self::MalformedArchive(cause),
            other => Self::McmDecode(other),
        }
    }
}

impl From<TransactionError> for WalletError {
    fn from(error: TransactionError) -> Self {
        match error {
            TransactionError::InsufficientFunds { balance, required } => {
                Self::InsufficientFunds { balance, required }
            }
            other => Self::InvalidInput {
                what: "transaction",
                reason: other.to_string(),
            },
        }
    }
}

impl WalletError {
    pub(crate) fn invalid_input(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            what,
            reason: reason.into(),
        }
    }
}
