//! The ledger network as seen by the wallet.
//!
//! Only three questions are ever asked of the network: which address a tag
//! currently resolves to, what balance it holds, and whether a signed
//! datagram was accepted. Consensus, block propagation and fee policy are
//! the ledger's business.

mod memory;

pub use memory::MemoryLedger;

use crate::state::wallet::wots::AccountTag;
use crate::state::wallet::wots::WotsAddress;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("tag {0} is not known to the ledger")]
    UnknownTag(AccountTag),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),

    #[error("ledger unreachable: {0}")]
    Unreachable(String),
}

/// A successfully submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub txid: String,
}

#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// The address `tag` currently resolves to.
    async fn resolve_tag(&self, tag: &AccountTag) -> Result<WotsAddress, LedgerError>;

    /// Submit a base64-encoded transaction datagram.
    async fn push_transaction(&self, datagram_base64: &str) -> Result<TxReceipt, LedgerError>;

    /// Balance held by the address `tag` resolves to, as a decimal string of
    /// base units.
    async fn get_balance(&self, tag: &AccountTag) -> Result<String, LedgerError>;
}

/// Parse the decimal balance strings returned by [`LedgerClient::get_balance`].
pub fn parse_balance(balance: &str) -> Result<u64, LedgerError> {
    balance
        .trim()
        .parse()
        .map_err(|e| LedgerError::MalformedResponse(format!("balance '{balance}': {e}")))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn balances_parse_as_base_units() {
        assert_eq!(5_000, parse_balance("5000").unwrap());
        assert_eq!(0, parse_balance(" 0\n").unwrap());
        assert!(parse_balance("-1").is_err());
        assert!(parse_balance("1.5").is_err());
    }
}
