use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::LedgerClient;
use super::LedgerError;
use super::TxReceipt;
use crate::application::locks::tokio::AtomicMutex;
use crate::state::wallet::wots::transaction::SignedTransaction;
use crate::state::wallet::wots::AccountTag;
use crate::state::wallet::wots::WotsAddress;

#[derive(Debug, Default)]
struct LedgerState {
    addresses: HashMap<AccountTag, WotsAddress>,
    balances: HashMap<AccountTag, u64>,
    accepted: Vec<SignedTransaction>,
}

/// A ledger that settles transactions instantly in memory.
///
/// Submitted datagrams are decoded and their signatures verified; accepted
/// transactions move balances between tags and point each tag at its
/// change address, the way the network does once a block confirms.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: AtomicMutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `address` known under its tag, holding `balance`.
    pub async fn register(&self, address: WotsAddress, balance: u64) {
        self.state
            .lock_mut(|state| {
                let tag = address.tag();
                state.addresses.insert(tag, address);
                state.balances.insert(tag, balance);
            })
            .await;
    }

    pub async fn accepted(&self) -> Vec<SignedTransaction> {
        self.state.lock(|state| state.accepted.clone()).await
    }
}

#[async_trait::async_trait]
impl LedgerClient for MemoryLedger {
    async fn resolve_tag(&self, tag: &AccountTag) -> Result<WotsAddress, LedgerError> {
        self.state
            .lock(|state| state.addresses.get(tag).cloned())
            .await
            .ok_or(LedgerError::UnknownTag(*tag))
    }

    async fn push_transaction(&self, datagram_base64: &str) -> Result<TxReceipt, LedgerError> {
        let datagram = BASE64
            .decode(datagram_base64)
            .map_err(|e| LedgerError::Rejected(format!("datagram is not base64: {e}")))?;
        let transaction = SignedTransaction::from_datagram(&datagram)
            .map_err(|e| LedgerError::Rejected(e.to_string()))?;
        if !transaction.verify() {
            return Err(LedgerError::Rejected("bad signature".to_string()));
        }

        self.state
            .lock_mut(|state| {
                let source_tag = transaction.source().tag();
                let destination_tag = transaction.destination().tag();
                if state.addresses.get(&source_tag) != Some(transaction.source()) {
                    return Err(LedgerError::Rejected(
                        "source address is not the tag's current address".to_string(),
                    ));
                }
                let balance = state.balances.get(&source_tag).copied().unwrap_or(0);
                let spent = transaction
                    .send_total()
                    .checked_add(transaction.change_total())
                    .and_then(|sum| sum.checked_add(transaction.fee()));
                if spent != Some(balance) {
                    let spent = spent.map_or("more than u64::MAX".to_string(), |s| s.to_string());
                    return Err(LedgerError::Rejected(format!(
                        "transaction spends {spent} but address holds {balance}"
                    )));
                }

                state.balances.insert(source_tag, transaction.change_total());
                state
                    .addresses
                    .insert(source_tag, transaction.change().clone());
                *state.balances.entry(destination_tag).or_insert(0) += transaction.send_total();
                state
                    .addresses
                    .entry(destination_tag)
                    .or_insert_with(|| transaction.destination().clone());

                let txid = transaction.txid();
                state.accepted.push(transaction);
                Ok(TxReceipt { txid })
            })
            .await
    }

    async fn get_balance(&self, tag: &AccountTag) -> Result<String, LedgerError> {
        self.state
            .lock(|state| state.balances.get(tag).map(u64::to_string))
            .await
            .ok_or(LedgerError::UnknownTag(*tag))
    }
}
