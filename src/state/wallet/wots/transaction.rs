use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use super::public_key_from_signature;
use super::sign;
use super::WotsAddress;
use super::WOTS_ADDRESS_LEN;
use super::WOTS_SIG_LEN;
use crate::state::wallet::secret_bytes::SecretBytes;

/// Length of the signed portion: three addresses and three amounts.
pub const SIGNED_PREFIX_LEN: usize = 3 * WOTS_ADDRESS_LEN + 3 * 8;
pub const DATAGRAM_LEN: usize = SIGNED_PREFIX_LEN + WOTS_SIG_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransactionError {
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("amount overflow")]
    AmountOverflow,

    #[error("datagram must be {DATAGRAM_LEN} bytes, got {0}")]
    DatagramLength(usize),
}

/// A signed transfer from one WOTS address to another.
///
/// Wire layout, all amounts little-endian:
/// `source ‖ destination ‖ change ‖ send ‖ change_total ‖ fee ‖ signature`.
/// The signature covers `SHA256` of everything before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    source: WotsAddress,
    destination: WotsAddress,
    change: WotsAddress,
    send_total: u64,
    change_total: u64,
    fee: u64,
    signature: Vec<u8>,
}

impl SignedTransaction {
    /// Spend `balance` held at `source`: `amount` to `destination`, `fee` to
    /// the ledger, and the remainder to `change`.
    pub fn sign(
        balance: u64,
        amount: u64,
        fee: u64,
        source: WotsAddress,
        source_secret: &SecretBytes<32>,
        destination: WotsAddress,
        change: WotsAddress,
    ) -> Result<Self, TransactionError> {
        let required = amount
            .checked_add(fee)
            .ok_or(TransactionError::AmountOverflow)?;
        let change_total = balance
            .checked_sub(required)
            .ok_or(TransactionError::InsufficientFunds { balance, required })?;

        let mut transaction = Self {
            source,
            destination,
            change,
            send_total: amount,
            change_total,
            fee,
            signature: Vec::new(),
        };
        let message = transaction.message();
        transaction.signature = sign(
            &message,
            source_secret.expose(),
            transaction.source.pub_seed(),
            transaction.source.rnd2(),
        );
        Ok(transaction)
    }

    pub fn from_datagram(datagram: &[u8]) -> Result<Self, TransactionError> {
        if datagram.len() != DATAGRAM_LEN {
            return Err(TransactionError::DatagramLength(datagram.len()));
        }
        let address_at = |slot: usize| {
            let start = slot * WOTS_ADDRESS_LEN;
            WotsAddress(datagram[start..start + WOTS_ADDRESS_LEN].into())
        };
        let amount_at = |slot: usize| {
            let start = 3 * WOTS_ADDRESS_LEN + slot * 8;
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&datagram[start..start + 8]);
            u64::from_le_bytes(bytes)
        };

        Ok(Self {
            source: address_at(0),
            destination: address_at(1),
            change: address_at(2),
            send_total: amount_at(0),
            change_total: amount_at(1),
            fee: amount_at(2),
            signature: datagram[SIGNED_PREFIX_LEN..].to_vec(),
        })
    }

    fn signed_prefix(&self) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(DATAGRAM_LEN);
        prefix.extend_from_slice(self.source.as_bytes());
        prefix.extend_from_slice(self.destination.as_bytes());
        prefix.extend_from_slice(self.change.as_bytes());
        prefix.extend_from_slice(&self.send_total.to_le_bytes());
        prefix.extend_from_slice(&self.change_total.to_le_bytes());
        prefix.extend_from_slice(&self.fee.to_le_bytes());
        prefix
    }

    fn message(&self) -> [u8; 32] {
        Sha256::digest(self.signed_prefix()).into()
    }

    pub fn datagram(&self) -> Vec<u8> {
        let mut datagram = self.signed_prefix();
        datagram.extend_from_slice(&self.signature);
        datagram
    }

    pub fn datagram_base64(&self) -> String {
        BASE64.encode(self.datagram())
    }

    /// Hex `SHA256` of the full datagram.
    pub fn txid(&self) -> String {
        hex::encode(Sha256::digest(self.datagram()))
    }

    /// Whether the signature was produced by the source address's secret.
    pub fn verify(&self) -> bool {
        public_key_from_signature(
            &self.signature,
            &self.message(),
            self.source.pub_seed(),
            self.source.rnd2(),
        )
        .is_some_and(|public_key| public_key == self.source.public_key())
    }

    pub fn source(&self) -> &WotsAddress {
        &self.source
    }

    pub fn destination(&self) -> &WotsAddress {
        &self.destination
    }

    pub fn change(&self) -> &WotsAddress {
        &self.change
    }

    pub fn send_total(&self) -> u64 {
        self.send_total
    }

    pub fn change_total(&self) -> u64 {
        self.change_total
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use assert2::assert;
    use assert2::let_assert;

    use super::*;
    use crate::state::wallet::wots::generate_random_address;

    fn keypair(byte: u8) -> (SecretBytes<32>, WotsAddress) {
        let secret = SecretBytes::new([byte; 32]);
        let mut counter = byte;
        let address = generate_random_address(None, &secret, |buf| {
            for b in buf {
                *b = counter;
                counter = counter.wrapping_add(7);
            }
        });
        (secret, address)
    }

    #[test]
    fn datagram_layout_and_verification() {
        let (secret, source) = keypair(1);
        let (_, destination) = keypair(2);
        let (_, change) = keypair(3);

        let tx = SignedTransaction::sign(5_000, 1_000, 500, source, &secret, destination, change)
            .unwrap();

        assert!(tx.change_total() == 3_500);
        assert!(tx.datagram().len() == DATAGRAM_LEN);
        assert!(tx.verify());
        assert!(SignedTransaction::from_datagram(&tx.datagram()).unwrap() == tx);
        assert!(tx.txid().len() == 64);
    }

    #[test]
    fn forged_amount_fails_verification() {
        let (secret, source) = keypair(1);
        let (_, destination) = keypair(2);
        let (_, change) = keypair(3);
        let tx =
            SignedTransaction::sign(5_000, 1_000, 0, source, &secret, destination, change).unwrap();

        let mut forged = tx.datagram();
        forged[3 * WOTS_ADDRESS_LEN] ^= 0x01;
        let forged = SignedTransaction::from_datagram(&forged).unwrap();
        assert!(!forged.verify());
    }

    #[test]
    fn insufficient_balance_rejected() {
        let (secret, source) = keypair(1);
        let (_, destination) = keypair(2);
        let (_, change) = keypair(3);
        let_assert!(
            Err(TransactionError::InsufficientFunds { balance, required }) =
                SignedTransaction::sign(100, 90, 20, source, &secret, destination, change)
        );
        assert!(balance == 100);
        assert!(required == 110);
    }

    #[test]
    fn wrong_datagram_length_rejected() {
        assert!(
            SignedTransaction::from_datagram(&[0u8; 12])
                == Err(TransactionError::DatagramLength(12))
        );
    }
}
