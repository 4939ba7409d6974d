use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::derivation;
use super::derivation::WotsKeypair;
use super::errors::WalletError;
use super::secret_bytes::SecretBytes;
use super::wots::AccountTag;
use super::wots::WotsAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountType {
    /// Derived from the wallet's master seed.
    Standard,
    Imported,
    Hardware,
}

/// Where an account's key material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountSource {
    Mnemonic,
    Mcm,
    Keypair,
}

/// Position of an account's next unspent WOTS keypair.
///
/// `-1` designates the account's canonical first address, which is not
/// addressed by a derivation index. Every spend moves the index forward and
/// it never moves back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WotsIndex(i64);

impl WotsIndex {
    pub const FIRST: Self = Self(-1);

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn is_first(self) -> bool {
        self == Self::FIRST
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for WotsIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A wallet account.
///
/// `seed` is the account seed for derived accounts and the imported WOTS
/// secret for imported ones. `first_address` is the address the account
/// is known by on the ledger; its tail is `tag`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub tag: AccountTag,
    /// Derivation index under the master seed; `None` for imported accounts.
    pub index: Option<u32>,
    pub(crate) seed: SecretBytes<32>,
    pub wots_index: WotsIndex,
    #[serde(rename = "faddress")]
    pub first_address: WotsAddress,
    #[serde(default)]
    pub balance: u64,
    pub source: AccountSource,
    pub order: u32,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Account {
    /// An account derived from the master seed at `index`.
    pub fn derived(
        name: String,
        index: u32,
        seed: SecretBytes<32>,
        tag: AccountTag,
        order: u32,
    ) -> Self {
        let first = derivation::derive_first_keypair(&seed, &tag);
        Self {
            name,
            account_type: AccountType::Standard,
            tag,
            index: Some(index),
            seed,
            wots_index: WotsIndex::FIRST,
            first_address: first.address,
            balance: 0,
            source: AccountSource::Mnemonic,
            order,
            is_deleted: false,
            avatar: None,
        }
    }

    /// An account wrapping a keypair generated elsewhere. Its tag is the
    /// address's tail.
    pub fn imported(
        name: String,
        keypair: WotsKeypair,
        source: AccountSource,
        order: u32,
    ) -> Self {
        Self {
            name,
            account_type: AccountType::Imported,
            tag: keypair.address.tag(),
            index: None,
            seed: keypair.secret,
            wots_index: WotsIndex::FIRST,
            first_address: keypair.address,
            balance: 0,
            source,
            order,
            is_deleted: false,
            avatar: None,
        }
    }

    /// The keypair at `wots_index`.
    ///
    /// At [`WotsIndex::FIRST`] this is the canonical first keypair: derived
    /// for mnemonic accounts, the stored keypair itself for imported ones.
    pub fn keypair_at(&self, wots_index: WotsIndex) -> Result<WotsKeypair, WalletError> {
        if !wots_index.is_first() {
            return derivation::derive_wots_keypair(&self.seed, wots_index.value(), Some(&self.tag));
        }
        Ok(match self.source {
            AccountSource::Mnemonic => derivation::derive_first_keypair(&self.seed, &self.tag),
            AccountSource::Mcm | AccountSource::Keypair => WotsKeypair {
                secret: self.seed.clone(),
                address: self.first_address.clone(),
            },
        })
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("type", &self.account_type)
            .field("tag", &self.tag)
            .field("index", &self.index)
            .field("wots_index", &self.wots_index)
            .field("source", &self.source)
            .field("order", &self.order)
            .field("is_deleted", &self.is_deleted)
            .finish_non_exhaustive()
    }
}
