#![deny(clippy::shadow_unrelated)]
//
// If code coverage tool `cargo-llvm-cov` is running with the nightly toolchain,
// enable the unstable “coverage” attribute. This allows using the annotation
// `#[coverage(off)]` to explicitly exclude certain parts of the code from
// being considered as “code under test.”
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Cryptographic core of a non-custodial wallet for a ledger that
//! authenticates transactions with WOTS+ one-time signatures.
//!
//! The crate is split in two layers:
//!
//!  - [`application`]: configuration, lock wrappers, and the two collaborator
//!    boundaries this core consumes ([`KeyValueStore`](application::storage::KeyValueStore)
//!    and [`LedgerClient`](application::ledger::LedgerClient)).
//!  - [`state`]: the wallet proper. Deterministic derivation (DRBG, KDF,
//!    WOTS keypairs), the master seed lifecycle, account bookkeeping, the
//!    legacy MCM archive decoder, and the unlocked [`Session`](state::session::Session).

pub mod application;
pub mod state;


pub use state::session::Session;
pub use state::wallet::errors::WalletError;
pub use state::wallet::hd_wallet::HdWallet;
pub use state::wallet::master_seed::MasterSeed;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version string written into wallet export files.
pub fn version() -> &'static str {
    VERSION
}
