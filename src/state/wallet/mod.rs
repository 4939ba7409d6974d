//! Wallet internals: derivation tree, master seed, accounts, archives.
//!
//! Dependency order, leaves first: [`drbg`] → [`kdf`] → [`wots`] →
//! [`derivation`] → [`master_seed`] → [`account`] / [`hd_wallet`]. The
//! [`mcm`] decoder sits beside the derivation tree: it yields imported
//! keypairs that bypass derivation entirely.

pub mod account;
pub mod derivation;
pub mod drbg;
pub mod encryption;
pub mod errors;
pub mod hd_wallet;
pub mod kdf;
pub mod master_seed;
pub mod mcm;
pub mod secret_bytes;
pub mod wallet_configuration;
pub mod wallet_export;
pub mod wallet_store;
pub mod wots;
