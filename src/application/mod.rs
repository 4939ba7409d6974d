//! Everything around the wallet core: configuration, lock wrappers and the
//! collaborator boundaries for storage and the ledger network.

pub mod commands;
pub mod config;
pub mod ledger;
pub mod locks;
pub mod storage;
