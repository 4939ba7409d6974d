//! Persistent key-value storage consumed by the wallet.
//!
//! The wallet never assumes a particular backend. It only relies on
//! [`KeyValueStore`]: single-key writes are atomic, and
//! [`save_batch`](KeyValueStore::save_batch) either applies every entry or
//! none.

mod file_system;
mod memory;

use std::path::PathBuf;

pub use file_system::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt record '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys starting with `prefix`, in ascending order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Write every entry, or none of them.
    async fn save_batch(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}
