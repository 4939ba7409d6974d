use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::KeyValueStore;
use super::StorageError;
use crate::application::locks::tokio::AtomicMutex;

/// In-process store. Clones share the same map.
///
/// Writes can be made to fail on demand, to exercise the wallet's
/// persist-before-commit paths.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: AtomicMutex<BTreeMap<String, Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: AtomicMutex::from((BTreeMap::new(), "MemoryStore")),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock(|entries| entries.len()).await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.check_writable()?;
        self.entries
            .lock_mut(|entries| entries.insert(key.to_string(), value.to_vec()))
            .await;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.lock(|entries| entries.get(key).cloned()).await)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.entries.lock_mut(|entries| entries.remove(key)).await;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .lock(|entries| {
                entries
                    .keys()
                    .filter(|key| key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn save_batch(&self, batch: Vec<(String, Vec<u8>)>) -> Result<(), StorageError> {
        self.check_writable()?;
        self.entries.lock_mut(|entries| entries.extend(batch)).await;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check_writable()?;
        self.entries.lock_mut(|entries| entries.clear()).await;
        Ok(())
    }
}
