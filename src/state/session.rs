//! The one piece of process-wide secret state: the unlocked master seed.
//!
//! Derivations hold the session's read lock for their whole duration, and
//! [`Session::lock`] takes the write lock. A lock request therefore waits
//! for in-flight derivations to finish, and no derivation can observe a
//! half-zeroed seed.

use super::wallet::errors::WalletError;
use super::wallet::master_seed::MasterSeed;
use super::wallet::secret_bytes::SecretBytes;
use crate::application::locks::tokio::AtomicRw;

struct UnlockedSession {
    seed: MasterSeed,
    storage_key: SecretBytes<32>,
}

/// Handle to the session. Clones share state.
#[derive(Clone)]
pub struct Session {
    inner: AtomicRw<Option<UnlockedSession>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("lock", &self.inner.name())
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A locked session.
    pub fn new() -> Self {
        Self {
            inner: AtomicRw::from((None, "Session")),
        }
    }

    /// Install `seed`, replacing and zeroing any previous one.
    pub async fn unlock(&mut self, seed: MasterSeed) -> Result<(), WalletError> {
        let storage_key = seed.derive_storage_key()?;
        let previous = self
            .inner
            .lock_mut(|session| session.replace(UnlockedSession { seed, storage_key }))
            .await;
        if let Some(mut previous) = previous {
            previous.seed.lock();
        }
        tracing::debug!("session unlocked");
        Ok(())
    }

    /// Zero the seed and storage key. Waits for in-flight readers.
    pub async fn lock(&mut self) {
        let previous = self.inner.lock_mut(Option::take).await;
        if let Some(mut previous) = previous {
            previous.seed.lock();
            tracing::debug!("session locked");
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        self.inner.lock(Option::is_some).await
    }

    /// Run `f` against the unlocked seed, holding the read lock throughout.
    pub async fn with_seed<R>(
        &self,
        f: impl FnOnce(&MasterSeed) -> Result<R, WalletError>,
    ) -> Result<R, WalletError> {
        let session = self.inner.lock_guard().await;
        let unlocked = session.as_ref().ok_or(WalletError::Locked)?;
        f(&unlocked.seed)
    }

    /// Like [`with_seed`](Self::with_seed), for operations that update the
    /// seed's export state.
    pub async fn with_seed_mut<R>(
        &mut self,
        f: impl FnOnce(&mut MasterSeed) -> Result<R, WalletError>,
    ) -> Result<R, WalletError> {
        let mut session = self.inner.lock_guard_mut().await;
        let unlocked = session.as_mut().ok_or(WalletError::Locked)?;
        f(&mut unlocked.seed)
    }

    pub async fn storage_key(&self) -> Result<SecretBytes<32>, WalletError> {
        self.inner
            .lock(|session| session.as_ref().map(|unlocked| unlocked.storage_key.clone()))
            .await
            .ok_or(WalletError::Locked)
    }
}
