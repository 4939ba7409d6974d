use std::sync::Arc;

/// Indicates the lock's underlying type
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LockType {
    Mutex,
    RwLock,
}

/// Indicates how a lock was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LockAcquisition {
    Read,
    Write,
    TryAcquire,
}

/// Name and type of a lock, shared between all clones of the lock.
#[derive(Debug, Clone)]
pub(super) struct LockInfo {
    name: Option<Arc<str>>,
    #[cfg_attr(not(feature = "log-lock-events"), allow(dead_code))]
    lock_type: LockType,
}

impl LockInfo {
    pub(super) fn new(lock_type: LockType, name: Option<&str>) -> Self {
        Self {
            name: name.map(Arc::from),
            lock_type,
        }
    }

    pub(super) fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("?")
    }

    #[cfg_attr(not(feature = "log-lock-events"), allow(unused_variables))]
    pub(super) fn acquired(&self, acquisition: LockAcquisition) {
        #[cfg(feature = "log-lock-events")]
        tracing::trace!(
            lock = self.name(),
            lock_type = %self.lock_type,
            %acquisition,
            "lock acquired"
        );
    }

    #[cfg_attr(not(feature = "log-lock-events"), allow(unused_variables))]
    pub(super) fn released(&self, acquisition: LockAcquisition) {
        #[cfg(feature = "log-lock-events")]
        tracing::trace!(
            lock = self.name(),
            lock_type = %self.lock_type,
            %acquisition,
            "lock released"
        );
    }
}
