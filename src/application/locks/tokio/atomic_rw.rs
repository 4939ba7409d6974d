use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::RwLockReadGuard;
use tokio::sync::RwLockWriteGuard;
use tokio::sync::TryLockError;

use super::LockAcquisition;
use super::LockInfo;
use super::LockType;

/// An `Arc<RwLock<T>>` wrapper to make data thread-safe and easy to work with.
///
/// # Examples
/// ```
/// # use wots_vault::application::locks::tokio::AtomicRw;
/// struct Account {
///     wots_index: i64,
/// };
/// # tokio_test::block_on(async {
/// let mut atomic_account = AtomicRw::from(Account { wots_index: -1 });
/// atomic_account.lock(|a| println!("index: {}", a.wots_index)).await;
/// atomic_account.lock_mut(|a| a.wots_index += 1).await;
/// # })
/// ```
#[derive(Debug)]
pub struct AtomicRw<T> {
    inner: Arc<RwLock<T>>,
    info: LockInfo,
}

impl<T: Default> Default for AtomicRw<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            info: LockInfo::new(LockType::RwLock, None),
        }
    }
}

impl<T> From<T> for AtomicRw<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(t)),
            info: LockInfo::new(LockType::RwLock, None),
        }
    }
}

impl<T> From<(T, &str)> for AtomicRw<T> {
    /// Create from a value and a name used when tracing lock events.
    #[inline]
    fn from((t, name): (T, &str)) -> Self {
        Self {
            inner: Arc::new(RwLock::new(t)),
            info: LockInfo::new(LockType::RwLock, Some(name)),
        }
    }
}

impl<T> Clone for AtomicRw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            info: self.info.clone(),
        }
    }
}

impl<T> AtomicRw<T> {
    /// The name given at construction, or `?`.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// Acquire read lock and return an `AtomicRwReadGuard`
    pub async fn lock_guard(&self) -> AtomicRwReadGuard<'_, T> {
        let guard = self.inner.read().await;
        AtomicRwReadGuard::new(guard, &self.info, LockAcquisition::Read)
    }

    /// Attempt to acquire a read lock without waiting.
    pub fn try_lock_guard(&self) -> Result<AtomicRwReadGuard<'_, T>, TryLockError> {
        let guard = self.inner.try_read()?;
        Ok(AtomicRwReadGuard::new(
            guard,
            &self.info,
            LockAcquisition::TryAcquire,
        ))
    }

    /// Acquire write lock and return an `AtomicRwWriteGuard`
    pub async fn lock_guard_mut(&mut self) -> AtomicRwWriteGuard<'_, T> {
        let guard = self.inner.write().await;
        AtomicRwWriteGuard::new(guard, &self.info)
    }

    /// Immutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock_guard().await;
        f(&guard)
    }

    /// Mutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock_mut<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_guard_mut().await;
        f(&mut guard)
    }
}

/// A wrapper for [RwLockReadGuard](tokio::sync::RwLockReadGuard) that
/// traces its release.
#[derive(Debug)]
pub struct AtomicRwReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    info: &'a LockInfo,
    acquisition: LockAcquisition,
}

impl<'a, T> AtomicRwReadGuard<'a, T> {
    fn new(guard: RwLockReadGuard<'a, T>, info: &'a LockInfo, acquisition: LockAcquisition) -> Self {
        info.acquired(acquisition);
        Self {
            guard,
            info,
            acquisition,
        }
    }
}

impl<T> Drop for AtomicRwReadGuard<'_, T> {
    fn drop(&mut self) {
        self.info.released(self.acquisition);
    }
}

impl<T> Deref for AtomicRwReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// A wrapper for [RwLockWriteGuard](tokio::sync::RwLockWriteGuard) that
/// traces its release.
#[derive(Debug)]
pub struct AtomicRwWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    info: &'a LockInfo,
}

impl<'a, T> AtomicRwWriteGuard<'a, T> {
    fn new(guard: RwLockWriteGuard<'a, T>, info: &'a LockInfo) -> Self {
        info.acquired(LockAcquisition::Write);
        Self { guard, info }
    }
}

impl<T> Drop for AtomicRwWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.info.released(LockAcquisition::Write);
    }
}

impl<T> Deref for AtomicRwWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for AtomicRwWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
