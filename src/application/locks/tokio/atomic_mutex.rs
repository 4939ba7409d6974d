use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::MutexGuard;
use tokio::sync::TryLockError;

use super::LockAcquisition;
use super::LockInfo;
use super::LockType;

/// An `Arc<Mutex<T>>` wrapper to make data thread-safe and easy to work with.
///
/// Unlike [`AtomicRw`](super::AtomicRw) every access is exclusive, which is
/// what read-then-increment sequences need.
///
/// # Examples
/// ```
/// # use wots_vault::application::locks::tokio::AtomicMutex;
/// struct Counter {
///     next: i64,
/// };
/// # tokio_test::block_on(async {
/// let counter = AtomicMutex::from(Counter { next: -1 });
/// let issued = counter.lock_mut(|c| { let n = c.next; c.next += 1; n }).await;
/// assert_eq!(-1, issued);
/// # })
/// ```
#[derive(Debug)]
pub struct AtomicMutex<T> {
    inner: Arc<Mutex<T>>,
    info: LockInfo,
}

impl<T: Default> Default for AtomicMutex<T> {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            info: LockInfo::new(LockType::Mutex, None),
        }
    }
}

impl<T> From<T> for AtomicMutex<T> {
    #[inline]
    fn from(t: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(t)),
            info: LockInfo::new(LockType::Mutex, None),
        }
    }
}

impl<T> From<(T, &str)> for AtomicMutex<T> {
    /// Create from a value and a name used when tracing lock events.
    #[inline]
    fn from((t, name): (T, &str)) -> Self {
        Self {
            inner: Arc::new(Mutex::new(t)),
            info: LockInfo::new(LockType::Mutex, Some(name)),
        }
    }
}

impl<T> Clone for AtomicMutex<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            info: self.info.clone(),
        }
    }
}

// Reads are exclusive too, so the mutating accessors only need `&self`.
// Clones held by different tasks serialize on the same mutex.
impl<T> AtomicMutex<T> {
    /// The name given at construction, or `?`.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    /// Acquire the lock and return an `AtomicMutexGuard`
    pub async fn lock_guard(&self) -> AtomicMutexGuard<'_, T> {
        let guard = self.inner.lock().await;
        AtomicMutexGuard::new(guard, &self.info, LockAcquisition::Write)
    }

    /// Attempt to acquire the lock without waiting. Returns an error if the
    /// lock is already held.
    pub fn try_lock_guard(&self) -> Result<AtomicMutexGuard<'_, T>, TryLockError> {
        let guard = self.inner.try_lock()?;
        Ok(AtomicMutexGuard::new(
            guard,
            &self.info,
            LockAcquisition::TryAcquire,
        ))
    }

    /// Immutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.lock().await;
        let guard = AtomicMutexGuard::new(guard, &self.info, LockAcquisition::Read);
        f(&guard)
    }

    /// Mutably access the data of type `T` in a closure and possibly return a result of type `R`
    pub async fn lock_mut<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_guard().await;
        f(&mut guard)
    }
}

/// A wrapper for [MutexGuard](tokio::sync::MutexGuard) that traces its
/// release.
#[derive(Debug)]
pub struct AtomicMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    info: &'a LockInfo,
    acquisition: LockAcquisition,
}

impl<'a, T> AtomicMutexGuard<'a, T> {
    fn new(guard: MutexGuard<'a, T>, info: &'a LockInfo, acquisition: LockAcquisition) -> Self {
        info.acquired(acquisition);
        Self {
            guard,
            info,
            acquisition,
        }
    }
}

impl<T> Drop for AtomicMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.info.released(self.acquisition);
    }
}

impl<T> Deref for AtomicMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for AtomicMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[traced_test]
    #[tokio::test]
    async fn try_acquire_fails_while_held() {
        let atomic_unit = AtomicMutex::<()>::from(((), "unit"));
        assert!(
            atomic_unit.try_lock_guard().is_ok(),
            "Must succeed when no lock is held"
        );

        let _held_lock = atomic_unit.lock_guard().await;
        assert!(
            atomic_unit.try_lock_guard().is_err(),
            "Must fail when lock is held"
        );
    }

    #[tokio::test]
    async fn concurrent_increments_serialize() {
        let counter = AtomicMutex::from(0u64);
        let handles = (0..16)
            .map(|_| {
                let c = counter.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let mut guard = c.lock_guard().await;
                        let read = *guard;
                        tokio::task::yield_now().await;
                        *guard = read + 1;
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(1600, counter.lock(|c| *c).await);
    }
}
