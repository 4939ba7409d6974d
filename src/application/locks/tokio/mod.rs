//! Provides simplified tokio lock types for sharing wallet state between tasks
//!
//! Every lock carries a name. With the `log-lock-events` feature enabled, each
//! acquisition and release is emitted as a `trace` event carrying that name,
//! which is usually enough to find out which task is sitting on the session
//! or on an account while another one waits.

mod atomic_mutex;
mod atomic_rw;
mod shared;

pub use atomic_mutex::AtomicMutex;
pub use atomic_mutex::AtomicMutexGuard;
pub use atomic_rw::AtomicRw;
pub use atomic_rw::AtomicRwReadGuard;
pub use atomic_rw::AtomicRwWriteGuard;
pub use shared::LockAcquisition;
use shared::LockInfo;
pub use shared::LockType;
