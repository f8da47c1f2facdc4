//! Useful synchronization primitives.
//!
//! The locking primitives are the standard library's, re-exported so that
//! every crate in the workspace names them through one path.
//!
//! On top of them this module defines how a blocking call may give up:
//!
//! - [`Deadline`]: a point in time after which waiting stops, or never.
//! - [`CancelToken`]: a shared flag another thread flips to abandon waits.
//! - [`WaitPolicy`]: a deadline plus an optional token, with
//!   [`WaitPolicy::wait_while`] doing the condvar loop.
//! - [`WaitError`]: why a wait gave up.
//!
//! Lock poisoning is treated as recoverable everywhere in this workspace;
//! see [`lock`].
//!
//! See the [standard library] for the re-exported items.
//!
//! [standard library]: https://doc.rust-lang.org/std/sync/index.html

// -----------------------------------------------------------------------------
// Modules

mod cancel;
mod wait;

pub mod atomic;

// -----------------------------------------------------------------------------
// Exports

pub use alloc::sync::{Arc, Weak};

pub use std::sync::{
    PoisonError, TryLockError, TryLockResult, LockResult,
    Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
    Barrier, BarrierWaitResult, Condvar, WaitTimeoutResult,
    Once, OnceLock, OnceState, LazyLock, mpsc,
};

pub use cancel::CancelToken;
pub use wait::{Deadline, WaitError, WaitPolicy};

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// None of the structures in this workspace run foreign code while holding
/// their own locks, so a poisoned lock still guards consistent data.
#[inline]
pub fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
