use core::{error, fmt};

use crate::sync::{CancelToken, Condvar, MutexGuard, PoisonError};
use crate::time::{Duration, Instant};

/// Upper bound on how long a cancellable waiter sleeps between two looks at
/// its [`CancelToken`].
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

// -----------------------------------------------------------------------------
// WaitError

/// The reason a blocking call gave up before its condition was met.
///
/// Returned only after the call has undone everything it did, so the caller
/// may simply retry or abort.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum WaitError {
    /// The [`Deadline`] passed.
    TimedOut,
    /// The [`CancelToken`] was cancelled.
    Cancelled,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            WaitError::TimedOut => "timed out while waiting".fmt(f),
            WaitError::Cancelled => "wait was cancelled".fmt(f),
        }
    }
}

impl error::Error for WaitError {}

// -----------------------------------------------------------------------------
// Deadline

/// A point in time after which waiting stops.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum Deadline {
    /// Wait as long as it takes.
    #[default]
    Never,
    /// Stop waiting once this instant has passed.
    At(Instant),
}

impl Deadline {
    /// A deadline `dur` from now.
    ///
    /// Durations too large to represent become [`Deadline::Never`].
    #[inline]
    pub fn after(dur: Duration) -> Self {
        match Instant::now().checked_add(dur) {
            Some(at) => Deadline::At(at),
            None => Deadline::Never,
        }
    }

    /// A deadline that has already passed.
    #[inline]
    pub fn now() -> Self {
        Deadline::At(Instant::now())
    }

    /// Time left before the deadline, `None` for [`Deadline::Never`].
    #[inline]
    pub fn remaining(&self) -> Option<Duration> {
        match *self {
            Deadline::Never => None,
            Deadline::At(at) => Some(at.saturating_duration_since(Instant::now())),
        }
    }

    /// Returns `true` if the deadline has passed.
    #[inline]
    pub fn is_expired(&self) -> bool {
        match *self {
            Deadline::Never => false,
            Deadline::At(at) => Instant::now() >= at,
        }
    }
}

// -----------------------------------------------------------------------------
// WaitPolicy

/// How long a blocking call may wait, and what may cut it short.
///
/// All blocking operations in the workspace (`BoundedBuffer::produce_with`,
/// `TaskPool::shutdown_with`, lock acquisition in the deadlock demo) take one.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vc_os::sync::{CancelToken, Condvar, Mutex, WaitError, WaitPolicy};
///
/// let ready = Mutex::new(false);
/// let changed = Condvar::new();
/// let token = CancelToken::new();
///
/// let policy = WaitPolicy::timeout(Duration::from_millis(10)).with_cancel(&token);
/// let (guard, result) = policy.wait_while(&changed, ready.lock().unwrap(), |ready| !*ready);
///
/// assert_eq!(result, Err(WaitError::TimedOut));
/// assert!(!*guard);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct WaitPolicy<'a> {
    deadline: Deadline,
    cancel: Option<&'a CancelToken>,
}

impl<'a> WaitPolicy<'a> {
    /// Wait until the condition holds, however long that is.
    #[inline]
    pub const fn forever() -> Self {
        Self {
            deadline: Deadline::Never,
            cancel: None,
        }
    }

    /// Do not wait at all.
    #[inline]
    pub fn immediate() -> Self {
        Self::until(Deadline::now())
    }

    /// Wait at most `dur`.
    #[inline]
    pub fn timeout(dur: Duration) -> Self {
        Self::until(Deadline::after(dur))
    }

    /// Wait until `deadline`.
    #[inline]
    pub const fn until(deadline: Deadline) -> Self {
        Self {
            deadline,
            cancel: None,
        }
    }

    /// Also stop waiting once `token` is cancelled.
    #[inline]
    pub const fn with_cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The deadline of this policy.
    #[inline]
    pub const fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Returns the reason to stop waiting, if any.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn check(&self) -> Result<(), WaitError> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(WaitError::Cancelled);
        }
        if self.deadline.is_expired() {
            return Err(WaitError::TimedOut);
        }
        Ok(())
    }

    /// Blocks on `condvar` while `condition` returns `true`.
    ///
    /// The condition is evaluated under the lock before every wait and after
    /// every wake-up, spurious or not, so a satisfied condition always wins
    /// over an expired deadline or a cancelled token. When this returns an
    /// error the condition was still `true` at the last check, which means no
    /// notification meant for a waiter in the other state was swallowed.
    ///
    /// The guard is handed back in both cases.
    pub fn wait_while<'g, T, F>(
        &self,
        condvar: &Condvar,
        mut guard: MutexGuard<'g, T>,
        mut condition: F,
    ) -> (MutexGuard<'g, T>, Result<(), WaitError>)
    where
        F: FnMut(&mut T) -> bool,
    {
        loop {
            if !condition(&mut *guard) {
                return (guard, Ok(()));
            }
            if let Err(err) = self.check() {
                return (guard, Err(err));
            }
            guard = match self.slice() {
                None => condvar.wait(guard).unwrap_or_else(PoisonError::into_inner),
                Some(dur) => {
                    condvar
                        .wait_timeout(guard, dur)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// How long the next single wait may last.
    fn slice(&self) -> Option<Duration> {
        let remaining = self.deadline.remaining();
        if self.cancel.is_none() {
            return remaining;
        }
        Some(match remaining {
            Some(dur) => dur.min(CANCEL_POLL_INTERVAL),
            None => CANCEL_POLL_INTERVAL,
        })
    }
}

// -----------------------------------------------------------------------------
// Tests
