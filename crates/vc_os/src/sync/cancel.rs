use core::fmt;

use crate::sync::Arc;
use crate::sync::atomic::{AtomicBool, Ordering};

// -----------------------------------------------------------------------------
// CancelToken

/// A shared cancellation flag.
///
/// Clones observe the same flag. Once [`cancel`](Self::cancel) is called the
/// token stays cancelled; blocking calls that were handed the token through a
/// [`WaitPolicy`] return [`WaitError::Cancelled`] shortly afterwards, leaving
/// the structure they were waiting on untouched.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use vc_os::sync::CancelToken;
/// use vc_os::utils::BoundedBuffer;
///
/// let buffer = BoundedBuffer::<u32>::new(1);
/// let token = CancelToken::new();
///
/// thread::scope(|s| {
///     let consumer = s.spawn(|| buffer.consume_until(&token));
///     token.cancel();
///     assert!(consumer.join().unwrap().is_err());
/// });
/// ```
///
/// [`WaitPolicy`]: crate::sync::WaitPolicy
/// [`WaitError::Cancelled`]: crate::sync::WaitError::Cancelled
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[inline]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels every wait that observes this token.
    #[inline]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests
