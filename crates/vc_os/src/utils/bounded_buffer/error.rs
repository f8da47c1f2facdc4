use core::{error, fmt};

use crate::sync::WaitError;

/// An error returned from the `produce` family on a [`BoundedBuffer`].
///
/// The rejected value is always handed back; the buffer is unchanged.
///
/// [`BoundedBuffer`]: super::BoundedBuffer
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum ProduceError<T> {
    /// The buffer is full and the call was not allowed to wait
    /// ([`try_produce`](super::BoundedBuffer::try_produce)).
    Full(T),
    /// The buffer has been closed.
    Closed(T),
    /// The deadline passed while the buffer stayed full.
    TimedOut(T),
    /// The wait was cancelled while the buffer stayed full.
    Cancelled(T),
}

impl<T> ProduceError<T> {
    /// Returns the value that could not be produced.
    #[inline]
    pub fn into_inner(self) -> T {
        match self {
            ProduceError::Full(t)
            | ProduceError::Closed(t)
            | ProduceError::TimedOut(t)
            | ProduceError::Cancelled(t) => t,
        }
    }

    /// Returns `true` if the buffer rejected the value because it is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, ProduceError::Closed(..))
    }

    #[inline]
    pub(super) fn from_wait(err: WaitError, value: T) -> Self {
        match err {
            WaitError::TimedOut => ProduceError::TimedOut(value),
            WaitError::Cancelled => ProduceError::Cancelled(value),
        }
    }
}

impl<T> fmt::Debug for ProduceError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProduceError::Full(..) => "Full(..)".fmt(f),
            ProduceError::Closed(..) => "Closed(..)".fmt(f),
            ProduceError::TimedOut(..) => "TimedOut(..)".fmt(f),
            ProduceError::Cancelled(..) => "Cancelled(..)".fmt(f),
        }
    }
}

impl<T> fmt::Display for ProduceError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProduceError::Full(..) => "producing into a full buffer".fmt(f),
            ProduceError::Closed(..) => "producing into a closed buffer".fmt(f),
            ProduceError::TimedOut(..) => "timed out waiting for room in the buffer".fmt(f),
            ProduceError::Cancelled(..) => "cancelled while waiting for room in the buffer".fmt(f),
        }
    }
}

impl<T> error::Error for ProduceError<T> {}

/// An error returned from the `consume` family on a [`BoundedBuffer`].
///
/// [`BoundedBuffer`]: super::BoundedBuffer
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ConsumeError {
    /// The buffer is empty and the call was not allowed to wait
    /// ([`try_consume`](super::BoundedBuffer::try_consume)).
    Empty,
    /// The buffer is closed and every item has been consumed.
    Closed,
    /// The deadline passed while the buffer stayed empty.
    TimedOut,
    /// The wait was cancelled while the buffer stayed empty.
    Cancelled,
}

impl fmt::Display for ConsumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConsumeError::Empty => "consuming from an empty buffer".fmt(f),
            ConsumeError::Closed => "buffer is empty and closed".fmt(f),
            ConsumeError::TimedOut => "timed out waiting for an item".fmt(f),
            ConsumeError::Cancelled => "cancelled while waiting for an item".fmt(f),
        }
    }
}

impl error::Error for ConsumeError {}

impl From<WaitError> for ConsumeError {
    /// Maps the wait outcome onto the matching variant.
    fn from(err: WaitError) -> ConsumeError {
        match err {
            WaitError::TimedOut => ConsumeError::TimedOut,
            WaitError::Cancelled => ConsumeError::Cancelled,
        }
    }
}

/// Raised (as a panic) when a buffer observes more items than it has slots.
///
/// This can only happen through a bug in [`BoundedBuffer`] itself, so it is
/// never returned to callers.
///
/// [`BoundedBuffer`]: super::BoundedBuffer
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct CapacityViolation {
    pub len: usize,
    pub capacity: usize,
}

impl fmt::Display for CapacityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bounded buffer holds {} items but has capacity {}",
            self.len, self.capacity
        )
    }
}

impl error::Error for CapacityViolation {}
