use alloc::collections::VecDeque;
use core::fmt;

use crate::sync::{CancelToken, Condvar, Mutex, MutexGuard, WaitPolicy, lock};
use crate::time::Duration;

mod error;

pub use error::{CapacityViolation, ConsumeError, ProduceError};

// -----------------------------------------------------------------------------
// State

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Number of items ever appended. Used as the hand-off ticket of a
    /// rendezvous buffer.
    pushed: u64,
    /// Number of items ever removed.
    popped: u64,
}

// -----------------------------------------------------------------------------
// BoundedBuffer

/// A fixed-capacity blocking FIFO queue shared by producers and consumers.
///
/// Every operation runs its check, mutation and wake-up inside one critical
/// section guarded by a single mutex. Each wait condition has its own
/// condition variable:
///
/// - producers wait on *not full* and wake at most one consumer per item;
/// - consumers wait on *not empty* and wake at most one producer per item.
///
/// Items come out in the order they went in: the n-th successful consume
/// returns the n-th successful produce, whatever the number of threads on
/// either side. No fairness is promised between waiters.
///
/// ## Giving up
///
/// The plain [`produce`] and [`consume`] block for as long as it takes. The
/// `_timeout`, `_until` and `_with` variants accept a deadline and/or a
/// [`CancelToken`]; when they give up they return the rejected value inside
/// the error and the buffer is exactly as it was.
///
/// ## Closing
///
/// [`close`] wakes everybody. Producers are refused from then on while
/// consumers keep draining; they see [`ConsumeError::Closed`] once nothing
/// is left.
///
/// ## Capacity 0
///
/// A zero-capacity buffer is a rendezvous point: [`produce`] returns only
/// after a consumer has taken the value. The value travels through a single
/// hand-off slot that is never counted by [`len`].
///
/// # Examples
///
/// ```
/// use std::thread;
/// use vc_os::utils::BoundedBuffer;
///
/// let buffer = BoundedBuffer::new(2);
///
/// thread::scope(|s| {
///     s.spawn(|| {
///         for i in 0..10 {
///             buffer.produce(i).unwrap();
///         }
///     });
///
///     let received: Vec<i32> = (0..10).map(|_| buffer.consume().unwrap()).collect();
///     assert_eq!(received, (0..10).collect::<Vec<_>>());
/// });
/// ```
///
/// [`produce`]: Self::produce
/// [`consume`]: Self::consume
/// [`close`]: Self::close
/// [`len`]: Self::len
pub struct BoundedBuffer<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    /// Only waited on by rendezvous producers.
    handed_off: Condvar,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Creates a buffer that holds at most `capacity` items.
    ///
    /// A capacity of `0` creates a rendezvous buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_os::utils::BoundedBuffer;
    ///
    /// let buffer = BoundedBuffer::<u8>::new(5);
    /// assert_eq!(buffer.capacity(), 5);
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
                pushed: 0,
                popped: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            handed_off: Condvar::new(),
            capacity,
        }
    }

    /// Creates a buffer whose producers never wait.
    #[inline]
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Returns the capacity given at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items currently buffered.
    ///
    /// Always `0` for a rendezvous buffer.
    pub fn len(&self) -> usize {
        if self.is_rendezvous() {
            0
        } else {
            lock(&self.state).items.len()
        }
    }

    /// Returns `true` if there is no buffered item.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a producer would have to wait right now.
    ///
    /// Always `true` for a rendezvous buffer, whose producers wait for a
    /// consumer even when nothing is buffered.
    pub fn is_full(&self) -> bool {
        self.is_rendezvous() || lock(&self.state).items.len() >= self.slots()
    }

    /// Refuses every future produce and wakes every waiter.
    ///
    /// Items already buffered can still be consumed.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        state.closed = true;
        log::debug!("bounded buffer closed with {} item(s) left", state.items.len());
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    // -------------------------------------------------------------------------
    // produce

    /// Appends `value`, blocking while the buffer is full.
    ///
    /// Only fails if the buffer is closed.
    #[inline]
    pub fn produce(&self, value: T) -> Result<(), ProduceError<T>> {
        self.produce_with(value, WaitPolicy::forever())
    }

    /// Appends `value`, waiting at most `timeout` for room.
    #[inline]
    pub fn produce_timeout(&self, value: T, timeout: Duration) -> Result<(), ProduceError<T>> {
        self.produce_with(value, WaitPolicy::timeout(timeout))
    }

    /// Appends `value`, waiting for room until `token` is cancelled.
    #[inline]
    pub fn produce_until(&self, value: T, token: &CancelToken) -> Result<(), ProduceError<T>> {
        self.produce_with(value, WaitPolicy::forever().with_cancel(token))
    }

    /// Appends `value` if there is room right now.
    ///
    /// A rendezvous buffer never accepts a value this way, since nobody can
    /// take it before the call returns.
    pub fn try_produce(&self, value: T) -> Result<(), ProduceError<T>> {
        self.produce_with(value, WaitPolicy::immediate())
            .map_err(|err| match err {
                ProduceError::TimedOut(value) => ProduceError::Full(value),
                other => other,
            })
    }

    /// Appends `value`, waiting for room as `policy` allows.
    pub fn produce_with(&self, value: T, policy: WaitPolicy<'_>) -> Result<(), ProduceError<T>> {
        let state = lock(&self.state);
        let slots = self.slots();

        let (mut state, waited) =
            policy.wait_while(&self.not_full, state, |s| !s.closed && s.items.len() >= slots);

        if state.closed {
            return Err(ProduceError::Closed(value));
        }
        if let Err(err) = waited {
            return Err(ProduceError::from_wait(err, value));
        }

        state.items.push_back(value);
        let ticket = state.pushed;
        state.pushed += 1;
        self.check_capacity(&state);
        self.not_empty.notify_one();

        if self.is_rendezvous() {
            self.await_hand_off(state, ticket, policy)
        } else {
            Ok(())
        }
    }

    /// Blocks a rendezvous producer until its item, numbered `ticket`, has
    /// been consumed. On timeout or cancellation the item is taken back.
    fn await_hand_off(
        &self,
        state: MutexGuard<'_, State<T>>,
        ticket: u64,
        policy: WaitPolicy<'_>,
    ) -> Result<(), ProduceError<T>> {
        let (mut state, waited) =
            policy.wait_while(&self.handed_off, state, |s| s.popped <= ticket);

        let Err(err) = waited else {
            return Ok(());
        };

        // The hand-off slot holds exactly one item and it is ours.
        match state.items.pop_back() {
            Some(value) => {
                state.pushed -= 1;
                drop(state);
                self.not_full.notify_one();
                Err(ProduceError::from_wait(err, value))
            }
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // consume

    /// Removes the oldest item, blocking while the buffer is empty.
    ///
    /// Only fails once the buffer is closed and drained.
    #[inline]
    pub fn consume(&self) -> Result<T, ConsumeError> {
        self.consume_with(WaitPolicy::forever())
    }

    /// Removes the oldest item, waiting at most `timeout` for one.
    #[inline]
    pub fn consume_timeout(&self, timeout: Duration) -> Result<T, ConsumeError> {
        self.consume_with(WaitPolicy::timeout(timeout))
    }

    /// Removes the oldest item, waiting for one until `token` is cancelled.
    #[inline]
    pub fn consume_until(&self, token: &CancelToken) -> Result<T, ConsumeError> {
        self.consume_with(WaitPolicy::forever().with_cancel(token))
    }

    /// Removes the oldest item if there is one right now.
    pub fn try_consume(&self) -> Result<T, ConsumeError> {
        self.consume_with(WaitPolicy::immediate())
            .map_err(|err| match err {
                ConsumeError::TimedOut => ConsumeError::Empty,
                other => other,
            })
    }

    /// Removes the oldest item, waiting for one as `policy` allows.
    pub fn consume_with(&self, policy: WaitPolicy<'_>) -> Result<T, ConsumeError> {
        let state = lock(&self.state);

        let (mut state, waited) =
            policy.wait_while(&self.not_empty, state, |s| !s.closed && s.items.is_empty());

        match state.items.pop_front() {
            Some(value) => {
                state.popped += 1;
                self.check_capacity(&state);
                drop(state);

                self.not_full.notify_one();
                if self.is_rendezvous() {
                    self.handed_off.notify_all();
                }
                Ok(value)
            }
            None => match waited {
                Err(err) => Err(err.into()),
                Ok(()) => Err(ConsumeError::Closed),
            },
        }
    }

    // -------------------------------------------------------------------------
    // internal

    #[inline]
    fn is_rendezvous(&self) -> bool {
        self.capacity == 0
    }

    /// Number of items the queue may physically hold.
    #[inline]
    fn slots(&self) -> usize {
        self.capacity.max(1)
    }

    fn check_capacity(&self, state: &State<T>) {
        let len = state.items.len();
        if len > self.slots() {
            panic!("{}", CapacityViolation { len, capacity: self.capacity });
        }
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("BoundedBuffer")
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests;
