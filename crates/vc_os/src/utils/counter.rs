use core::fmt;

use crate::sync::atomic::{AtomicU64, Ordering};
use crate::sync::{Mutex, lock};

// -----------------------------------------------------------------------------
// AtomicCounter

/// A counter whose read-modify-write runs under mutual exclusion.
///
/// Once every caller of [`increment`] has been joined, [`get`] returns
/// exactly the number of calls made. Nothing is promised about the order of
/// unrelated increments.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use vc_os::utils::AtomicCounter;
///
/// let counter = AtomicCounter::new();
///
/// thread::scope(|s| {
///     for _ in 0..100 {
///         s.spawn(|| {
///             for _ in 0..1000 {
///                 counter.increment();
///             }
///         });
///     }
/// });
///
/// assert_eq!(counter.get(), 100_000);
/// ```
///
/// [`increment`]: Self::increment
/// [`get`]: Self::get
pub struct AtomicCounter {
    value: Mutex<u64>,
}

impl AtomicCounter {
    /// Creates a counter starting at zero.
    #[inline]
    pub const fn new() -> Self {
        Self {
            value: Mutex::new(0),
        }
    }

    /// Adds one.
    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds `n` in a single critical section.
    #[inline]
    pub fn add(&self, n: u64) {
        let mut value = lock(&self.value);
        *value = value.wrapping_add(n);
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> u64 {
        *lock(&self.value)
    }
}

impl Default for AtomicCounter {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AtomicCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCounter").field(&self.get()).finish()
    }
}

// -----------------------------------------------------------------------------
// RacyCounter

/// The broken baseline for [`AtomicCounter`]: load and store are separate
/// steps, so concurrent increments overwrite each other.
///
/// Memory-safe, but `get()` may end up below the number of `increment()`
/// calls. Only useful to show what mutual exclusion buys.
pub struct RacyCounter {
    value: AtomicU64,
}

impl RacyCounter {
    /// Creates a counter starting at zero.
    #[inline]
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Reads, adds one, writes back. Not atomic as a whole.
    #[inline]
    pub fn increment(&self) {
        let current = self.value.load(Ordering::Relaxed);
        core::hint::spin_loop();
        self.value.store(current.wrapping_add(1), Ordering::Relaxed);
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for RacyCounter {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RacyCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RacyCounter").field(&self.get()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::{AtomicCounter, RacyCounter};

    #[test]
    fn single_thread() {
        let c = AtomicCounter::new();
        assert_eq!(c.get(), 0);
        c.increment();
        c.add(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn hundred_threads_thousand_each() {
        const THREADS: usize = 100;
        const PER_THREAD: usize = 1000;

        let counter = Arc::new(AtomicCounter::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        counter.increment();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.get(), (THREADS * PER_THREAD) as u64);
    }

    #[test]
    fn racy_counter_never_overcounts() {
        let counter = RacyCounter::new();
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        counter.increment();
                    }
                });
            }
        });
        // lost updates are likely but not guaranteed
        let value = counter.get();
        assert!(value > 0 && value <= 80_000);
    }
}
