//! Thread helpers.
//!
//! `sleep` is the standard library's; [`available_parallelism`] never fails.

pub use std::thread::sleep;

// -----------------------------------------------------------------------------
// available_parallelism

use core::num::NonZero;

/// Returns an estimate of the default amount of parallelism a program should use.
///
/// It's similar to [`std::thread::available_parallelism`],
/// but when that function fails it directly returns `1`.
///
/// We ensure that `result > 0` .
pub fn available_parallelism() -> NonZero<usize> {
    std::thread::available_parallelism().unwrap_or(NonZero::<usize>::MIN)
}
