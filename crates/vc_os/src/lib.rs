//! Platform layer and blocking primitives.
//!
//! - [`sync`]: the standard library's locking primitives, atomics, and the
//!   cancellation/deadline vocabulary ([`CancelToken`], [`Deadline`],
//!   [`WaitPolicy`]) shared by every blocking call in the workspace.
//! - [`thread`]: `sleep` and a never-zero `available_parallelism`.
//! - [`time`]: `Instant` and `Duration`.
//! - [`utils`]: concurrent data structures built on the above,
//!   [`BoundedBuffer`] and [`AtomicCounter`].
//!
//! [`CancelToken`]: sync::CancelToken
//! [`Deadline`]: sync::Deadline
//! [`WaitPolicy`]: sync::WaitPolicy
//! [`BoundedBuffer`]: utils::BoundedBuffer
//! [`AtomicCounter`]: utils::AtomicCounter

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod sync;
pub mod thread;
pub mod time;
pub mod utils;
