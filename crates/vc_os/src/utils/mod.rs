//! Concurrent data structures built on [`sync`](crate::sync).
//!
//! - [`BoundedBuffer`] : A blocking FIFO queue with a fixed capacity. Producers wait
//!   while it is full, consumers while it is empty. Capacity `0` makes a rendezvous.
//! - [`AtomicCounter`] : A counter whose increments are serialized by a mutex, so no
//!   update is ever lost.
//! - [`RacyCounter`] : The same counter without exclusion, kept as a baseline that
//!   does lose updates.

// -----------------------------------------------------------------------------
// Modules

mod bounded_buffer;
mod counter;

// -----------------------------------------------------------------------------
// Exports

pub use bounded_buffer::{BoundedBuffer, CapacityViolation, ConsumeError, ProduceError};
pub use counter::{AtomicCounter, RacyCounter};
