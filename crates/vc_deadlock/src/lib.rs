//! A two-worker, two-resource scenario that shows how opposite lock
//! acquisition orders deadlock, and how a single global order avoids it.
//!
//! - [`LockOrderingDemo`] : Runs the scenario and returns a [`DemoReport`].
//! - [`TrackedLock`] : An exclusive lock that exposes its holder, so that the
//!   wait-for graph of a stalled run can be inspected.
//! - [`DeadlockDetected`] : The wait-for cycle found in a stalled run.
//!
//! ```
//! use vc_deadlock::{AcquisitionOrder, DemoConfig, LockOrderingDemo};
//! use std::time::Duration;
//!
//! let demo = LockOrderingDemo::new(DemoConfig {
//!     timeout: Duration::from_millis(500),
//!     ..DemoConfig::default()
//! });
//!
//! let report = demo.run(AcquisitionOrder::ReverseOrder);
//! if let Some(deadlock) = report.deadlock() {
//!     println!("{deadlock}");
//! }
//! ```

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod board;
mod demo;
mod error;
mod resource;
mod tracked_lock;

// -----------------------------------------------------------------------------
// Exports

pub use board::{DemoEvent, WorkerState};
pub use demo::{DemoConfig, DemoReport, LockOrderingDemo};
pub use error::{DeadlockDetected, WaitEdge};
pub use resource::{AcquisitionOrder, ResourceId, WorkerId};
pub use tracked_lock::{TrackedGuard, TrackedLock};
