//! A fixed-size pool of worker threads fed by one FIFO intake queue.
//!
//! ```
//! use vc_task::{Task, TaskId, TaskPool};
//!
//! let pool = TaskPool::new(2);
//!
//! for i in 1..=5 {
//!     pool.submit(Task::new(TaskId::new(i), move || {
//!         let _ = i * 2;
//!     }))
//!     .unwrap();
//! }
//!
//! let reports = pool.shutdown();
//! assert_eq!(reports.len(), 5);
//! assert!(reports.iter().all(|r| r.outcome.is_success()));
//! ```

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod task;
mod task_pool;

// -----------------------------------------------------------------------------
// Exports

pub use error::{ShutdownError, SubmitError, TaskFailure};
pub use task::{BoxedError, Task, TaskHandle, TaskId, TaskOutcome, TaskReport};
pub use task_pool::{TaskPool, TaskPoolBuilder};

// -----------------------------------------------------------------------------
// Re-Exports

pub use futures_lite;
