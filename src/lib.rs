//! Shared-memory concurrency building blocks.
//!
//! - [`os`] : Synchronization primitives, cancellable waits, the bounded
//!   producer/consumer buffer and the shared counter.
//! - [`task`] : A fixed-size worker pool fed by a FIFO intake queue.
//! - [`deadlock`] : A lock-ordering scenario with wait-for cycle detection.
//!
//! ```
//! use vc_sync::os::utils::BoundedBuffer;
//! use vc_sync::task::TaskPool;
//!
//! let buffer = std::sync::Arc::new(BoundedBuffer::new(5));
//! let pool = TaskPool::new(2);
//!
//! let producer = buffer.clone();
//! pool.execute(move || {
//!     for i in 1..=5 {
//!         producer.produce(i).unwrap();
//!     }
//! })
//! .unwrap()
//! .wait();
//!
//! let received: Vec<i32> = (0..5).map(|_| buffer.consume().unwrap()).collect();
//! assert_eq!(received, [1, 2, 3, 4, 5]);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use vc_deadlock as deadlock;
pub use vc_os as os;
pub use vc_task as task;
