//! Provide atomic types
//!
//! Every supported target has native atomics up to 64 bits, so this is a
//! straight re-export of `core::sync::atomic`.
//!
//! See the [standard library] for further details.
//!
//! [standard library]: https://doc.rust-lang.org/core/sync/atomic

pub use core::sync::atomic::{AtomicBool, AtomicI8, AtomicU8};
pub use core::sync::atomic::{AtomicI16, AtomicU16};
pub use core::sync::atomic::{AtomicI32, AtomicU32};
pub use core::sync::atomic::{AtomicI64, AtomicU64};
pub use core::sync::atomic::{AtomicIsize, AtomicPtr, AtomicUsize};
pub use core::sync::atomic::{Ordering, compiler_fence, fence};

#[cfg(not(target_has_atomic = "64"))]
compile_error!("Platforms without 64-bit atomics are currently not supported.");
