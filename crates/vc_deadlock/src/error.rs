use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};

use thiserror::Error;

use crate::resource::{ResourceId, WorkerId};

/// One edge of a wait-for graph: `waiter` is blocked on `resource`, which
/// `holder` currently owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaitEdge {
    pub waiter: WorkerId,
    pub resource: ResourceId,
    pub holder: WorkerId,
}

impl fmt::Display for WaitEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} waits for {} held by {}", self.waiter, self.resource, self.holder)
    }
}

/// Workers blocked on each other in a cycle; none of them can proceed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("deadlock detected: {}", describe(.cycle))]
pub struct DeadlockDetected {
    cycle: Vec<WaitEdge>,
}

impl DeadlockDetected {
    pub(crate) fn new(cycle: Vec<WaitEdge>) -> Self {
        Self { cycle }
    }

    /// The edges of the cycle, starting from the lowest worker id. The holder
    /// of the last edge is the waiter of the first.
    #[inline]
    pub fn cycle(&self) -> &[WaitEdge] {
        &self.cycle
    }

    /// Returns `true` if `worker` is part of the cycle.
    pub fn involves(&self, worker: WorkerId) -> bool {
        self.cycle.iter().any(|edge| edge.waiter == worker)
    }
}

fn describe(cycle: &[WaitEdge]) -> String {
    let mut out = String::new();
    for (i, edge) in cycle.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{edge}");
    }
    out
}
