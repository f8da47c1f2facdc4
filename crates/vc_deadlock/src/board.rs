use alloc::vec::Vec;
use core::fmt;

use vc_os::sync::{CancelToken, Condvar, Mutex, WaitPolicy, lock};
use vc_os::time::{Duration, Instant};

use crate::error::{DeadlockDetected, WaitEdge};
use crate::resource::{ResourceId, WorkerId};
use crate::tracked_lock::TrackedLock;

// -----------------------------------------------------------------------------
// WorkerState

/// Progress of one worker through its two acquisitions.
///
/// States only move forward. A worker that gives up keeps the state it
/// reached, which is how a stalled run shows where it got stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkerState {
    Start,
    HoldingFirst,
    HoldingBoth,
    Done,
}

// -----------------------------------------------------------------------------
// DemoEvent

/// One step of the observed interleaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoEvent {
    Locked(WorkerId, ResourceId),
    Released(WorkerId, ResourceId),
    /// The acquisition was cancelled while blocked.
    GaveUp(WorkerId, ResourceId),
}

impl fmt::Display for DemoEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoEvent::Locked(w, r) => write!(f, "{w} locked {r}"),
            DemoEvent::Released(w, r) => write!(f, "{w} released {r}"),
            DemoEvent::GaveUp(w, r) => write!(f, "{w} gave up waiting for {r}"),
        }
    }
}

// -----------------------------------------------------------------------------
// Board

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: WorkerState,
    /// Set just before a blocking acquisition, cleared once it returns.
    waiting_for: Option<ResourceId>,
}

/// Where every worker stands, observable by the other worker and the runner.
pub(crate) struct Board {
    slots: Mutex<[Slot; 2]>,
    /// Notified on every change to `slots`.
    changed: Condvar,
    events: Mutex<Vec<DemoEvent>>,
}

impl Board {
    pub(crate) fn new() -> Self {
        let slot = Slot {
            state: WorkerState::Start,
            waiting_for: None,
        };
        Self {
            slots: Mutex::new([slot; 2]),
            changed: Condvar::new(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_waiting(&self, worker: WorkerId, resource: Option<ResourceId>) {
        lock(&self.slots)[worker.index()].waiting_for = resource;
        self.changed.notify_all();
    }

    pub(crate) fn advance(&self, worker: WorkerId, state: WorkerState) {
        let mut slots = lock(&self.slots);
        let slot = &mut slots[worker.index()];
        debug_assert!(slot.state <= state);
        slot.state = state;
        slot.waiting_for = None;
        drop(slots);
        self.changed.notify_all();
    }

    pub(crate) fn record(&self, event: DemoEvent) {
        lock(&self.events).push(event);
    }

    /// Pauses `worker`, which holds `held`, until the peer has taken its
    /// first resource or is blocked on `held`, or until `token` is cancelled.
    ///
    /// Once the pause ends the peer has committed to its first step, so the
    /// interleaving does not depend on thread start-up latency. Returns how
    /// long the pause took.
    pub(crate) fn pause(&self, worker: WorkerId, held: ResourceId, token: &CancelToken) -> Duration {
        let peer = worker.peer().index();
        let started = Instant::now();
        let policy = WaitPolicy::forever().with_cancel(token);
        let slots = lock(&self.slots);
        // Cancellation only means the pause is over.
        let _ = policy.wait_while(&self.changed, slots, |s| {
            s[peer].state == WorkerState::Start && s[peer].waiting_for != Some(held)
        });
        started.elapsed()
    }

    /// Waits for both workers to reach [`WorkerState::Done`]. Returns
    /// `false` if `policy` gave up first.
    pub(crate) fn wait_all_done(&self, policy: WaitPolicy<'_>) -> bool {
        let slots = lock(&self.slots);
        let (_slots, waited) = policy.wait_while(&self.changed, slots, |s| {
            s.iter().any(|slot| slot.state != WorkerState::Done)
        });
        waited.is_ok()
    }

    pub(crate) fn states(&self) -> [WorkerState; 2] {
        let slots = *lock(&self.slots);
        slots.map(|slot| slot.state)
    }

    pub(crate) fn events(&self) -> Vec<DemoEvent> {
        lock(&self.events).clone()
    }

    /// Builds the wait-for graph from the board and the lock holders and
    /// looks for a cycle.
    pub(crate) fn find_deadlock(&self, locks: &[TrackedLock; 2]) -> Option<DeadlockDetected> {
        let slots = *lock(&self.slots);
        let waiting_for = slots.map(|slot| slot.waiting_for);
        let holders = [locks[0].holder(), locks[1].holder()];
        find_cycle(&waiting_for, &holders)
    }
}

/// `waiting_for` is indexed by worker, `holders` by resource.
pub(crate) fn find_cycle(
    waiting_for: &[Option<ResourceId>; 2],
    holders: &[Option<WorkerId>; 2],
) -> Option<DeadlockDetected> {
    for start in WorkerId::ALL {
        let mut edges = Vec::new();
        let mut waiter = start;

        while edges.len() < WorkerId::ALL.len() {
            let Some(resource) = waiting_for[waiter.index()] else {
                break;
            };
            let Some(holder) = holders[resource.index()] else {
                break;
            };
            edges.push(WaitEdge { waiter, resource, holder });
            if holder == start {
                return Some(DeadlockDetected::new(edges));
            }
            waiter = holder;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use vc_os::sync::{CancelToken, WaitPolicy};

    use super::{Board, WorkerState, find_cycle};
    use crate::resource::{ResourceId::*, WorkerId::*};

    #[test]
    fn crossed_waits_form_a_cycle() {
        let found = find_cycle(&[Some(R2), Some(R1)], &[Some(A), Some(B)]).unwrap();
        assert_eq!(found.cycle().len(), 2);
        assert_eq!(found.cycle()[0].waiter, A);
        assert_eq!(found.cycle()[0].holder, B);
        assert_eq!(found.cycle()[1].waiter, B);
        assert_eq!(found.cycle()[1].holder, A);
    }

    #[test]
    fn chain_without_cycle() {
        // A waits for R1 held by B; B waits for nothing.
        assert!(find_cycle(&[Some(R1), None], &[Some(B), None]).is_none());
        // Both wait for the same free resource.
        assert!(find_cycle(&[Some(R1), Some(R1)], &[None, None]).is_none());
    }

    #[test]
    fn waiting_on_own_lock_is_a_cycle() {
        let found = find_cycle(&[None, Some(R2)], &[None, Some(B)]).unwrap();
        assert_eq!(found.cycle().len(), 1);
    }

    #[test]
    fn pause_ends_when_peer_moves() {
        let board = Board::new();
        let token = CancelToken::new();

        thread::scope(|s| {
            let start = Instant::now();
            let paused = s.spawn(|| board.pause(A, R1, &token));
            thread::sleep(Duration::from_millis(10));
            board.set_waiting(B, Some(R1));
            let took = paused.join().unwrap();
            assert!(took < Duration::from_secs(5));
            assert!(start.elapsed() < Duration::from_secs(5));
        });
    }

    #[test]
    fn pause_ends_immediately_once_peer_holds_a_resource() {
        let board = Board::new();
        let token = CancelToken::new();
        board.advance(B, WorkerState::HoldingFirst);
        assert!(board.pause(A, R1, &token) < Duration::from_secs(1));
    }

    #[test]
    fn pause_outlasts_any_delay_until_cancelled() {
        let board = Board::new();
        let token = CancelToken::new();

        thread::scope(|s| {
            let paused = s.spawn(|| board.pause(A, R1, &token));
            // The peer waits on a resource A does not hold, so nothing but
            // the token ends the pause.
            board.set_waiting(B, Some(R2));
            thread::sleep(Duration::from_millis(50));
            assert!(!paused.is_finished());

            token.cancel();
            assert!(paused.join().unwrap() < Duration::from_secs(5));
        });
    }

    #[test]
    fn done_waiting() {
        let board = Board::new();
        assert!(!board.wait_all_done(WaitPolicy::immediate()));

        board.advance(A, WorkerState::Done);
        board.advance(B, WorkerState::Done);
        assert!(board.wait_all_done(WaitPolicy::forever()));
        assert_eq!(board.states(), [WorkerState::Done; 2]);
    }
}
