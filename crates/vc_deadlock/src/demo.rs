use alloc::vec::Vec;
use std::thread;

use log::{debug, info, warn};
use vc_os::sync::{Barrier, CancelToken, Deadline, WaitPolicy};
use vc_os::time::{Duration, Instant};

use crate::board::{Board, DemoEvent, WorkerState};
use crate::error::DeadlockDetected;
use crate::resource::{AcquisitionOrder, ResourceId, WorkerId};
use crate::tracked_lock::{TrackedGuard, TrackedLock};

// -----------------------------------------------------------------------------
// DemoConfig

/// Timing of a [`LockOrderingDemo`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoConfig {
    /// How long the runner waits for both workers before it looks for a
    /// deadlock and cancels them.
    pub timeout: Duration,
    /// Expected length of the pause a worker takes while holding its first
    /// resource. The pause itself ends on the peer's progress or on
    /// cancellation; a pause longer than this is logged.
    pub hold_delay: Duration,
}

impl Default for DemoConfig {
    #[inline]
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            hold_delay: Duration::from_millis(100),
        }
    }
}

// -----------------------------------------------------------------------------
// DemoReport

/// What a [`LockOrderingDemo`] run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    order: AcquisitionOrder,
    states: [WorkerState; 2],
    deadlock: Option<DeadlockDetected>,
    events: Vec<DemoEvent>,
    elapsed: Duration,
}

impl DemoReport {
    /// The order worker B used. Worker A always uses
    /// [`AcquisitionOrder::FixedOrder`].
    #[inline]
    pub fn order(&self) -> AcquisitionOrder {
        self.order
    }

    /// The last state `worker` reached.
    #[inline]
    pub fn state(&self, worker: WorkerId) -> WorkerState {
        self.states[worker.index()]
    }

    #[inline]
    pub fn states(&self) -> [WorkerState; 2] {
        self.states
    }

    /// Returns `true` if both workers finished.
    pub fn completed(&self) -> bool {
        self.states.iter().all(|s| *s == WorkerState::Done)
    }

    /// The cycle found when the run timed out, if any.
    #[inline]
    pub fn deadlock(&self) -> Option<&DeadlockDetected> {
        self.deadlock.as_ref()
    }

    /// Every lock, release and abandoned wait, in the order they happened.
    #[inline]
    pub fn events(&self) -> &[DemoEvent] {
        &self.events
    }

    /// Wall time of the run, including the wait for a stalled run to time out.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

// -----------------------------------------------------------------------------
// LockOrderingDemo

/// Two workers compete for two exclusive resources, `R1` and `R2`.
///
/// Worker A takes `R1`, then `R2`. Worker B takes them in the order under
/// test. Each pauses while holding its first resource, so with opposite
/// orders both end up holding one resource and waiting for the other.
///
/// A run never hangs: after [`DemoConfig::timeout`] the runner inspects who
/// holds and who waits for what, reports a wait-for cycle if there is one,
/// and cancels the workers so they let go of their locks.
///
/// # Examples
///
/// ```
/// use vc_deadlock::{LockOrderingDemo, WorkerId, WorkerState};
///
/// let demo = LockOrderingDemo::default();
///
/// let ordered = demo.run_ordered();
/// assert!(ordered.completed());
///
/// let hazardous = demo.run_hazardous();
/// assert!(!hazardous.completed());
/// assert!(hazardous.deadlock().is_some());
/// assert_eq!(hazardous.state(WorkerId::A), WorkerState::HoldingFirst);
/// assert_eq!(hazardous.state(WorkerId::B), WorkerState::HoldingFirst);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LockOrderingDemo {
    config: DemoConfig,
}

impl LockOrderingDemo {
    #[inline]
    pub const fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// Runs with opposite acquisition orders. Deadlocks.
    #[inline]
    pub fn run_hazardous(&self) -> DemoReport {
        self.run(AcquisitionOrder::ReverseOrder)
    }

    /// Runs with one global acquisition order. Completes.
    #[inline]
    pub fn run_ordered(&self) -> DemoReport {
        self.run(AcquisitionOrder::FixedOrder)
    }

    /// Runs worker A with [`AcquisitionOrder::FixedOrder`] and worker B with
    /// `order`.
    pub fn run(&self, order: AcquisitionOrder) -> DemoReport {
        let locks = [TrackedLock::new(ResourceId::R1), TrackedLock::new(ResourceId::R2)];
        let board = Board::new();
        let token = CancelToken::new();
        let start_line = Barrier::new(WorkerId::ALL.len());

        let worker = Worker {
            locks: &locks,
            board: &board,
            token: &token,
            hold_delay: self.config.hold_delay,
        };

        let started = Instant::now();
        let deadline = Deadline::after(self.config.timeout);

        let deadlock = thread::scope(|s| {
            for (id, order) in [(WorkerId::A, AcquisitionOrder::FixedOrder), (WorkerId::B, order)] {
                let start_line = &start_line;
                s.spawn(move || {
                    start_line.wait();
                    worker.run(id, order);
                });
            }

            if board.wait_all_done(WaitPolicy::until(deadline)) {
                return None;
            }

            let detected = board.find_deadlock(&locks);
            match &detected {
                Some(deadlock) => warn!("{deadlock}"),
                None => warn!("workers still running after {:?}", self.config.timeout),
            }
            token.cancel();
            detected
        });

        let report = DemoReport {
            order,
            states: board.states(),
            deadlock,
            events: board.events(),
            elapsed: started.elapsed(),
        };
        debug!("lock ordering demo with {order:?} finished: {:?}", report.states);
        report
    }
}

// -----------------------------------------------------------------------------
// Worker

#[derive(Clone, Copy)]
struct Worker<'a> {
    locks: &'a [TrackedLock; 2],
    board: &'a Board,
    token: &'a CancelToken,
    hold_delay: Duration,
}

impl<'a> Worker<'a> {
    fn run(self, me: WorkerId, order: AcquisitionOrder) {
        let [first, second] = order.sequence();

        let Some(first_guard) = self.take(me, first) else {
            return;
        };
        self.board.advance(me, WorkerState::HoldingFirst);
        let paused = self.board.pause(me, first, self.token);
        if paused > self.hold_delay {
            debug!("{me} held {first} for {paused:?} waiting for {}", me.peer());
        }

        let Some(second_guard) = self.take(me, second) else {
            self.release(first_guard);
            return;
        };
        self.board.advance(me, WorkerState::HoldingBoth);

        self.release(second_guard);
        self.release(first_guard);
        self.board.advance(me, WorkerState::Done);
    }

    fn take(self, me: WorkerId, resource: ResourceId) -> Option<TrackedGuard<'a>> {
        let policy = WaitPolicy::forever().with_cancel(self.token);

        self.board.set_waiting(me, Some(resource));
        match self.locks[resource.index()].acquire(me, policy) {
            // A lock freed by a cancelled peer is not progress.
            Ok(guard) if self.token.is_cancelled() => {
                drop(guard);
                debug!("{me} got {resource} after cancellation, letting go");
                self.board.set_waiting(me, None);
                self.board.record(DemoEvent::GaveUp(me, resource));
                None
            }
            Ok(guard) => {
                info!("{me} locked {resource}");
                self.board.record(DemoEvent::Locked(me, resource));
                Some(guard)
            }
            Err(err) => {
                debug!("{me} stopped waiting for {resource}: {err}");
                self.board.set_waiting(me, None);
                self.board.record(DemoEvent::GaveUp(me, resource));
                None
            }
        }
    }

    fn release(self, guard: TrackedGuard<'a>) {
        self.board
            .record(DemoEvent::Released(guard.worker(), guard.resource()));
        drop(guard);
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DemoConfig, LockOrderingDemo};
    use crate::board::{DemoEvent, WorkerState};
    use crate::resource::{AcquisitionOrder, ResourceId::*, WorkerId::*};

    fn quick() -> LockOrderingDemo {
        LockOrderingDemo::new(DemoConfig {
            timeout: Duration::from_millis(500),
            hold_delay: Duration::from_millis(100),
        })
    }

    #[test]
    fn default_config() {
        let config = DemoConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.hold_delay, Duration::from_millis(100));
    }

    #[test]
    fn hazardous_run_deadlocks() {
        let report = quick().run_hazardous();

        assert_eq!(report.order(), AcquisitionOrder::ReverseOrder);
        assert!(!report.completed());
        assert_eq!(report.states(), [WorkerState::HoldingFirst; 2]);

        let deadlock = report.deadlock().unwrap();
        assert!(deadlock.involves(A));
        assert!(deadlock.involves(B));
        assert_eq!(deadlock.cycle()[0].resource, R2);
        assert_eq!(deadlock.cycle()[1].resource, R1);

        // Both first locks happen before either worker gives up.
        let events = report.events();
        assert!(events[..2].contains(&DemoEvent::Locked(A, R1)));
        assert!(events[..2].contains(&DemoEvent::Locked(B, R2)));
        assert!(events.contains(&DemoEvent::GaveUp(A, R2)));
        assert!(events.contains(&DemoEvent::GaveUp(B, R1)));
        assert!(report.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn ordered_run_completes() {
        let report = quick().run_ordered();

        assert!(report.completed());
        assert!(report.deadlock().is_none());
        assert_eq!(report.state(A), WorkerState::Done);
        assert_eq!(report.state(B), WorkerState::Done);

        let locked = report
            .events()
            .iter()
            .filter(|e| matches!(e, DemoEvent::Locked(..)))
            .count();
        assert_eq!(locked, 4);
        assert!(report.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn stalled_run_never_hangs() {
        let demo = LockOrderingDemo::new(DemoConfig {
            timeout: Duration::from_millis(50),
            hold_delay: Duration::from_millis(10),
        });
        for _ in 0..5 {
            let report = demo.run(AcquisitionOrder::ReverseOrder);
            assert!(!report.completed());
            assert!(report.deadlock().is_some());
            assert!(report.elapsed() < Duration::from_secs(2));
        }
    }

    #[test]
    fn cancelled_workers_never_reach_both_resources() {
        let demo = LockOrderingDemo::new(DemoConfig {
            timeout: Duration::from_millis(200),
            hold_delay: Duration::from_millis(10),
        });
        for _ in 0..5 {
            let report = demo.run_hazardous();
            assert!(
                report.states().iter().all(|s| *s < WorkerState::HoldingBoth),
                "{:?}",
                report.states()
            );
            assert!(!report.completed());
            assert!(report.deadlock().is_some());

            // Each worker locks exactly its first resource and gives up on the other.
            let locked = report
                .events()
                .iter()
                .filter(|e| matches!(e, DemoEvent::Locked(..)))
                .count();
            assert_eq!(locked, 2);
            assert!(report.events().contains(&DemoEvent::GaveUp(A, R2)));
            assert!(report.events().contains(&DemoEvent::GaveUp(B, R1)));
        }
    }

    #[test]
    fn hold_delay_does_not_end_the_pause() {
        // A delay far shorter than the timeout still deadlocks every time.
        let demo = LockOrderingDemo::new(DemoConfig {
            timeout: Duration::from_millis(100),
            hold_delay: Duration::ZERO,
        });
        let report = demo.run_hazardous();
        assert_eq!(report.states(), [WorkerState::HoldingFirst; 2]);
        assert!(report.deadlock().is_some());
    }
}
