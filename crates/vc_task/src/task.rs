use alloc::boxed::Box;
use alloc::string::{String, ToString};
use core::any::Any;
use core::fmt;
use core::future::Future;
use core::panic::AssertUnwindSafe;

use vc_os::time::Duration;

use crate::error::TaskFailure;

/// The error type a fallible task may return.
pub type BoxedError = Box<dyn core::error::Error + Send + Sync + 'static>;

type Action = Box<dyn FnOnce() -> Result<(), BoxedError> + Send + 'static>;

// -----------------------------------------------------------------------------
// TaskId

/// Identifies a task in logs and reports.
///
/// Ids are chosen by the submitter and need not be unique, though reports are
/// much easier to read when they are. [`TaskPool::execute`] hands out fresh
/// ones.
///
/// [`TaskPool::execute`]: crate::TaskPool::execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task {}", self.0)
    }
}

// -----------------------------------------------------------------------------
// Task

/// A unit of work: an id plus an action that runs once.
///
/// The action owns everything it needs; the task carries no other state.
/// Ownership passes to the [`TaskPool`] on submit and the action is dropped
/// right after it ran.
///
/// [`TaskPool`]: crate::TaskPool
pub struct Task {
    id: TaskId,
    action: Action,
}

impl Task {
    /// A task that cannot fail, short of panicking.
    pub fn new(id: TaskId, f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            action: Box::new(move || {
                f();
                Ok(())
            }),
        }
    }

    /// A task whose error ends up in its [`TaskReport`].
    pub fn fallible<E>(id: TaskId, f: impl FnOnce() -> Result<(), E> + Send + 'static) -> Self
    where
        E: Into<BoxedError>,
    {
        Self {
            id,
            action: Box::new(move || f().map_err(Into::into)),
        }
    }

    /// A task that drives `future` to completion on the worker thread.
    ///
    /// The worker is blocked for the whole time the future is pending.
    pub fn from_future<F, E>(id: TaskId, future: F) -> Self
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxedError>,
    {
        Self {
            id,
            action: Box::new(move || futures_lite::future::block_on(future).map_err(Into::into)),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Runs the action, turning an error or a panic into a failed outcome.
    pub(crate) fn run(self) -> TaskOutcome {
        let action = self.action;
        match std::panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => TaskOutcome::Completed,
            Ok(Err(err)) => TaskOutcome::Failed(err.to_string()),
            Err(payload) => TaskOutcome::Panicked(panic_message(payload.as_ref())),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("Box<dyn Any>")
    }
}

// -----------------------------------------------------------------------------
// TaskReport

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The action returned normally.
    Completed,
    /// The action returned an error, rendered with `Display`.
    Failed(String),
    /// The action panicked; the panic message if it had one.
    Panicked(String),
}

impl TaskOutcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed)
    }
}

/// The record a worker leaves behind for every task it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: TaskId,
    /// Name of the worker thread that ran the task.
    pub worker: String,
    pub outcome: TaskOutcome,
    pub elapsed: Duration,
}

impl TaskReport {
    /// `Ok` for a completed task, otherwise the failure it reported.
    pub fn result(&self) -> Result<(), TaskFailure> {
        match &self.outcome {
            TaskOutcome::Completed => Ok(()),
            TaskOutcome::Failed(msg) => Err(TaskFailure::Failed(self.id, msg.clone())),
            TaskOutcome::Panicked(msg) => Err(TaskFailure::Panicked(self.id, msg.clone())),
        }
    }
}

// -----------------------------------------------------------------------------
// TaskHandle

/// Receives the [`TaskReport`] of one submitted task.
///
/// Dropping the handle does not cancel the task; it still runs and its
/// report still lands in [`TaskPool::reports`].
///
/// [`TaskPool::reports`]: crate::TaskPool::reports
#[must_use = "drop the handle explicitly if the report is not needed"]
#[derive(Debug)]
pub struct TaskHandle {
    pub(crate) id: TaskId,
    pub(crate) report: async_channel::Receiver<TaskReport>,
}

impl TaskHandle {
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task has run.
    ///
    /// Returns `None` only if the task was dropped without running, which the
    /// pool never does while it is alive.
    pub fn wait(&self) -> Option<TaskReport> {
        self.report.recv_blocking().ok()
    }

    /// Waits for the task to run, without blocking the executor.
    pub async fn report(&self) -> Option<TaskReport> {
        self.report.recv().await.ok()
    }

    /// Returns the report if the task has already run.
    pub fn try_report(&self) -> Option<TaskReport> {
        self.report.try_recv().ok()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::{Task, TaskId, TaskOutcome};

    #[test]
    fn outcome_of_each_kind() {
        let ok = Task::new(TaskId::new(1), || {});
        assert_eq!(ok.run(), TaskOutcome::Completed);

        let failed = Task::fallible(TaskId::new(2), || Err("disk on fire"));
        assert_eq!(failed.run(), TaskOutcome::Failed("disk on fire".to_string()));

        let panicked = Task::new(TaskId::new(3), || panic!("boom {}", 3));
        assert_eq!(panicked.run(), TaskOutcome::Panicked("boom 3".to_string()));
    }

    #[test]
    fn future_task_is_driven_to_completion() {
        let task = Task::from_future(TaskId::new(4), async {
            futures_lite::future::yield_now().await;
            Ok::<(), std::io::Error>(())
        });
        assert_eq!(task.id(), TaskId::new(4));
        assert!(task.run().is_success());
    }

    #[test]
    fn id_display() {
        assert_eq!(TaskId::new(7).to_string(), "Task 7");
    }

    #[test]
    fn is_send() {
        fn is_send<T: Send>() {}
        is_send::<Task>();
        is_send::<super::TaskHandle>();
    }
}
