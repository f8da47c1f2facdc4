use alloc::string::String;

use thiserror::Error;
use vc_os::sync::WaitError;

use crate::task::{Task, TaskId};

/// The task was not accepted. The task is handed back untouched.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("task pool is closed, rejected {}", .0.id())]
    PoolClosed(Task),
    #[error("timed out while submitting {}", .0.id())]
    TimedOut(Task),
    #[error("submitting {} was cancelled", .0.id())]
    Cancelled(Task),
}

impl SubmitError {
    pub(crate) fn from_wait(err: WaitError, task: Task) -> Self {
        match err {
            WaitError::TimedOut => SubmitError::TimedOut(task),
            WaitError::Cancelled => SubmitError::Cancelled(task),
        }
    }

    /// Takes back the task that was not accepted.
    pub fn into_task(self) -> Task {
        match self {
            SubmitError::PoolClosed(task)
            | SubmitError::TimedOut(task)
            | SubmitError::Cancelled(task) => task,
        }
    }
}

/// A bounded shutdown gave up before every accepted task had reported.
///
/// The pool is closed either way and keeps draining, so shutting down again
/// picks up where this one stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("timed out during shutdown with {pending} task(s) still pending")]
    TimedOut { pending: usize },
    #[error("shutdown was cancelled with {pending} task(s) still pending")]
    Cancelled { pending: usize },
}

impl ShutdownError {
    pub(crate) fn from_wait(err: WaitError, pending: usize) -> Self {
        match err {
            WaitError::TimedOut => ShutdownError::TimedOut { pending },
            WaitError::Cancelled => ShutdownError::Cancelled { pending },
        }
    }

    /// Number of accepted tasks that had not reported yet.
    pub fn pending(&self) -> usize {
        match *self {
            ShutdownError::TimedOut { pending } | ShutdownError::Cancelled { pending } => pending,
        }
    }
}

/// A task that ran but did not complete normally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("{0} failed: {1}")]
    Failed(TaskId, String),
    #[error("{0} panicked: {1}")]
    Panicked(TaskId, String),
}

impl TaskFailure {
    pub fn id(&self) -> TaskId {
        match self {
            TaskFailure::Failed(id, _) | TaskFailure::Panicked(id, _) => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::string::ToString;

    use super::{ShutdownError, SubmitError, TaskFailure};
    use crate::task::{Task, TaskId};

    #[test]
    fn messages() {
        let err = SubmitError::PoolClosed(Task::new(TaskId::new(3), || {}));
        assert_eq!(err.to_string(), "task pool is closed, rejected Task 3");
        assert_eq!(err.into_task().id(), TaskId::new(3));

        let err = ShutdownError::TimedOut { pending: 2 };
        assert_eq!(
            err.to_string(),
            "timed out during shutdown with 2 task(s) still pending"
        );
        assert_eq!(err.pending(), 2);

        let err = TaskFailure::Panicked(TaskId::new(1), "boom".to_string());
        assert_eq!(err.to_string(), "Task 1 panicked: boom");
    }
}
