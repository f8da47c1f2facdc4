use core::fmt;

use vc_os::sync::{Condvar, Mutex, WaitError, WaitPolicy, lock};

use crate::resource::{ResourceId, WorkerId};

/// An exclusive lock that knows who holds it.
///
/// A plain mutex cannot be inspected while it is held, so this lock keeps
/// its owner in an `Option<WorkerId>` guarded by a mutex, with one condvar
/// signalled on release. That makes the wait-for graph observable from the
/// outside, and lets a blocked acquisition give up through a [`WaitPolicy`].
pub struct TrackedLock {
    id: ResourceId,
    holder: Mutex<Option<WorkerId>>,
    released: Condvar,
}

impl TrackedLock {
    pub const fn new(id: ResourceId) -> Self {
        Self {
            id,
            holder: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Returns the current holder, if any.
    #[inline]
    pub fn holder(&self) -> Option<WorkerId> {
        *lock(&self.holder)
    }

    /// Takes the lock for `worker`, waiting as `policy` allows.
    ///
    /// The lock is not re-entrant: a worker acquiring a lock it already
    /// holds waits on itself.
    pub fn acquire(
        &self,
        worker: WorkerId,
        policy: WaitPolicy<'_>,
    ) -> Result<TrackedGuard<'_>, WaitError> {
        let holder = lock(&self.holder);
        let (mut holder, waited) = policy.wait_while(&self.released, holder, |h| h.is_some());
        waited?;

        *holder = Some(worker);
        Ok(TrackedGuard { lock: self, worker })
    }
}

impl fmt::Debug for TrackedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedLock")
            .field("id", &self.id)
            .field("holder", &self.holder())
            .finish()
    }
}

/// Releases a [`TrackedLock`] when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct TrackedGuard<'a> {
    lock: &'a TrackedLock,
    worker: WorkerId,
}

impl TrackedGuard<'_> {
    #[inline]
    pub fn resource(&self) -> ResourceId {
        self.lock.id
    }

    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }
}

impl Drop for TrackedGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.lock.holder) = None;
        self.lock.released.notify_one();
    }
}

impl fmt::Debug for TrackedGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedGuard")
            .field("resource", &self.lock.id)
            .field("worker", &self.worker)
            .finish()
    }
}
