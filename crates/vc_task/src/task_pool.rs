use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use std::io;
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, error, trace, warn};
use vc_os::sync::atomic::{AtomicU64, Ordering};
use vc_os::sync::{Arc, CancelToken, Condvar, Mutex, WaitPolicy, lock};
use vc_os::time::{Duration, Instant};
use vc_os::utils::{BoundedBuffer, ProduceError};

use crate::error::{ShutdownError, SubmitError};
use crate::task::{Task, TaskHandle, TaskId, TaskReport};

// -----------------------------------------------------------------------------
// OnDrop

struct CallOnDrop(Option<Arc<dyn Fn() + Send + Sync + 'static>>);

impl Drop for CallOnDrop {
    fn drop(&mut self) {
        if let Some(call) = self.0.as_ref() {
            call();
        }
    }
}

// -----------------------------------------------------------------------------
// TaskPoolBuilder

/// Builder for creating a [`TaskPool`].
///
/// Currently configurable parameters:
///
/// - [`thread_num`]: Number of worker threads to spawn, at least `1`.
///   Defaults to the number of logical cores on the system.
///
/// - [`thread_name`]: Thread name prefix. If set, threads are named in the format
///   `{thread_name} ({id})`, e.g., `computor (1)`. Default: `TaskPool ({id})`.
///
/// - [`stack_size`]: Stack size for worker threads. Default is system-dependent.
///
/// - [`queue_capacity`]: Number of tasks that may wait for a worker. Submitting
///   into a full queue blocks. Default: unbounded.
///
/// - [`on_thread_spawn`]: Callback executed once when each thread spawns.
///
/// - [`on_thread_destroy`]: Callback executed once when each thread is about to terminate.
///
/// # Examples
///
/// ```
/// use vc_task::{TaskId, TaskPoolBuilder};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let task_pool = TaskPoolBuilder::new()
///     .thread_num(2)
///     .thread_name(String::from("doc"))
///     .queue_capacity(8)
///     .build();
///
/// let result = Arc::new(AtomicU32::new(0));
///
/// for _ in 0..100 {
///     let result = result.clone();
///     task_pool
///         .execute(move || {
///             result.fetch_add(1, Ordering::AcqRel);
///         })
///         .unwrap();
/// }
///
/// task_pool.shutdown();
/// assert_eq!(result.load(Ordering::Acquire), 100);
/// ```
///
/// [`thread_num`]: Self::thread_num
/// [`thread_name`]: Self::thread_name
/// [`stack_size`]: Self::stack_size
/// [`queue_capacity`]: Self::queue_capacity
/// [`on_thread_spawn`]: Self::on_thread_spawn
/// [`on_thread_destroy`]: Self::on_thread_destroy
#[derive(Default)]
#[must_use]
pub struct TaskPoolBuilder {
    /// Number of threads. If `None`, uses logical core count.
    thread_num: Option<usize>,
    /// Custom stack size.
    stack_size: Option<usize>,
    /// Thread name prefix.
    thread_name: Option<String>,
    /// Intake queue capacity. If `None`, unbounded.
    queue_capacity: Option<usize>,
    /// Called on thread spawn.
    on_thread_spawn: Option<Arc<dyn Fn() + Send + Sync + 'static>>,
    /// Called on thread termination.
    on_thread_destroy: Option<Arc<dyn Fn() + Send + Sync + 'static>>,
}

impl TaskPoolBuilder {
    /// Creates a new [`TaskPoolBuilder`].
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            thread_num: None,
            stack_size: None,
            thread_name: None,
            queue_capacity: None,
            on_thread_spawn: None,
            on_thread_destroy: None,
        }
    }

    /// Sets the number of threads in the pool.
    ///
    /// If unset, defaults to the system's logical core count.
    ///
    /// # Panics
    ///
    /// [`build`](Self::build) panics if `thread_num` is `0`.
    #[inline]
    pub fn thread_num(mut self, thread_num: usize) -> Self {
        self.thread_num = Some(thread_num);
        self
    }

    /// Override the stack size of the threads created for the pool.
    #[inline]
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Sets the thread name prefix.
    ///
    /// Threads will be named `<thread_name> (<thread_index>)`, e.g., `MyThreadPool (2)`.
    #[inline]
    pub fn thread_name(mut self, thread_name: String) -> Self {
        self.thread_name = Some(thread_name);
        self
    }

    /// Bounds the number of tasks waiting for a worker.
    ///
    /// `0` makes every submit wait until a worker has picked the task up.
    #[inline]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Sets a callback invoked once per thread when it starts.
    ///
    /// Executed on the thread itself, before it takes its first task.
    #[inline]
    pub fn on_thread_spawn(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        let arc = Arc::new(f);

        self.on_thread_spawn = Some(arc);
        self
    }

    /// Sets a callback invoked once per thread when it terminates.
    ///
    /// Executed on the thread itself, after its last task.
    #[inline]
    pub fn on_thread_destroy(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        let arc = Arc::new(f);

        self.on_thread_destroy = Some(arc);
        self
    }

    /// Creates a [`TaskPool`] with the configured options.
    ///
    /// # Panics
    ///
    /// Panics if `thread_num` is `0` or if the OS refuses to spawn a thread.
    #[inline]
    pub fn build(self) -> TaskPool {
        self.try_build().expect("Failed to spawn thread.")
    }

    /// Creates a [`TaskPool`], returning the spawn error instead of panicking.
    ///
    /// Threads spawned before the failure are shut down again.
    ///
    /// # Panics
    ///
    /// Panics if `thread_num` is `0`.
    pub fn try_build(self) -> io::Result<TaskPool> {
        TaskPool::new_internal(self)
    }
}

// -----------------------------------------------------------------------------
// Shared

struct Job {
    task: Task,
    reply: async_channel::Sender<TaskReport>,
}

/// State shared by the pool handle and its workers.
struct Shared {
    intake: BoundedBuffer<Job>,
    /// Accepted tasks that have not reported yet.
    pending: Mutex<usize>,
    /// Notified whenever `pending` drops.
    drained: Condvar,
    /// Reports not yet handed out by `shutdown` or `take_reports`.
    reports: Mutex<Vec<TaskReport>>,
}

impl Shared {
    fn worker_loop(&self, name: &str) {
        debug!("{name} started");
        // `consume` only fails once the intake is closed and drained.
        while let Ok(job) = self.intake.consume() {
            self.run_job(job, name);
        }
        debug!("{name} stopped");
    }

    fn run_job(&self, job: Job, name: &str) {
        let Job { task, reply } = job;
        let id = task.id();

        let start = Instant::now();
        let outcome = task.run();
        let report = TaskReport {
            id,
            worker: String::from(name),
            outcome,
            elapsed: start.elapsed(),
        };

        match report.result() {
            Ok(()) => trace!("{id} running on thread {name} completed"),
            Err(failure) => warn!("{failure} (on thread {name})"),
        }

        lock(&self.reports).push(report.clone());
        // The handle may have been dropped; the log keeps a copy.
        let _ = reply.try_send(report);

        self.finish_one();
    }

    fn finish_one(&self) {
        let mut pending = lock(&self.pending);
        *pending -= 1;
        if *pending == 0 {
            self.drained.notify_all();
        }
    }
}

// -----------------------------------------------------------------------------
// TaskPool

/// A fixed set of worker threads fed by one FIFO intake queue.
///
/// Each submitted [`Task`] runs exactly once, on exactly one worker. Workers
/// take tasks in submission order; completion order depends on how long
/// each task runs. A task that returns an error or panics is reported as
/// failed and the worker moves on to the next one.
///
/// ---
///
/// # Functions
///
/// - [`submit`], [`submit_timeout`], [`submit_until`], [`execute`]: hand a
///   task over, receiving a [`TaskHandle`] for its [`TaskReport`].
/// - [`close`]: refuse new tasks; the accepted ones still run.
/// - [`shutdown`], [`shutdown_timeout`], [`shutdown_until`]: close, then wait
///   for every accepted task to report.
/// - [`reports`], [`take_reports`]: read or drain the log of reports not yet
///   handed out. Shutting down drains it too.
///
/// Dropping the pool closes it and joins the workers once the queue is
/// drained.
///
/// ## Examples
///
/// ```
/// use vc_task::{Task, TaskId, TaskPool};
///
/// let pool = TaskPool::new(2);
///
/// let handle = pool
///     .submit(Task::new(TaskId::new(1), || println!("Task 1 running")))
///     .unwrap();
///
/// let report = handle.wait().unwrap();
/// assert_eq!(report.id, TaskId::new(1));
/// assert!(report.worker.starts_with("TaskPool ("));
/// ```
///
/// [`submit`]: Self::submit
/// [`submit_timeout`]: Self::submit_timeout
/// [`submit_until`]: Self::submit_until
/// [`execute`]: Self::execute
/// [`close`]: Self::close
/// [`shutdown`]: Self::shutdown
/// [`shutdown_timeout`]: Self::shutdown_timeout
/// [`shutdown_until`]: Self::shutdown_until
/// [`reports`]: Self::reports
/// [`take_reports`]: Self::take_reports
pub struct TaskPool {
    shared: Arc<Shared>,
    /// Worker threads, emptied once they are joined.
    threads: Mutex<Vec<JoinHandle<()>>>,
    /// Ids of the worker threads, kept after they are joined.
    worker_ids: Box<[ThreadId]>,
    /// Source of ids for [`TaskPool::execute`].
    next_id: AtomicU64,
}

impl TaskPool {
    /// Creates a `TaskPool` with `thread_num` workers and an unbounded queue.
    ///
    /// # Panics
    ///
    /// Panics if `thread_num` is `0` or if a thread cannot be spawned.
    pub fn new(thread_num: usize) -> Self {
        TaskPoolBuilder::new().thread_num(thread_num).build()
    }

    fn new_internal(builder: TaskPoolBuilder) -> io::Result<Self> {
        // Set the number of threads based on Builder or available_parallelism.
        let thread_num = builder
            .thread_num
            .unwrap_or(vc_os::thread::available_parallelism().get());
        assert!(thread_num >= 1, "a task pool needs at least one worker thread");

        let intake = match builder.queue_capacity {
            Some(capacity) => BoundedBuffer::new(capacity),
            None => BoundedBuffer::unbounded(),
        };

        let shared = Arc::new(Shared {
            intake,
            pending: Mutex::new(0),
            drained: Condvar::new(),
            reports: Mutex::new(Vec::new()),
        });

        let mut threads = Vec::with_capacity(thread_num);

        for i in 0..thread_num {
            // Set thread name
            let thread_name = if let Some(thread_name) = builder.thread_name.as_deref() {
                format!("{thread_name} ({i})")
            } else {
                format!("TaskPool ({i})")
            };

            let mut thread_builder = thread::Builder::new().name(thread_name.clone());

            // Set thread stack size
            if let Some(stack_size) = builder.stack_size {
                thread_builder = thread_builder.stack_size(stack_size);
            }

            let worker_shared = Arc::clone(&shared);
            let on_thread_spawn = builder.on_thread_spawn.clone();
            let on_thread_destroy = builder.on_thread_destroy.clone();

            let spawned = thread_builder.spawn(move || {
                // Call `on_thread_spawn`
                if let Some(on_spawn) = on_thread_spawn {
                    on_spawn();
                }

                // Create a drop guard, call `on_thread_destroy` automatically.
                let _destructor = CallOnDrop(on_thread_destroy);

                worker_shared.worker_loop(&thread_name);
            });

            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    error!("failed to spawn task pool thread {i}: {err}");
                    shared.intake.close();
                    join_all(threads);
                    return Err(err);
                }
            }
        }

        debug!("task pool started with {thread_num} thread(s)");

        let worker_ids = threads.iter().map(|h| h.thread().id()).collect();

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
            worker_ids,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the number of worker threads in the pool.
    #[inline]
    pub fn thread_num(&self) -> usize {
        self.worker_ids.len()
    }

    /// Returns the number of accepted tasks that have not reported yet.
    #[inline]
    pub fn pending(&self) -> usize {
        *lock(&self.shared.pending)
    }

    /// Returns `true` once the pool refuses new tasks.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.intake.is_closed()
    }

    /// Returns the reports recorded since they were last handed out, in
    /// completion order.
    pub fn reports(&self) -> Vec<TaskReport> {
        lock(&self.shared.reports).clone()
    }

    /// Hands out the recorded reports and clears the log.
    ///
    /// The log grows by one report per task until it is drained here or by
    /// a shutdown. A long-lived pool whose callers read reports through
    /// [`TaskHandle`]s should drain it now and then.
    pub fn take_reports(&self) -> Vec<TaskReport> {
        core::mem::take(&mut *lock(&self.shared.reports))
    }

    /// Returns `true` if the calling thread is one of this pool's workers.
    #[inline]
    pub fn is_worker_thread(&self) -> bool {
        self.worker_ids.contains(&thread::current().id())
    }

    // -------------------------------------------------------------------------
    // submit

    /// Hands `task` to the pool, blocking while the intake queue is full.
    ///
    /// Only fails if the pool is closed.
    #[inline]
    pub fn submit(&self, task: Task) -> Result<TaskHandle, SubmitError> {
        self.submit_with(task, WaitPolicy::forever())
    }

    /// Hands `task` to the pool, waiting at most `timeout` for room.
    #[inline]
    pub fn submit_timeout(&self, task: Task, timeout: Duration) -> Result<TaskHandle, SubmitError> {
        self.submit_with(task, WaitPolicy::timeout(timeout))
    }

    /// Hands `task` to the pool, waiting for room until `token` is cancelled.
    #[inline]
    pub fn submit_until(&self, task: Task, token: &CancelToken) -> Result<TaskHandle, SubmitError> {
        self.submit_with(task, WaitPolicy::forever().with_cancel(token))
    }

    /// Submits `f` under a fresh [`TaskId`].
    ///
    /// Ids are handed out from `1` upwards, per pool.
    pub fn execute(&self, f: impl FnOnce() + Send + 'static) -> Result<TaskHandle, SubmitError> {
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.submit(Task::new(id, f))
    }

    /// Hands `task` to the pool, waiting for room as `policy` allows.
    ///
    /// On failure the task is returned inside the error, not run.
    pub fn submit_with(&self, task: Task, policy: WaitPolicy<'_>) -> Result<TaskHandle, SubmitError> {
        let id = task.id();
        let (reply, report) = async_channel::bounded(1);

        // Counted before it becomes visible, so a fast worker cannot
        // report it first.
        *lock(&self.shared.pending) += 1;

        match self.shared.intake.produce_with(Job { task, reply }, policy) {
            Ok(()) => {
                trace!("{id} submitted");
                Ok(TaskHandle { id, report })
            }
            Err(err) => {
                self.shared.finish_one();
                Err(match err {
                    ProduceError::Closed(job) => SubmitError::PoolClosed(job.task),
                    ProduceError::Full(job) | ProduceError::TimedOut(job) => {
                        SubmitError::TimedOut(job.task)
                    }
                    ProduceError::Cancelled(job) => SubmitError::Cancelled(job.task),
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // shutdown

    /// Stops accepting tasks. Accepted tasks still run.
    pub fn close(&self) {
        if !self.shared.intake.is_closed() {
            debug!("task pool closed with {} task(s) pending", self.pending());
        }
        self.shared.intake.close();
    }

    /// Closes the pool and waits until every accepted task has reported.
    ///
    /// Returns the reports not handed out yet, in completion order, and
    /// clears the log, so a second shutdown returns only what ran since.
    /// The workers are joined before this returns.
    ///
    /// # Panics
    ///
    /// Panics when called from a task running on this pool, since that task
    /// would wait for itself.
    pub fn shutdown(&self) -> Vec<TaskReport> {
        match self.shutdown_with(WaitPolicy::forever()) {
            Ok(reports) => reports,
            Err(_) => unreachable!("waiting forever without a token never gives up"),
        }
    }

    /// Like [`shutdown`](Self::shutdown), but gives up after `timeout`.
    #[inline]
    pub fn shutdown_timeout(&self, timeout: Duration) -> Result<Vec<TaskReport>, ShutdownError> {
        self.shutdown_with(WaitPolicy::timeout(timeout))
    }

    /// Like [`shutdown`](Self::shutdown), but gives up once `token` is cancelled.
    #[inline]
    pub fn shutdown_until(&self, token: &CancelToken) -> Result<Vec<TaskReport>, ShutdownError> {
        self.shutdown_with(WaitPolicy::forever().with_cancel(token))
    }

    /// Closes the pool and waits for the accepted tasks as `policy` allows.
    ///
    /// Giving up leaves the pool closed and draining; shutting down again
    /// continues the wait.
    pub fn shutdown_with(&self, policy: WaitPolicy<'_>) -> Result<Vec<TaskReport>, ShutdownError> {
        assert!(
            !self.is_worker_thread(),
            "task pool shut down from one of its own worker threads"
        );
        self.close();

        let pending = lock(&self.shared.pending);
        let (pending, waited) = policy.wait_while(&self.shared.drained, pending, |p| *p > 0);
        if let Err(err) = waited {
            return Err(ShutdownError::from_wait(err, *pending));
        }
        drop(pending);

        // The intake is closed and drained, so every worker is on its way out.
        let threads = core::mem::take(&mut *lock(&self.threads));
        if !threads.is_empty() {
            join_all(threads);
            debug!("task pool shut down");
        }

        Ok(self.take_reports())
    }
}

impl Default for TaskPool {
    /// One worker per logical core.
    #[inline]
    fn default() -> Self {
        TaskPoolBuilder::new().build()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shared.intake.close();

        let threads = core::mem::take(
            self.threads
                .get_mut()
                .unwrap_or_else(vc_os::sync::PoisonError::into_inner),
        );
        join_all(threads);
    }
}

impl fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPool")
            .field("thread_num", &self.thread_num())
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn join_all(threads: Vec<JoinHandle<()>>) {
    let panicking = thread::panicking();

    for join_handle in threads {
        let name = join_handle.thread().name().map(Box::<str>::from);
        if join_handle.join().is_err() && !panicking {
            error!("task pool thread {:?} panicked", name.as_deref().unwrap_or("<unnamed>"));
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
