//! Core primitives for `workq`: bounded blocking queues and the fixed
//! worker pool, plus the synchronization pieces they are built from.
//!
//! The layering, leaves first:
//!
//! * [`ReentrantLock`] — recursive mutual exclusion with an RAII guard.
//! * [`Condition`] — a condition variable over an explicit FIFO wait list,
//!   so wakeups happen in arrival order and a signal wakes exactly one
//!   thread.
//! * [`ThreadLocal`] — runtime-created per-thread storage (the condition
//!   caches its waiter nodes in one).
//! * [`CountDownLatch`] — a one-shot gate on a decreasing count.
//! * [`BlockingQueue`] — the offer/poll contract, implemented by
//!   [`ArrayBlockingQueue`] (one lock, ring buffer) and
//!   [`LinkedBlockingQueue`] (two locks, linked nodes, optionally
//!   unbounded).
//! * [`FixedThreadPool`] — N workers over one task queue, configured
//!   through [`FixedThreadPoolBuilder`].
//!
//! Every blocking call takes a millisecond budget: `0` never blocks,
//! [`FOREVER`] blocks indefinitely, a positive value is a deadline. See the
//! `workq` facade crate for the caller-runs submission policy.
//!
//! ```
//! use std::sync::Arc;
//! use workq_core::{CountDownLatch, FixedThreadPool, FOREVER};
//!
//! let pool = FixedThreadPool::new(2, 64)?;
//! let latch = Arc::new(CountDownLatch::new(10));
//! for _ in 0..10 {
//!     let latch = Arc::clone(&latch);
//!     pool.submit(move || latch.count_down()).unwrap();
//! }
//! assert!(latch.wait(FOREVER));
//! # Ok::<(), workq_core::BuildError>(())
//! ```

mod clock;
mod condition;
mod executor;
mod latch;
mod lock;
mod log;
mod queue;
mod thread_local;
mod unwind;

pub use crate::clock::{FOREVER, NO_WAIT};
pub use crate::condition::Condition;
pub use crate::executor::{
    ExecutorService, FixedThreadPool, Job, PanicHandler, Rejected, RejectedReason, Task,
};
pub use crate::latch::CountDownLatch;
pub use crate::lock::{LockGuard, ReentrantLock};
pub use crate::queue::{ArrayBlockingQueue, BlockingQueue, LinkedBlockingQueue, UNBOUNDED};
pub use crate::thread_local::ThreadLocal;

use std::error::Error;
use std::fmt;
use std::io;

type ThreadNameFn = Box<dyn FnMut(usize) -> String>;

/// Builds the pool's task queue from the configured capacity.
pub type TaskQueueBuilder =
    Box<dyn FnOnce(usize) -> Result<Box<dyn BlockingQueue<Task>>, BuildError>>;

/// Error during construction of a queue or pool.
///
/// Construction either fully succeeds or returns this with no partial state
/// behind it; there is nothing to clean up on the error path.
pub struct BuildError {
    kind: ErrorKind,
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    /// Capacity of zero makes every offer fail; rejected up front.
    ZeroCapacity,
    /// The array queue is bounded only.
    UnboundedCapacity,
    /// The OS refused to spawn a worker thread.
    Spawn(io::Error),
}

impl BuildError {
    pub(crate) fn new(kind: ErrorKind) -> BuildError {
        BuildError { kind }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ZeroCapacity => f.write_str("queue capacity must be at least one"),
            ErrorKind::UnboundedCapacity => {
                f.write_str("the array queue does not support unbounded capacity")
            }
            ErrorKind::Spawn(error) => write!(f, "failed to spawn a worker thread: {error}"),
        }
    }
}

impl fmt::Debug for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind, f)
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ErrorKind::Spawn(error) => Some(error),
            _ => None,
        }
    }
}

/// Configures and builds a [`FixedThreadPool`].
///
/// ```
/// use workq_core::{ArrayBlockingQueue, BlockingQueue, FixedThreadPoolBuilder};
///
/// let pool = FixedThreadPoolBuilder::new()
///     .num_threads(4)
///     .queue_capacity(128)
///     .thread_name_format("crunch-{}")
///     .task_queue(|capacity| {
///         Ok(Box::new(ArrayBlockingQueue::new(capacity)?) as Box<dyn BlockingQueue<_>>)
///     })
///     .build()?;
/// pool.submit(|| println!("hello from the pool")).unwrap();
/// # Ok::<(), workq_core::BuildError>(())
/// ```
pub struct FixedThreadPoolBuilder {
    /// Zero means "pick a default": one worker per available CPU.
    num_threads: usize,
    queue_capacity: usize,
    thread_name: Option<ThreadNameFn>,
    queue: Option<TaskQueueBuilder>,
    panic_handler: Option<Box<PanicHandler>>,
    stack_size: Option<usize>,
}

impl FixedThreadPoolBuilder {
    pub fn new() -> FixedThreadPoolBuilder {
        FixedThreadPoolBuilder {
            num_threads: 0,
            queue_capacity: UNBOUNDED,
            thread_name: None,
            queue: None,
            panic_handler: None,
            stack_size: None,
        }
    }

    /// Number of worker threads. Zero (the default) means one per available
    /// CPU.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Capacity handed to the task-queue builder. Defaults to [`UNBOUNDED`],
    /// which the default linked queue accepts.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Names each worker thread from its index.
    pub fn thread_name<F>(mut self, name: F) -> Self
    where
        F: FnMut(usize) -> String + 'static,
    {
        self.thread_name = Some(Box::new(name));
        self
    }

    /// Names worker threads from a format string: a `{}` is replaced by the
    /// worker index, a string without one is used verbatim for every worker.
    pub fn thread_name_format(self, format: &str) -> Self {
        let format = format.to_owned();
        if format.contains("{}") {
            self.thread_name(move |index| format.replacen("{}", &index.to_string(), 1))
        } else {
            self.thread_name(move |_| format.clone())
        }
    }

    /// Supplies the task queue. The closure receives the configured capacity
    /// and decides the variant; the default builds a [`LinkedBlockingQueue`].
    pub fn task_queue<F>(mut self, build: F) -> Self
    where
        F: FnOnce(usize) -> Result<Box<dyn BlockingQueue<Task>>, BuildError> + 'static,
    {
        self.queue = Some(Box::new(build));
        self
    }

    /// Uses an [`ArrayBlockingQueue`] as the task queue; the configured
    /// capacity must then be bounded.
    pub fn array_task_queue(self) -> Self {
        self.task_queue(|capacity| {
            Ok(Box::new(ArrayBlockingQueue::new(capacity)?) as Box<dyn BlockingQueue<Task>>)
        })
    }

    /// Called with the payload of any panic that escapes a submitted job.
    /// Without one, such a panic aborts the process.
    pub fn panic_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(Box<dyn std::any::Any + Send>) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Box::new(handler));
        self
    }

    /// Stack size for each worker thread, in bytes.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn build(self) -> Result<FixedThreadPool, BuildError> {
        FixedThreadPool::build(self)
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn into_parts(
        self,
    ) -> (
        usize,
        usize,
        Option<ThreadNameFn>,
        TaskQueueBuilder,
        Option<Box<PanicHandler>>,
        Option<usize>,
    ) {
        let queue = self.queue.unwrap_or_else(|| {
            Box::new(|capacity| {
                Ok(Box::new(LinkedBlockingQueue::new(capacity)?) as Box<dyn BlockingQueue<Task>>)
            })
        });
        (
            self.num_threads,
            self.queue_capacity,
            self.thread_name,
            queue,
            self.panic_handler,
            self.stack_size,
        )
    }
}

impl Default for FixedThreadPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FixedThreadPoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedThreadPoolBuilder")
            .field("num_threads", &self.num_threads)
            .field("queue_capacity", &self.queue_capacity)
            .field("stack_size", &self.stack_size)
            .finish_non_exhaustive()
    }
}
