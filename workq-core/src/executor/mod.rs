//! The fixed-size worker pool.
//!
//! A fixed set of workers consumes [`Task`]s from one shared
//! [`BlockingQueue`]. Submission is a non-blocking offer — the pool never
//! decides a rejection policy for the caller; it hands the job back inside
//! [`Rejected`] and lets the caller run it, retry it, or drop it. Shutdown
//! pushes one sentinel task per worker through the same queue, which
//! unblocks and retires each worker exactly once, then joins them all.


use std::any::Any;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::clock::{FOREVER, NO_WAIT};
use crate::log::{Event, Logger};
use crate::queue::BlockingQueue;
use crate::unwind;
use crate::{BuildError, ErrorKind, FixedThreadPoolBuilder};

/// A unit of work accepted by an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handler for a panic that escapes a submitted job; receives the panic
/// payload. Installed via
/// [`FixedThreadPoolBuilder::panic_handler`](crate::FixedThreadPoolBuilder::panic_handler).
pub type PanicHandler = dyn Fn(Box<dyn Any + Send>) + Send + Sync;

/// What flows through the pool's task queue: a job to run, or the shutdown
/// sentinel that retires the worker which dequeues it. Opaque on purpose —
/// external queue builders only need the type to name
/// `BlockingQueue<Task>`.
pub struct Task(TaskKind);

enum TaskKind {
    Run(Job),
    Shutdown,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            TaskKind::Run(_) => f.write_str("Task::Run"),
            TaskKind::Shutdown => f.write_str("Task::Shutdown"),
        }
    }
}

/// Why a job was not enqueued.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RejectedReason {
    /// The task queue was full at submission time.
    QueueFull,
    /// The executor has begun (or finished) shutting down.
    Shutdown,
}

/// A job the executor declined, handed back so the caller can apply its own
/// policy (run it inline, retry, drop it).
pub struct Rejected {
    pub job: Job,
    pub reason: RejectedReason,
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// The capability an executor exposes: accept work, stop accepting work.
pub trait ExecutorService: Send + Sync {
    /// Submits `job` without blocking. `Err` hands the job back with the
    /// reason it was declined.
    fn execute(&self, job: Job) -> Result<(), Rejected>;

    /// Stops accepting work, drains the queue, and joins every worker.
    /// Idempotent; concurrent calls race benignly and one of them does the
    /// joining.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

const RUNNING: usize = 0;
const SHUTDOWN: usize = 1;

/// State shared between the pool handle and its workers.
struct PoolShared {
    queue: Box<dyn BlockingQueue<Task>>,
    state: AtomicUsize,
    logger: Logger,
    panic_handler: Option<Box<PanicHandler>>,
}

impl PoolShared {
    fn handle_panic(&self, worker: usize, err: Box<dyn Any + Send>) {
        self.logger.log(|| Event::TaskPanicked { worker });
        match &self.panic_handler {
            Some(handler) => {
                // If the handler itself panics, abort.
                let abort_guard = unwind::AbortIfPanic;
                handler(err);
                mem::forget(abort_guard);
            }
            None => {
                // Default handler aborts.
                let _ = unwind::AbortIfPanic;
            }
        }
    }
}

/// A pool of `N` worker threads over one shared task queue.
///
/// Built through [`FixedThreadPoolBuilder`]. Dropping the pool shuts it
/// down first, so every accepted task runs before the handle goes away.
pub struct FixedThreadPool {
    shared: Arc<PoolShared>,
    /// Drained by whichever call performs the shutdown.
    workers: Mutex<Vec<JoinHandle<()>>>,
    thread_count: usize,
}

impl FixedThreadPool {
    /// A pool of `num_threads` workers over a linked task queue of
    /// `queue_capacity` slots. The builder offers the remaining knobs.
    pub fn new(num_threads: usize, queue_capacity: usize) -> Result<FixedThreadPool, BuildError> {
        FixedThreadPoolBuilder::new()
            .num_threads(num_threads)
            .queue_capacity(queue_capacity)
            .build()
    }

    pub(crate) fn build(builder: FixedThreadPoolBuilder) -> Result<FixedThreadPool, BuildError> {
        let (num_threads, queue_capacity, mut thread_name, queue_builder, panic_handler, stack_size) =
            builder.into_parts();
        let thread_count = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads
        };
        let queue = queue_builder(queue_capacity)?;

        let shared = Arc::new(PoolShared {
            queue,
            state: AtomicUsize::new(RUNNING),
            logger: Logger::new(),
            panic_handler,
        });
        let pool = FixedThreadPool {
            shared,
            workers: Mutex::new(Vec::with_capacity(thread_count)),
            thread_count,
        };

        for index in 0..thread_count {
            let mut builder = thread::Builder::new();
            if let Some(name) = thread_name.as_mut().map(|f| f(index)) {
                builder = builder.name(name);
            }
            if let Some(stack_size) = stack_size {
                builder = builder.stack_size(stack_size);
            }
            let shared = Arc::clone(&pool.shared);
            match builder.spawn(move || main_loop(&shared, index)) {
                Ok(handle) => pool.workers.lock().unwrap().push(handle),
                Err(error) => {
                    // Roll back: retire the workers that did start, then
                    // report the failure with no pool left behind.
                    pool.shutdown();
                    return Err(BuildError::new(ErrorKind::Spawn(error)));
                }
            }
        }

        Ok(pool)
    }

    /// Submits a closure; sugar over [`ExecutorService::execute`].
    pub fn submit<F>(&self, job: F) -> Result<(), Rejected>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute(Box::new(job))
    }

    /// Number of worker threads in the pool.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }
}

impl ExecutorService for FixedThreadPool {
    fn execute(&self, job: Job) -> Result<(), Rejected> {
        if self.is_shutdown() {
            return Err(Rejected {
                job,
                reason: RejectedReason::Shutdown,
            });
        }
        match self.shared.queue.offer(Task(TaskKind::Run(job)), NO_WAIT) {
            Ok(()) => {
                self.shared.logger.log(|| Event::TaskSubmitted);
                Ok(())
            }
            Err(Task(TaskKind::Run(job))) => {
                self.shared.logger.log(|| Event::TaskRejected);
                Err(Rejected {
                    job,
                    reason: RejectedReason::QueueFull,
                })
            }
            Err(Task(TaskKind::Shutdown)) => unreachable!("submitted task came back as a sentinel"),
        }
    }

    fn shutdown(&self) {
        if self
            .shared
            .state
            .compare_exchange(RUNNING, SHUTDOWN, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let mut workers = self.workers.lock().unwrap();
        self.shared.logger.log(|| Event::ShutdownBegin {
            workers: workers.len(),
        });

        // One sentinel per worker. The infinite offer always completes:
        // workers keep draining the queue until they meet their sentinel,
        // and sentinels never block other sentinels.
        for _ in 0..workers.len() {
            let offered = self.shared.queue.offer(Task(TaskKind::Shutdown), FOREVER);
            debug_assert!(offered.is_ok());
        }
        for worker in workers.drain(..) {
            // A worker that panicked already tripped the abort guard, so
            // join errors cannot reach this point.
            let _ = worker.join();
        }
        self.shared.logger.log(|| Event::Flush);
    }

    fn is_shutdown(&self) -> bool {
        self.shared.state.load(Ordering::SeqCst) == SHUTDOWN
    }
}

impl Drop for FixedThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for FixedThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedThreadPool")
            .field("thread_count", &self.thread_count)
            .field("queued", &self.shared.queue.len())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}

/// Worker body: drain the queue until the shutdown sentinel arrives.
fn main_loop(shared: &PoolShared, index: usize) {
    shared.logger.log(|| Event::WorkerStart { worker: index });

    loop {
        // Queue operations are pool plumbing; a panic inside one would leave
        // siblings blocked forever, so escalate it to an abort.
        let task = {
            let abort_guard = unwind::AbortIfPanic;
            let task = shared.queue.poll(FOREVER);
            mem::forget(abort_guard);
            task
        };
        let task = match task {
            Some(task) => task,
            // An infinite poll only yields once it has an item, but a retry
            // costs nothing and keeps the loop honest about its contract.
            None => continue,
        };
        match task.0 {
            TaskKind::Shutdown => break,
            TaskKind::Run(job) => {
                shared.logger.log(|| Event::TaskExecute { worker: index });
                match unwind::halt_unwinding(job) {
                    Ok(()) => {}
                    Err(payload) => shared.handle_panic(index, payload),
                }
            }
        }
    }

    shared.logger.log(|| Event::WorkerTerminate { worker: index });
}
