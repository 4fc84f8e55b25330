//! Bounded blocking queues and a fixed-size worker pool.
//!
//! `workq` is a small concurrency toolkit around one idea: fair blocking
//! handoff. Its condition variable wakes waiters in strict arrival order,
//! its two queue flavors block producers and consumers on millisecond
//! budgets, and its pool runs a fixed set of workers over either queue.
//!
//! Everything is re-exported from [`workq-core`]; this crate adds the
//! submission policy layer. The pool itself never decides what happens to a
//! job it cannot take — [`FixedThreadPool::submit`] hands the job back in
//! [`Rejected`] — and [`CallerRunsExt::submit_or_run`] layers the classic
//! caller-runs fallback on top: when the queue is full, the submitting
//! thread runs the job itself, which throttles producers to the pool's pace
//! without dropping work.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use workq::{CallerRunsExt, ExecutorService, FixedThreadPoolBuilder, SubmitOutcome};
//!
//! let pool = FixedThreadPoolBuilder::new()
//!     .num_threads(4)
//!     .queue_capacity(32)
//!     .thread_name_format("workq-{}")
//!     .build()?;
//!
//! let done = Arc::new(AtomicUsize::new(0));
//! for _ in 0..1_000 {
//!     let done = Arc::clone(&done);
//!     let outcome = pool.submit_or_run(move || {
//!         done.fetch_add(1, Ordering::Relaxed);
//!     });
//!     assert_ne!(outcome, SubmitOutcome::Dropped);
//! }
//! pool.shutdown();
//! assert_eq!(done.load(Ordering::SeqCst), 1_000);
//! # Ok::<(), workq::BuildError>(())
//! ```
//!
//! Timeouts follow one dialect everywhere: `0` never blocks, [`FOREVER`]
//! blocks indefinitely, and a positive value is a deadline in milliseconds.
//!
//! [`workq-core`]: workq_core

pub use workq_core::{
    ArrayBlockingQueue, BlockingQueue, BuildError, Condition, CountDownLatch, ExecutorService,
    FixedThreadPool, FixedThreadPoolBuilder, Job, LinkedBlockingQueue, LockGuard, PanicHandler,
    Rejected, RejectedReason, ReentrantLock, Task, TaskQueueBuilder, ThreadLocal, FOREVER,
    NO_WAIT, UNBOUNDED,
};

/// A pool of `num_threads` workers over an unbounded linked task queue —
/// the everyday configuration. Zero threads means one per available CPU.
pub fn fixed_thread_pool(num_threads: usize) -> Result<FixedThreadPool, BuildError> {
    FixedThreadPoolBuilder::new().num_threads(num_threads).build()
}

/// How [`CallerRunsExt::submit_or_run`] disposed of a job.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SubmitOutcome {
    /// The pool took the job; a worker will run it.
    Enqueued,
    /// The queue was full; the submitting thread ran the job inline.
    RanInline,
    /// The pool is shut down; the job was dropped unrun.
    Dropped,
}

/// The caller-runs submission policy, for any executor.
///
/// Backpressure by conscription: a submitter that finds the queue full pays
/// for the overflow with its own time. Jobs are never silently lost while
/// the pool is running, and producers cannot outpace the pool indefinitely.
pub trait CallerRunsExt: ExecutorService {
    fn submit_or_run<F>(&self, job: F) -> SubmitOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        match self.execute(Box::new(job)) {
            Ok(()) => SubmitOutcome::Enqueued,
            Err(rejected) => match rejected.reason {
                RejectedReason::QueueFull => {
                    (rejected.job)();
                    SubmitOutcome::RanInline
                }
                RejectedReason::Shutdown => SubmitOutcome::Dropped,
            },
        }
    }
}

impl<E: ExecutorService + ?Sized> CallerRunsExt for E {}
