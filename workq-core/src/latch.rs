//! A one-shot gate on a decreasing count.
//!
//! Threads park in [`CountDownLatch::wait`] until other threads have called
//! [`CountDownLatch::count_down`] enough times to bring the count to zero.
//! Once zero, the latch stays open forever.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use workq_core::{CountDownLatch, FOREVER};
//!
//! let done = Arc::new(CountDownLatch::new(3));
//! for _ in 0..3 {
//!     let done = Arc::clone(&done);
//!     thread::spawn(move || {
//!         // ... do some work ...
//!         done.count_down();
//!     });
//! }
//! assert!(done.wait(FOREVER));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::condition::Condition;
use crate::lock::ReentrantLock;

pub struct CountDownLatch {
    lock: Arc<ReentrantLock>,
    reached_zero: Condition,
    count: AtomicUsize,
}

impl CountDownLatch {
    pub fn new(count: usize) -> CountDownLatch {
        let lock = Arc::new(ReentrantLock::new());
        CountDownLatch {
            reached_zero: Condition::new(Arc::clone(&lock)),
            lock,
            count: AtomicUsize::new(count),
        }
    }

    /// The current count. Zero means the gate is open.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Decrements the count by one; the 1 → 0 transition releases every
    /// waiter. Calls on an already-open latch do nothing.
    pub fn count_down(&self) {
        let mut current = self.count.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return;
            }
            match self.count.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    if current == 1 {
                        // Taking the lock orders this broadcast after any
                        // in-flight waiter has parked itself.
                        let guard = self.lock.lock();
                        self.reached_zero.signal_all(&guard);
                    }
                    return;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Blocks until the count reaches zero or the budget runs out. Returns
    /// `true` once the count is zero — immediately, without blocking, if it
    /// already is — and `false` on an expired budget.
    pub fn wait(&self, timeout_ms: i64) -> bool {
        let mut guard = self.lock.lock();
        let mut remaining = timeout_ms;
        while self.count.load(Ordering::SeqCst) != 0 {
            remaining = self.reached_zero.wait(&mut guard, remaining);
            if remaining == 0 {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("count", &self.count())
            .finish()
    }
}
