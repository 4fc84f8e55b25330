//! A condition variable with FIFO wakeups, bound to a [`ReentrantLock`].
//!
//! An OS condition variable makes no promise about which waiter a signal
//! wakes. This one does: waiters are kept in an explicit arrival-ordered
//! list, and every waiter sleeps on a private one-slot condvar of its own,
//! so [`Condition::signal`] wakes exactly the earliest waiter — no herd, no
//! reordering.
//!
//! Every operation takes the bound lock's [`LockGuard`], which turns the
//! usual "caller must hold the lock" footnote into a compile-time fact.
//! Passing a guard from some other lock panics, the same contract
//! `std::sync::Condvar` enforces for mixed mutexes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::clock;
use crate::lock::{LockGuard, ReentrantLock};
use crate::thread_local::ThreadLocal;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum WaitState {
    /// In the list, its thread asleep (or about to be).
    Waiting,
    /// Removed from the list by a signal; its thread is being woken.
    Notified,
    /// The wait is over; the node is free for the owning thread to reuse.
    Invalid,
}

/// One suspended thread. The node's own mutex/condvar pair holds at most one
/// sleeper, so notifying it cannot wake anybody else.
struct WaitNode {
    state: Mutex<WaitState>,
    wake: Condvar,
}

impl WaitNode {
    fn new() -> WaitNode {
        WaitNode {
            state: Mutex::new(WaitState::Invalid),
            wake: Condvar::new(),
        }
    }
}

/// The usual predicate-loop shape, with the state the predicate reads
/// guarded by the same lock the condition is bound to:
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::thread;
/// use workq_core::{Condition, ReentrantLock, FOREVER};
///
/// let lock = Arc::new(ReentrantLock::new());
/// let ready = Arc::new(Condition::new(Arc::clone(&lock)));
/// let flag = Arc::new(AtomicBool::new(false));
///
/// let waiter = {
///     let (lock, ready, flag) = (Arc::clone(&lock), Arc::clone(&ready), Arc::clone(&flag));
///     thread::spawn(move || {
///         let mut guard = lock.lock();
///         while !flag.load(Ordering::Relaxed) {
///             ready.wait(&mut guard, FOREVER);
///         }
///     })
/// };
///
/// {
///     let guard = lock.lock();
///     flag.store(true, Ordering::Relaxed);
///     ready.signal_all(&guard);
/// }
/// waiter.join().unwrap();
/// ```
pub struct Condition {
    lock: Arc<ReentrantLock>,
    /// Arrival-ordered waiters. Mutated only while `lock` is held, which is
    /// what keeps signal and timed-out removal from racing; the inner mutex
    /// merely lets the structure stay in safe Rust and is never contended.
    waiters: Mutex<VecDeque<Arc<WaitNode>>>,
    /// Each thread reuses one node per condition, so steady-state waits
    /// allocate nothing.
    node_cache: ThreadLocal<Arc<WaitNode>>,
}

impl Condition {
    /// Creates a condition bound to `lock`. The condition keeps a shared
    /// reference, so the lock outlives it by construction.
    pub fn new(lock: Arc<ReentrantLock>) -> Condition {
        Condition {
            lock,
            waiters: Mutex::new(VecDeque::new()),
            node_cache: ThreadLocal::new(),
        }
    }

    /// Blocks the current thread until signalled or until `timeout_ms`
    /// expires, releasing the lock for the duration of the sleep and
    /// re-acquiring it before returning.
    ///
    /// Returns the milliseconds left of the budget when signalled, `-1` when
    /// signalled out of an infinite wait (`timeout_ms == -1`), and `0` on
    /// timeout or when called with `timeout_ms == 0`. A return of `0` always
    /// means the budget is spent.
    ///
    /// The wait releases exactly one hold of the lock; waiting while the
    /// lock is held recursively is not supported and will deadlock, exactly
    /// as an OS condition variable over a recursive mutex does.
    pub fn wait(&self, guard: &mut LockGuard<'_>, timeout_ms: i64) -> i64 {
        assert!(
            guard.guards(&self.lock),
            "condition waited on with a guard from an unrelated lock"
        );
        if timeout_ms == clock::NO_WAIT {
            return 0;
        }
        let started = Instant::now();
        let deadline = clock::deadline_after(started, timeout_ms);

        let node = self.thread_node();
        *node.state.lock().unwrap() = WaitState::Waiting;
        self.waiters.lock().unwrap().push_back(Arc::clone(&node));

        // Give the lock up for the sleep. The predicate loop below makes the
        // gap between release and sleep safe: a signal that lands in it flips
        // the state first, and the first state check sees it.
        self.lock.release();
        {
            let mut state = node.state.lock().unwrap();
            while *state == WaitState::Waiting {
                match deadline {
                    None => state = node.wake.wait(state).unwrap(),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        let (reacquired, _) =
                            node.wake.wait_timeout(state, deadline - now).unwrap();
                        state = reacquired;
                    }
                }
            }
        }
        self.lock.acquire();

        // Back under the lock; settle the outcome. A node the signaller never
        // touched is still in the list and must be unlinked here.
        let notified = {
            let mut state = node.state.lock().unwrap();
            let notified = *state == WaitState::Notified;
            *state = WaitState::Invalid;
            notified
        };
        if !notified {
            self.unlink(&node);
        }

        if timeout_ms == clock::FOREVER {
            debug_assert!(notified);
            return clock::FOREVER;
        }
        if notified {
            clock::remaining_ms(started, timeout_ms)
        } else {
            0
        }
    }

    /// Wakes the earliest-arrived waiter, if any. A node whose waiter has
    /// already given up is dropped from the list and the signal is a no-op
    /// on it; callers that must wake somebody loop on [`has_waiters`].
    ///
    /// [`has_waiters`]: Self::has_waiters
    pub fn signal(&self, guard: &LockGuard<'_>) {
        assert!(
            guard.guards(&self.lock),
            "condition signalled with a guard from an unrelated lock"
        );
        let mut waiters = self.waiters.lock().unwrap();
        Self::signal_first(&mut waiters);
    }

    /// Wakes every current waiter, in arrival order.
    pub fn signal_all(&self, guard: &LockGuard<'_>) {
        assert!(
            guard.guards(&self.lock),
            "condition signalled with a guard from an unrelated lock"
        );
        let mut waiters = self.waiters.lock().unwrap();
        while !waiters.is_empty() {
            Self::signal_first(&mut waiters);
        }
    }

    /// Whether any thread is currently parked in the wait list.
    pub fn has_waiters(&self, guard: &LockGuard<'_>) -> bool {
        assert!(
            guard.guards(&self.lock),
            "condition inspected with a guard from an unrelated lock"
        );
        !self.waiters.lock().unwrap().is_empty()
    }

    fn signal_first(waiters: &mut VecDeque<Arc<WaitNode>>) {
        if let Some(node) = waiters.pop_front() {
            let mut state = node.state.lock().unwrap();
            if *state != WaitState::Invalid {
                *state = WaitState::Notified;
                node.wake.notify_one();
            }
        }
    }

    fn unlink(&self, node: &Arc<WaitNode>) {
        let mut waiters = self.waiters.lock().unwrap();
        if let Some(position) = waiters.iter().position(|w| Arc::ptr_eq(w, node)) {
            waiters.remove(position);
        }
    }

    fn thread_node(&self) -> Arc<WaitNode> {
        self.node_cache
            .compute_if_absent(|| Arc::new(WaitNode::new()))
            .expect("condition node cache revoked while the condition is live")
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("waiters", &self.waiters.lock().unwrap().len())
            .finish()
    }
}
