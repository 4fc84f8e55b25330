//! A reentrant mutual-exclusion lock.
//!
//! The owning thread may call [`ReentrantLock::lock`] any number of times;
//! the lock is released once every guard has been dropped. The lock guards no
//! data of its own — it is the anchor for one or more [`Condition`]s and for
//! state the caller keeps alongside it, which is why it hands out a plain
//! guard rather than a reference.
//!
//! [`Condition`]: crate::Condition

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

/// ```
/// use workq_core::ReentrantLock;
///
/// let lock = ReentrantLock::new();
/// let outer = lock.lock();
/// let inner = lock.lock(); // same thread: re-acquiring is fine
/// assert!(lock.is_held_by_current_thread());
/// drop(inner);
/// drop(outer); // released once every guard is gone
/// assert!(!lock.is_held_by_current_thread());
/// ```
pub struct ReentrantLock {
    state: Mutex<LockState>,
    lock_released: Condvar,
}

struct LockState {
    owner: Option<ThreadId>,
    holds: usize,
}

/// RAII guard proving the current thread owns a [`ReentrantLock`].
///
/// Dropping the guard releases one hold. The guard is deliberately `!Send`:
/// a reentrant lock must be released on the thread that acquired it.
pub struct LockGuard<'a> {
    lock: &'a ReentrantLock,
    _not_send: PhantomData<*mut ()>,
}

impl ReentrantLock {
    pub fn new() -> ReentrantLock {
        ReentrantLock {
            state: Mutex::new(LockState {
                owner: None,
                holds: 0,
            }),
            lock_released: Condvar::new(),
        }
    }

    /// Acquires the lock, blocking while another thread owns it. Re-acquiring
    /// from the owning thread succeeds immediately.
    pub fn lock(&self) -> LockGuard<'_> {
        self.acquire();
        LockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Acquires the lock only if that is possible without blocking.
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        match state.owner {
            None => {
                state.owner = Some(me);
                state.holds = 1;
            }
            Some(owner) if owner == me => state.holds += 1,
            Some(_) => return None,
        }
        Some(LockGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Raw acquire, balanced by [`release`](Self::release). Reserved for the
    /// condition implementation, which must give the lock up around a wait
    /// while its guard stays alive; everything else goes through [`lock`](Self::lock).
    pub(crate) fn acquire(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.holds = 1;
                    return;
                }
                Some(owner) if owner == me => {
                    state.holds += 1;
                    return;
                }
                Some(_) => state = self.lock_released.wait(state).unwrap(),
            }
        }
    }

    /// Raw release of one hold. Panics if the calling thread is not the
    /// owner; a [`LockGuard`] makes that unreachable in ordinary use.
    pub(crate) fn release(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        assert_eq!(
            state.owner,
            Some(me),
            "reentrant lock released by a non-owning thread"
        );
        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            self.lock_released.notify_one();
        }
    }

    /// Whether the calling thread currently owns the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.owner == Some(thread::current().id())
    }
}

impl Default for ReentrantLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrantLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("ReentrantLock")
            .field("owner", &state.owner)
            .field("holds", &state.holds)
            .finish()
    }
}

impl LockGuard<'_> {
    /// Whether this guard belongs to `lock`. Conditions use this to reject a
    /// guard from some other lock.
    pub(crate) fn guards(&self, lock: &ReentrantLock) -> bool {
        std::ptr::eq(self.lock, lock)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn relocks_from_the_owning_thread() {
        let lock = ReentrantLock::new();
        let outer = lock.lock();
        for _ in 0..64 {
            let inner = lock.lock();
            drop(inner);
        }
        assert!(lock.is_held_by_current_thread());
        drop(outer);
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn try_lock_fails_across_threads_while_held() {
        let lock = Arc::new(ReentrantLock::new());
        let guard = lock.lock();

        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || contender.try_lock().is_none());
        assert!(handle.join().unwrap());

        drop(guard);
        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || contender.try_lock().is_some());
        assert!(handle.join().unwrap());
    }

    #[test]
    fn try_lock_is_reentrant() {
        let lock = ReentrantLock::new();
        let _outer = lock.lock();
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn contended_lock_is_handed_over() {
        let lock = Arc::new(ReentrantLock::new());
        let guard = lock.lock();

        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let _guard = contender.lock();
            contender.is_held_by_current_thread()
        });

        // Give the spawned thread a moment to block on the lock.
        thread::sleep(std::time::Duration::from_millis(50));
        drop(guard);
        assert!(handle.join().unwrap());
    }
}
