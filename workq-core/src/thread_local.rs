//! Dynamically created per-thread storage.
//!
//! Unlike `std::thread_local!`, which requires a `static` declaration, a
//! [`ThreadLocal`] is an ordinary value: any number of instances can be
//! created at runtime and embedded in other structures (the condition
//! variable keeps its per-thread waiter node in one). Each instance owns an
//! independent slot in every thread that touches it.
//!
//! A thread's values are reclaimed when the thread exits, through the same
//! platform TLS destructor that backs `std::thread_local!` — there is no
//! global registry of live values. [`ThreadLocal::destroy`] revokes the
//! instance so new accesses see an empty slot; values still held by other
//! threads are reaped when those threads exit.
//!
//! ```
//! use workq_core::ThreadLocal;
//!
//! let counter: ThreadLocal<u32> = ThreadLocal::new();
//! assert_eq!(counter.get(), None);
//! assert_eq!(counter.compute_if_absent(|| 1), Some(1));
//! counter.set(counter.get().unwrap() + 1);
//! assert_eq!(counter.get(), Some(2));
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Key source. Keys are never reused, so a destroyed instance can never
/// alias a later one's slots.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// One heterogeneous slot map per thread, keyed by instance. Dropping the
    /// map at thread exit drops every stored value.
    static SLOTS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

pub struct ThreadLocal<T: 'static> {
    key: u64,
    alive: AtomicBool,
    // `fn() -> T` keeps the handle `Send + Sync` for any `T`: values never
    // move between threads through this type.
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> ThreadLocal<T> {
    pub fn new() -> ThreadLocal<T> {
        ThreadLocal {
            key: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
            alive: AtomicBool::new(true),
            _marker: PhantomData,
        }
    }

    /// Stores `value` in the current thread's slot, dropping any previous
    /// value. Returns `false` (and drops `value`) if the instance has been
    /// destroyed or the thread is already tearing down its TLS.
    pub fn set(&self, value: T) -> bool {
        if !self.is_alive() {
            return false;
        }
        SLOTS
            .try_with(|slots| {
                slots.borrow_mut().insert(self.key, Box::new(value));
            })
            .is_ok()
    }

    /// Calls `f` with a reference to the current thread's value, if any.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        if !self.is_alive() {
            return f(None);
        }
        let mut f = Some(f);
        SLOTS
            .try_with(|slots| {
                let slots = slots.borrow();
                let value = slots.get(&self.key).and_then(|v| v.downcast_ref::<T>());
                (f.take().unwrap())(value)
            })
            .unwrap_or_else(|_| (f.take().unwrap())(None))
    }

    /// A clone of the current thread's value, if any.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.with(|value| value.cloned())
    }

    /// Returns the current thread's value, building and storing one first if
    /// the slot is empty. Returns `None` only when the freshly built value
    /// cannot be stored (instance destroyed, thread exiting); the value is
    /// dropped in that case.
    pub fn compute_if_absent(&self, build: impl FnOnce() -> T) -> Option<T>
    where
        T: Clone,
    {
        if let Some(value) = self.get() {
            return Some(value);
        }
        let value = build();
        let result = value.clone();
        if self.set(value) {
            Some(result)
        } else {
            None
        }
    }

    /// Removes and returns the current thread's value.
    pub fn take(&self) -> Option<T> {
        if !self.is_alive() {
            return None;
        }
        SLOTS
            .try_with(|slots| slots.borrow_mut().remove(&self.key))
            .ok()
            .flatten()
            .and_then(|boxed| boxed.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// One-shot revocation: new accesses on every thread observe an empty
    /// slot and `set` fails. Values other threads still hold are not touched
    /// here; each thread reclaims its own at exit.
    pub fn destroy(&self) {
        let _ = self
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl<T: 'static> Default for ThreadLocal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Drop for ThreadLocal<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T: 'static> fmt::Debug for ThreadLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocal")
            .field("key", &self.key)
            .field("alive", &self.is_alive())
            .finish()
    }
}
