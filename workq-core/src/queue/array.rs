//! Ring-buffer blocking queue: one lock, two conditions.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use crate::condition::Condition;
use crate::lock::ReentrantLock;
use crate::queue::{BlockingQueue, UNBOUNDED};
use crate::{BuildError, ErrorKind};

/// A bounded FIFO queue over a fixed ring of slots.
///
/// All state is guarded by a single [`ReentrantLock`]; producers park on
/// `not_full`, consumers on `not_empty`, and each successful operation
/// broadcasts the opposite condition. Simple and fair, at the cost of
/// producers and consumers contending on the one lock — the linked queue
/// trades that away.
///
/// ```
/// use workq_core::{ArrayBlockingQueue, BlockingQueue, NO_WAIT};
///
/// let queue = ArrayBlockingQueue::new(2)?;
/// queue.offer("a", NO_WAIT).unwrap();
/// queue.offer("b", NO_WAIT).unwrap();
/// assert_eq!(queue.offer("c", NO_WAIT), Err("c")); // full, handed back
/// assert_eq!(queue.poll(NO_WAIT), Some("a"));
/// # Ok::<(), workq_core::BuildError>(())
/// ```
pub struct ArrayBlockingQueue<T> {
    lock: Arc<ReentrantLock>,
    not_full: Condition,
    not_empty: Condition,
    capacity: usize,
    /// Accessed only while `lock` is held; the `RefCell` exists so the ring
    /// stays in safe Rust, and its dynamic checks never fire under that
    /// invariant.
    ring: RefCell<Ring<T>>,
}

// The ring is reached only under `lock`, which serializes all access; the
// `RefCell` is what keeps `Self` from being `Sync` automatically.
unsafe impl<T: Send> Sync for ArrayBlockingQueue<T> {}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn push(&mut self, item: T) {
        debug_assert!(self.slots[self.tail].is_none());
        self.slots[self.tail] = Some(item);
        self.tail = self.advance(self.tail);
        self.len += 1;
    }

    fn pop(&mut self) -> T {
        let item = match self.slots[self.head].take() {
            Some(item) => item,
            None => unreachable!("occupied ring with an empty head slot"),
        };
        self.head = self.advance(self.head);
        self.len -= 1;
        item
    }

    fn advance(&self, index: usize) -> usize {
        if index + 1 >= self.slots.len() {
            0
        } else {
            index + 1
        }
    }
}

impl<T: Send> ArrayBlockingQueue<T> {
    /// Creates a queue holding at most `capacity` items. This queue is
    /// bounded only: [`UNBOUNDED`] is rejected, as is a zero capacity.
    pub fn new(capacity: usize) -> Result<ArrayBlockingQueue<T>, BuildError> {
        if capacity == UNBOUNDED {
            return Err(BuildError::new(ErrorKind::UnboundedCapacity));
        }
        if capacity == 0 {
            return Err(BuildError::new(ErrorKind::ZeroCapacity));
        }
        let lock = Arc::new(ReentrantLock::new());
        Ok(ArrayBlockingQueue {
            not_full: Condition::new(Arc::clone(&lock)),
            not_empty: Condition::new(Arc::clone(&lock)),
            lock,
            capacity,
            ring: RefCell::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                len: 0,
            }),
        })
    }
}

impl<T: Send> BlockingQueue<T> for ArrayBlockingQueue<T> {
    fn offer(&self, item: T, timeout_ms: i64) -> Result<(), T> {
        let mut guard = self.lock.lock();
        let mut remaining = timeout_ms;
        while self.ring.borrow().len == self.capacity {
            remaining = self.not_full.wait(&mut guard, remaining);
            if remaining == 0 {
                return Err(item);
            }
        }
        self.ring.borrow_mut().push(item);
        self.not_empty.signal_all(&guard);
        Ok(())
    }

    fn poll(&self, timeout_ms: i64) -> Option<T> {
        let mut guard = self.lock.lock();
        let mut remaining = timeout_ms;
        while self.ring.borrow().len == 0 {
            remaining = self.not_empty.wait(&mut guard, remaining);
            if remaining == 0 {
                return None;
            }
        }
        let item = self.ring.borrow_mut().pop();
        self.not_full.signal_all(&guard);
        Some(item)
    }

    fn len(&self) -> usize {
        let _guard = self.lock.lock();
        self.ring.borrow().len
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> fmt::Debug for ArrayBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _guard = self.lock.lock();
        f.debug_struct("ArrayBlockingQueue")
            .field("len", &self.ring.borrow().len)
            .field("capacity", &self.capacity)
            .finish()
    }
}
