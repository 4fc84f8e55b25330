//! Two-lock linked blocking queue.
//!
//! The classic two-lock algorithm: `put_lock` owns the tail, `take_lock`
//! owns the head, and an atomic count is the only state the two sides share.
//! Offers and polls proceed concurrently; each side wakes the other only on
//! the empty → non-empty and full → non-full crossings, and wakes its own
//! successor in a cascade otherwise, so the cross-lock hop stays rare.

use std::cell::Cell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::condition::Condition;
use crate::lock::ReentrantLock;
use crate::queue::{BlockingQueue, UNBOUNDED};
use crate::{BuildError, ErrorKind};

struct Node<T> {
    next: *mut Node<T>,
    item: Option<T>,
}

impl<T> Node<T> {
    fn boxed(item: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            next: ptr::null_mut(),
            item,
        }))
    }
}

/// A FIFO queue over a linked list with a permanent sentinel head.
///
/// The node after `head` is the next item out; `tail` is the last node in,
/// or the sentinel itself when empty. Dequeueing frees the old sentinel and
/// promotes the detached node in its place, which is what keeps an enqueue
/// into an empty queue and a concurrent dequeue off each other's nodes.
/// Capacity may be [`UNBOUNDED`], in which case offers never block.
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use workq_core::{BlockingQueue, LinkedBlockingQueue, FOREVER};
///
/// let queue = Arc::new(LinkedBlockingQueue::new(4)?);
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         for item in 0..100 {
///             queue.offer(item, FOREVER).unwrap();
///         }
///     })
/// };
/// for expected in 0..100 {
///     assert_eq!(queue.poll(FOREVER), Some(expected));
/// }
/// producer.join().unwrap();
/// # Ok::<(), workq_core::BuildError>(())
/// ```
pub struct LinkedBlockingQueue<T> {
    capacity: usize,
    /// Shared by both sides; padded so producer and consumer cache lines
    /// stay apart on the hot path.
    count: CachePadded<AtomicUsize>,
    put_lock: Arc<ReentrantLock>,
    not_full: Condition,
    take_lock: Arc<ReentrantLock>,
    not_empty: Condition,
    /// Sentinel node; read and written only under `take_lock`.
    head: Cell<*mut Node<T>>,
    /// Last node; read and written only under `put_lock`.
    tail: Cell<*mut Node<T>>,
}

// Raw node pointers are confined by the two locks: `head` moves only under
// `take_lock`, `tail` and node links only under `put_lock`, and the atomic
// count keeps a dequeue from ever touching a node a producer still owns.
unsafe impl<T: Send> Send for LinkedBlockingQueue<T> {}
unsafe impl<T: Send> Sync for LinkedBlockingQueue<T> {}

impl<T: Send> LinkedBlockingQueue<T> {
    /// Creates a queue holding at most `capacity` items. Zero is rejected;
    /// [`UNBOUNDED`] is accepted and makes `offer` non-blocking.
    pub fn new(capacity: usize) -> Result<LinkedBlockingQueue<T>, BuildError> {
        if capacity == 0 {
            return Err(BuildError::new(ErrorKind::ZeroCapacity));
        }
        let sentinel = Node::boxed(None);
        let put_lock = Arc::new(ReentrantLock::new());
        let take_lock = Arc::new(ReentrantLock::new());
        Ok(LinkedBlockingQueue {
            capacity,
            count: CachePadded::new(AtomicUsize::new(0)),
            not_full: Condition::new(Arc::clone(&put_lock)),
            put_lock,
            not_empty: Condition::new(Arc::clone(&take_lock)),
            take_lock,
            head: Cell::new(sentinel),
            tail: Cell::new(sentinel),
        })
    }

    /// An unbounded queue: every offer succeeds without blocking.
    pub fn unbounded() -> LinkedBlockingQueue<T> {
        match Self::new(UNBOUNDED) {
            Ok(queue) => queue,
            Err(_) => unreachable!("unbounded capacity is always accepted"),
        }
    }

    /// Appends a node carrying `item` at the tail. Caller holds `put_lock`.
    /// Returns the count before the append.
    unsafe fn enqueue(&self, item: T) -> usize {
        let node = Node::boxed(Some(item));
        let tail = self.tail.get();
        (*tail).next = node;
        self.tail.set(node);
        // SeqCst pairs with the load in `poll`: a consumer that observes the
        // incremented count also observes the link written above.
        self.count.fetch_add(1, Ordering::SeqCst)
    }

    /// Detaches the node after the sentinel, frees the old sentinel, and
    /// promotes the detached node in its place. Caller holds `take_lock` and
    /// has observed a non-zero count. Returns the item and the count before
    /// the removal.
    unsafe fn dequeue(&self) -> (T, usize) {
        let sentinel = self.head.get();
        let first = (*sentinel).next;
        debug_assert!(!first.is_null(), "non-zero count with no data node");
        let item = match (*first).item.take() {
            Some(item) => item,
            None => unreachable!("data node without an item"),
        };
        self.head.set(first);
        drop(Box::from_raw(sentinel));
        (item, self.count.fetch_sub(1, Ordering::SeqCst))
    }
}

impl<T: Send> BlockingQueue<T> for LinkedBlockingQueue<T> {
    fn offer(&self, item: T, timeout_ms: i64) -> Result<(), T> {
        let mut guard = self.put_lock.lock();
        let mut remaining = timeout_ms;
        while self.count.load(Ordering::SeqCst) == self.capacity {
            remaining = self.not_full.wait(&mut guard, remaining);
            if remaining == 0 {
                return Err(item);
            }
        }
        let before = unsafe { self.enqueue(item) };
        // Cascade: if this offer left room, the next parked producer can go
        // ahead without waiting for a consumer's crossover signal.
        if self.capacity != UNBOUNDED && before + 1 < self.capacity {
            self.not_full.signal(&guard);
        }
        drop(guard);

        if before == 0 {
            // Empty → non-empty handoff to a parked consumer.
            let guard = self.take_lock.lock();
            self.not_empty.signal(&guard);
        }
        Ok(())
    }

    fn poll(&self, timeout_ms: i64) -> Option<T> {
        let mut guard = self.take_lock.lock();
        let mut remaining = timeout_ms;
        while self.count.load(Ordering::SeqCst) == 0 {
            remaining = self.not_empty.wait(&mut guard, remaining);
            if remaining == 0 {
                return None;
            }
        }
        let (item, before) = unsafe { self.dequeue() };
        if before > 1 {
            self.not_empty.signal(&guard);
        }
        drop(guard);

        if before == self.capacity {
            // Full → non-full handoff to a parked producer. Unreachable in
            // unbounded mode, where the count can never meet the sentinel.
            let guard = self.put_lock.lock();
            self.not_full.signal(&guard);
        }
        Some(item)
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Drop for LinkedBlockingQueue<T> {
    fn drop(&mut self) {
        // Exclusive access: walk the list from the sentinel and free every
        // node, dropping any items still enqueued.
        let mut node = self.head.get();
        while !node.is_null() {
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next;
        }
    }
}

impl<T> fmt::Debug for LinkedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedBlockingQueue")
            .field("len", &self.count.load(Ordering::SeqCst))
            .field("capacity", &self.capacity)
            .finish()
    }
}
