//! Wakeup fairness: signals release waiters in their arrival order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use workq_core::{Condition, ReentrantLock, FOREVER};

#[test]
fn waiters_wake_in_arrival_order() {
    const WAITERS: usize = 3;

    let lock = Arc::new(ReentrantLock::new());
    let condition = Arc::new(Condition::new(Arc::clone(&lock)));
    // Bumped under the lock just before each wait, so "entered == k" plus a
    // round trip through the lock proves waiters 0..k are all in the list.
    let entered = Arc::new(AtomicUsize::new(0));
    let wake_order = Arc::new(Mutex::new(Vec::new()));

    let waiters: Vec<_> = (0..WAITERS)
        .map(|index| {
            let lock = Arc::clone(&lock);
            let condition = Arc::clone(&condition);
            let entered = Arc::clone(&entered);
            let wake_order = Arc::clone(&wake_order);
            thread::spawn(move || {
                // Enter strictly one after another: waiter `index` may only
                // park once every earlier waiter is already parked.
                while entered.load(Ordering::SeqCst) != index {
                    thread::yield_now();
                }
                let mut guard = lock.lock();
                entered.fetch_add(1, Ordering::SeqCst);
                let left = condition.wait(&mut guard, FOREVER);
                assert_eq!(left, FOREVER);
                wake_order.lock().unwrap().push(index);
            })
        })
        .collect();

    // Wait until the last waiter is parked (it releases the lock inside its
    // wait, so taking the lock once more proves it).
    while entered.load(Ordering::SeqCst) != WAITERS {
        thread::yield_now();
    }
    drop(lock.lock());

    // Release one waiter at a time; each must come back before the next
    // signal so the recorded order is the wakeup order.
    for expected in 1..=WAITERS {
        {
            let guard = lock.lock();
            condition.signal(&guard);
        }
        while wake_order.lock().unwrap().len() < expected {
            thread::yield_now();
        }
    }

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert_eq!(*wake_order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn signal_on_an_empty_condition_is_a_no_op() {
    let lock = Arc::new(ReentrantLock::new());
    let condition = Condition::new(Arc::clone(&lock));
    let guard = lock.lock();
    condition.signal(&guard);
    condition.signal_all(&guard);
    assert!(!condition.has_waiters(&guard));
}

#[test]
fn a_timed_out_waiter_is_gone_from_the_list() {
    let lock = Arc::new(ReentrantLock::new());
    let condition = Arc::new(Condition::new(Arc::clone(&lock)));

    {
        let mut guard = lock.lock();
        assert_eq!(condition.wait(&mut guard, 50), 0);
        assert!(!condition.has_waiters(&guard));
    }

    // A later signal must not be swallowed by the expired wait's node.
    let parked = Arc::new(AtomicUsize::new(0));
    let waiter = {
        let lock = Arc::clone(&lock);
        let condition = Arc::clone(&condition);
        let parked = Arc::clone(&parked);
        thread::spawn(move || {
            let mut guard = lock.lock();
            parked.store(1, Ordering::SeqCst);
            condition.wait(&mut guard, FOREVER)
        })
    };
    while parked.load(Ordering::SeqCst) == 0 {
        thread::yield_now();
    }
    {
        let guard = lock.lock();
        condition.signal(&guard);
    }
    assert_eq!(waiter.join().unwrap(), FOREVER);
}
