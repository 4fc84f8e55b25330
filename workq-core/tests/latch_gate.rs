//! The latch as a start/finish gate across threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use workq_core::{CountDownLatch, FOREVER};

#[test]
fn four_workers_open_the_gate_for_a_fifth() {
    let latch = Arc::new(CountDownLatch::new(4));

    let waiter = {
        let latch = Arc::clone(&latch);
        thread::spawn(move || latch.wait(FOREVER))
    };
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let latch = Arc::clone(&latch);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                latch.count_down();
            })
        })
        .collect();

    assert!(waiter.join().unwrap());
    for worker in workers {
        worker.join().unwrap();
    }

    // A latecomer sees the open gate without spending its budget.
    let started = Instant::now();
    assert!(latch.wait(1_000));
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[test]
fn budget_expires_while_the_gate_is_closed() {
    let latch = CountDownLatch::new(1);
    let started = Instant::now();
    assert!(!latch.wait(100));
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn the_gate_is_one_shot() {
    let latch = Arc::new(CountDownLatch::new(2));
    latch.count_down();
    latch.count_down();
    assert_eq!(latch.count(), 0);

    // Once open, no amount of counting reopens it.
    latch.count_down();
    assert_eq!(latch.count(), 0);
    assert!(latch.wait(0));
}
