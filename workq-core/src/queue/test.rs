use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::clock::{FOREVER, NO_WAIT};
use crate::queue::{ArrayBlockingQueue, BlockingQueue, LinkedBlockingQueue, UNBOUNDED};

#[test]
fn array_queue_interleaves_offers_and_polls() {
    let queue = ArrayBlockingQueue::new(2).unwrap();
    assert!(queue.offer(1, NO_WAIT).is_ok());
    assert!(queue.offer(2, NO_WAIT).is_ok());
    assert_eq!(queue.poll(NO_WAIT), Some(1));
    assert!(queue.offer(3, NO_WAIT).is_ok());
    assert_eq!(queue.poll(NO_WAIT), Some(2));
    assert_eq!(queue.poll(NO_WAIT), Some(3));
    assert!(queue.is_empty());
}

#[test]
fn array_queue_rejects_unbounded_and_zero_capacity() {
    assert!(ArrayBlockingQueue::<u32>::new(UNBOUNDED).is_err());
    assert!(ArrayBlockingQueue::<u32>::new(0).is_err());
    assert!(LinkedBlockingQueue::<u32>::new(0).is_err());
    assert!(LinkedBlockingQueue::<u32>::new(UNBOUNDED).is_ok());
}

#[test]
fn full_and_empty_fail_fast_without_mutation() {
    let queue = ArrayBlockingQueue::new(2).unwrap();
    assert_eq!(queue.poll(NO_WAIT), None);

    assert!(queue.offer(10, NO_WAIT).is_ok());
    assert!(queue.offer(11, NO_WAIT).is_ok());
    assert_eq!(queue.offer(12, NO_WAIT), Err(12));
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.poll(NO_WAIT), Some(10));
    assert_eq!(queue.poll(NO_WAIT), Some(11));
    assert_eq!(queue.poll(NO_WAIT), None);
    assert_eq!(queue.len(), 0);
}

#[test]
fn timed_offer_on_a_full_queue_expires_on_schedule() {
    let queue = ArrayBlockingQueue::new(1).unwrap();
    assert!(queue.offer(0_u8, NO_WAIT).is_ok());

    let started = Instant::now();
    assert_eq!(queue.offer(1, 100), Err(1));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "returned far too late: {elapsed:?}");
    assert_eq!(queue.len(), 1);
}

#[test]
fn timed_poll_on_an_empty_queue_expires_on_schedule() {
    let queue = LinkedBlockingQueue::<u64>::new(4).unwrap();
    let started = Instant::now();
    assert_eq!(queue.poll(100), None);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

fn assert_fifo_under_one_producer(queue: Arc<dyn BlockingQueue<u32>>) {
    const ITEMS: u32 = 2_000;

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            (0..ITEMS)
                .map(|_| queue.poll(FOREVER).expect("infinite poll"))
                .collect::<Vec<_>>()
        })
    };
    for item in 0..ITEMS {
        queue.offer(item, FOREVER).ok().expect("infinite offer");
    }

    let polled = consumer.join().unwrap();
    assert_eq!(polled, (0..ITEMS).collect::<Vec<_>>());
}

#[test]
fn array_queue_is_fifo_under_one_producer() {
    assert_fifo_under_one_producer(Arc::new(ArrayBlockingQueue::new(7).unwrap()));
}

#[test]
fn linked_queue_is_fifo_under_one_producer() {
    assert_fifo_under_one_producer(Arc::new(LinkedBlockingQueue::new(7).unwrap()));
}

#[test]
fn linked_queue_loses_nothing_under_competing_producers() {
    const PER_PRODUCER: u32 = 100;

    let queue = Arc::new(LinkedBlockingQueue::new(3).unwrap());
    let producers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for item in 1..=PER_PRODUCER {
                    queue.offer(item, FOREVER).ok().expect("infinite offer");
                }
            })
        })
        .collect();

    let mut seen: HashMap<u32, usize> = HashMap::new();
    for _ in 0..2 * PER_PRODUCER {
        let item = queue.poll(FOREVER).expect("infinite poll");
        *seen.entry(item).or_insert(0) += 1;
    }

    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(seen.len(), PER_PRODUCER as usize);
    assert!((1..=PER_PRODUCER).all(|item| seen[&item] == 2));
    assert_eq!(queue.poll(NO_WAIT), None);
}

#[test]
fn bounded_size_never_exceeds_capacity() {
    const CAPACITY: usize = 4;
    const ITEMS: u32 = 1_000;

    let queue = Arc::new(ArrayBlockingQueue::new(CAPACITY).unwrap());
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for item in 0..ITEMS {
                queue.offer(item, FOREVER).ok().expect("infinite offer");
            }
        })
    };

    let mut polled = 0;
    while polled < ITEMS {
        assert!(queue.len() <= CAPACITY);
        if queue.poll(FOREVER).is_some() {
            polled += 1;
        }
    }
    producer.join().unwrap();
}

#[test]
fn unbounded_offers_never_fail() {
    let queue = LinkedBlockingQueue::unbounded();
    assert_eq!(queue.capacity(), UNBOUNDED);
    for item in 0..10_000_u32 {
        assert!(queue.offer(item, NO_WAIT).is_ok());
    }
    assert_eq!(queue.len(), 10_000);
    assert_eq!(queue.poll(NO_WAIT), Some(0));
}

#[test]
fn dropping_a_loaded_queue_drops_its_items() {
    struct Tracked(Arc<AtomicUsize>);
    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    {
        let queue = LinkedBlockingQueue::unbounded();
        for _ in 0..5 {
            queue
                .offer(Tracked(Arc::clone(&drops)), NO_WAIT)
                .ok()
                .expect("unbounded offer");
        }
        drop(queue.poll(NO_WAIT));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 5);
}
