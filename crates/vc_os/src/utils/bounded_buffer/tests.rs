use std::collections::HashMap;
use std::sync::mpsc::channel;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use super::{BoundedBuffer, CapacityViolation, ConsumeError, ProduceError};
use crate::sync::CancelToken;

#[test]
fn smoke() {
    let b = BoundedBuffer::new(3);
    b.produce(1).unwrap();
    b.produce(2).unwrap();
    b.produce(3).unwrap();
    assert_eq!(b.len(), 3);
    assert!(b.is_full());

    assert_eq!(b.consume(), Ok(1));
    assert_eq!(b.consume(), Ok(2));
    assert_eq!(b.consume(), Ok(3));
    assert!(b.is_empty());
}

#[test]
fn try_variants_never_block() {
    let b = BoundedBuffer::new(1);
    assert_eq!(b.try_consume(), Err(ConsumeError::Empty));

    assert!(b.try_produce('a').is_ok());
    assert_eq!(b.try_produce('b'), Err(ProduceError::Full('b')));

    assert_eq!(b.try_consume(), Ok('a'));
    assert_eq!(b.try_consume(), Err(ConsumeError::Empty));
}

#[test]
fn consumer_blocks_until_produced() {
    let b = Arc::new(BoundedBuffer::new(5));
    let b2 = b.clone();

    let consumer = thread::spawn(move || {
        let value = b2.consume().unwrap();
        (value, Instant::now())
    });

    thread::sleep(Duration::from_millis(50));
    let produced_at = Instant::now();
    b.produce(42).unwrap();

    let (value, returned_at) = consumer.join().unwrap();
    assert_eq!(value, 42);
    assert!(returned_at >= produced_at);
}

#[test]
fn producer_blocks_while_full() {
    let b = Arc::new(BoundedBuffer::new(1));
    b.produce(0).unwrap();

    let (tx, rx) = channel();
    let b2 = b.clone();
    let producer = thread::spawn(move || {
        b2.produce(1).unwrap();
        tx.send(()).unwrap();
    });

    // still full, the producer must be parked
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(b.len(), 1);

    assert_eq!(b.consume(), Ok(0));
    rx.recv().unwrap();
    producer.join().unwrap();
    assert_eq!(b.consume(), Ok(1));
}

#[test]
fn consume_timeout_on_empty() {
    let b = BoundedBuffer::<u32>::new(2);
    let start = Instant::now();
    assert_eq!(
        b.consume_timeout(Duration::from_millis(20)),
        Err(ConsumeError::TimedOut)
    );
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn cancelled_produce_leaves_buffer_intact() {
    let b = BoundedBuffer::new(2);
    b.produce(1).unwrap();
    b.produce(2).unwrap();

    let token = CancelToken::new();
    thread::scope(|s| {
        let blocked = s.spawn(|| b.produce_until(3, &token));
        thread::sleep(Duration::from_millis(30));
        token.cancel();

        let err = blocked.join().unwrap().unwrap_err();
        assert_eq!(err, ProduceError::Cancelled(3));
        assert_eq!(err.into_inner(), 3);
    });

    assert_eq!(b.len(), 2);
    assert_eq!(b.consume(), Ok(1));
    b.produce(4).unwrap();
    assert_eq!(b.consume(), Ok(2));
    assert_eq!(b.consume(), Ok(4));
    assert!(b.is_empty());
}

#[test]
fn timed_out_produce_returns_value() {
    let b = BoundedBuffer::new(1);
    b.produce("kept").unwrap();
    assert_eq!(
        b.produce_timeout("rejected", Duration::from_millis(10)),
        Err(ProduceError::TimedOut("rejected"))
    );
    assert_eq!(b.len(), 1);
}

#[test]
fn close_rejects_producers_and_drains() {
    let b = BoundedBuffer::new(4);
    b.produce(1).unwrap();
    b.produce(2).unwrap();
    b.close();
    assert!(b.is_closed());

    let err = b.produce(3).unwrap_err();
    assert!(err.is_closed());
    assert_eq!(err.into_inner(), 3);

    assert_eq!(b.consume(), Ok(1));
    assert_eq!(b.consume(), Ok(2));
    assert_eq!(b.consume(), Err(ConsumeError::Closed));
    assert_eq!(b.try_consume(), Err(ConsumeError::Closed));
}

#[test]
fn close_wakes_blocked_waiters() {
    let empty = BoundedBuffer::<u8>::new(1);
    let full = BoundedBuffer::new(1);
    full.produce(0u8).unwrap();

    thread::scope(|s| {
        let consumer = s.spawn(|| empty.consume());
        let producer = s.spawn(|| full.produce(1));
        thread::sleep(Duration::from_millis(30));

        empty.close();
        full.close();

        assert_eq!(consumer.join().unwrap(), Err(ConsumeError::Closed));
        assert_eq!(producer.join().unwrap(), Err(ProduceError::Closed(1)));
    });
}

#[test]
fn mpmc_no_loss_no_duplication() {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 3;
    const PER_PRODUCER: usize = 500;

    let b = BoundedBuffer::new(5);
    let (tx, rx) = channel();

    thread::scope(|s| {
        for p in 0..PRODUCERS {
            let b = &b;
            s.spawn(move || {
                for i in 0..PER_PRODUCER {
                    b.produce(p * PER_PRODUCER + i).unwrap();
                }
            });
        }
        for _ in 0..CONSUMERS {
            let b = &b;
            let tx = tx.clone();
            s.spawn(move || {
                while let Ok(v) = b.consume() {
                    tx.send(v).unwrap();
                }
            });
        }
        drop(tx);

        // close once everything has been received so the consumers exit
        let mut seen = Vec::with_capacity(PRODUCERS * PER_PRODUCER);
        while seen.len() < PRODUCERS * PER_PRODUCER {
            seen.push(rx.recv().unwrap());
        }
        b.close();

        seen.sort_unstable();
        assert_eq!(seen, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
    });
}

#[test]
fn rendezvous_produce_waits_for_consumer() {
    let b = Arc::new(BoundedBuffer::new(0));
    let (tx, rx) = channel();

    let b2 = b.clone();
    let producer = thread::spawn(move || {
        b2.produce(7).unwrap();
        tx.send(Instant::now()).unwrap();
    });

    // nobody consumed yet
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert_eq!(b.len(), 0);

    let consumed_at = Instant::now();
    assert_eq!(b.consume(), Ok(7));
    let produced_at = rx.recv().unwrap();
    assert!(produced_at >= consumed_at);
    producer.join().unwrap();
}

#[test]
fn rendezvous_is_always_full() {
    let b = BoundedBuffer::new(0);
    assert!(b.is_full());
    assert!(b.is_empty());
    assert_eq!(b.try_produce(1), Err(ProduceError::Full(1)));

    // a waiting producer does not change the answer
    thread::scope(|s| {
        let producer = s.spawn(|| b.produce(2));
        thread::sleep(Duration::from_millis(10));
        assert!(b.is_full());
        assert_eq!(b.len(), 0);
        assert_eq!(b.consume(), Ok(2));
        producer.join().unwrap().unwrap();
    });
    assert!(b.is_full());
}

#[test]
fn rendezvous_cancel_takes_item_back() {
    let b = BoundedBuffer::new(0);
    assert_eq!(
        b.produce_timeout(1, Duration::from_millis(20)),
        Err(ProduceError::TimedOut(1))
    );
    assert_eq!(b.try_consume(), Err(ConsumeError::Empty));
    assert_eq!(b.try_produce(2), Err(ProduceError::Full(2)));

    // still usable afterwards
    thread::scope(|s| {
        s.spawn(|| b.produce(3).unwrap());
        assert_eq!(b.consume(), Ok(3));
    });
}

#[test]
fn rendezvous_many_pairs() {
    const N: usize = 200;
    let b = BoundedBuffer::new(0);
    let start = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            start.wait();
            for i in 0..N {
                b.produce(i).unwrap();
            }
        });
        start.wait();
        let got: Vec<usize> = (0..N).map(|_| b.consume().unwrap()).collect();
        assert_eq!(got, (0..N).collect::<Vec<_>>());
    });
}

#[test]
fn capacity_violation_message() {
    let err = CapacityViolation { len: 6, capacity: 5 };
    assert_eq!(
        err.to_string(),
        "bounded buffer holds 6 items but has capacity 5"
    );
}

#[test]
fn is_sync_send() {
    fn is_sync<T: Sync>() {}
    is_sync::<BoundedBuffer<String>>();

    fn is_send<T: Send>() {}
    is_send::<BoundedBuffer<String>>();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Each producer's values must come out in the order it produced them,
    // and nothing may be lost or repeated.
    #[test]
    fn fifo_per_producer(
        capacity in 0usize..6,
        producers in 1usize..4,
        per_producer in 0usize..40,
    ) {
        let b = BoundedBuffer::new(capacity);
        let total = producers * per_producer;

        let received = thread::scope(|s| {
            for p in 0..producers {
                let b = &b;
                s.spawn(move || {
                    for i in 0..per_producer {
                        b.produce((p, i)).unwrap();
                    }
                });
            }
            (0..total).map(|_| b.consume().unwrap()).collect::<Vec<_>>()
        });

        let mut next: HashMap<usize, usize> = HashMap::new();
        for (p, i) in received {
            let expected = next.entry(p).or_insert(0);
            prop_assert_eq!(i, *expected);
            *expected += 1;
        }
        for p in 0..producers {
            prop_assert_eq!(next.get(&p).copied().unwrap_or(0), per_producer);
        }
    }

    #[test]
    fn single_thread_fifo(capacity in 1usize..16, values in proptest::collection::vec(any::<u32>(), 0..16)) {
        let b = BoundedBuffer::new(capacity);
        let mut out = Vec::new();
        for v in &values {
            if b.is_full() {
                out.push(b.consume().unwrap());
            }
            b.produce(*v).unwrap();
        }
        while let Ok(v) = b.try_consume() {
            out.push(v);
        }
        prop_assert_eq!(out, values);
    }
}
