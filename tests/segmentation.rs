//! End-to-end segmentation and reassembly through the public API.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use rand::seq::SliceRandom;
use slipwire::{
    BufferPool, Client, MessageBuffer, PeerId, ProtocolConfig, SendMode, Server, Transport,
};

const TYPE_ID: u16 = 33;
const SLICE_CAPACITY: usize = 1237;

/// Captures emitted datagrams instead of putting them on a wire.
#[derive(Default)]
struct Capture {
    datagrams: Vec<Vec<u8>>,
}

impl Transport for Capture {
    fn send(&mut self, buffer: &MessageBuffer, _target: Option<PeerId>) {
        self.datagrams.push(buffer.as_datagram().to_vec());
    }

    fn broadcast(&mut self, buffer: &MessageBuffer) {
        self.datagrams.push(buffer.as_datagram().to_vec());
    }
}

fn config() -> ProtocolConfig {
    ProtocolConfig {
        slice_capacity: SLICE_CAPACITY,
        retention: Duration::from_secs(10),
        ..ProtocolConfig::default()
    }
}

fn pool() -> Arc<BufferPool> {
    Arc::new(BufferPool::with_max_payload(32 * 1024))
}

/// Splits `payload` through a client role and returns the captured
/// datagrams (begin first, then the slices in emission order).
fn split_payload(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut client = Client::new(pool(), config());
    let mut capture = Capture::default();

    let mut message = client.compose(TYPE_ID, SendMode::Reliable).unwrap();
    message.add_bytes_raw(payload).unwrap();
    client.send(&mut capture, message).unwrap();
    capture.datagrams
}

/// Feeds `datagrams` to a fresh server role and returns the reassembled
/// payload alongside the number of completion calls.
fn reassemble(datagrams: &[Vec<u8>], sender: PeerId) -> (Vec<u8>, usize) {
    let mut server = Server::new(pool(), config());
    let received = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));

    let received_in = received.clone();
    let completions_in = completions.clone();
    server.on_complete(TYPE_ID, move |message, from| {
        assert_eq!(from, sender);
        *received_in.lock().unwrap() = message.get_remaining_bytes();
        completions_in.fetch_add(1, Ordering::SeqCst);
    });

    for datagram in datagrams {
        server.handle_datagram(datagram, sender);
    }

    let payload = received.lock().unwrap().clone();
    (payload, completions.load(Ordering::SeqCst))
}

fn random_payload(len: usize) -> Vec<u8> {
    (0..len).map(|_| rand::random()).collect()
}

#[test]
fn splits_2500_bytes_into_three_slices() {
    let payload = random_payload(2500);
    let datagrams = split_payload(&payload);

    // One begin-descriptor plus ceil(2500 / 1237) = 3 slices.
    assert_eq!(datagrams.len(), 4);
}

#[test]
fn reassembles_in_ascending_order() {
    let payload = random_payload(2500);
    let datagrams = split_payload(&payload);

    let (rebuilt, completions) = reassemble(&datagrams, 7);
    assert_eq!(rebuilt, payload);
    assert_eq!(completions, 1);
}

#[test]
fn reassembles_in_reverse_order() {
    let payload = random_payload(2500);
    let mut datagrams = split_payload(&payload);
    datagrams.reverse();

    let (rebuilt, completions) = reassemble(&datagrams, 7);
    assert_eq!(rebuilt, payload);
    assert_eq!(completions, 1);
}

#[test]
fn reassembles_in_random_order() {
    let payload = random_payload(20_000);
    for _ in 0..10 {
        let mut datagrams = split_payload(&payload);
        datagrams.shuffle(&mut rand::rng());

        let (rebuilt, completions) = reassemble(&datagrams, 7);
        assert_eq!(rebuilt, payload);
        assert_eq!(completions, 1);
    }
}

#[test]
fn duplicate_slice_never_double_counts() {
    let payload = random_payload(2500);
    let mut datagrams = split_payload(&payload);
    // Retransmit the second slice before the last one arrives.
    let duplicate = datagrams[2].clone();
    datagrams.insert(3, duplicate);

    let (rebuilt, completions) = reassemble(&datagrams, 7);
    assert_eq!(rebuilt, payload);
    assert_eq!(completions, 1);

    // A retransmit after completion is a silent no-op too.
    let payload = random_payload(2500);
    let mut datagrams = split_payload(&payload);
    let late = datagrams[1].clone();
    datagrams.push(late);
    let (rebuilt, completions) = reassemble(&datagrams, 7);
    assert_eq!(rebuilt, payload);
    assert_eq!(completions, 1);
}

#[test]
fn progress_is_monotonic_and_bounded() {
    let payload = random_payload(2500);
    let datagrams = split_payload(&payload);

    let mut server = Server::new(pool(), config());
    let reports = Arc::new(Mutex::new(Vec::new()));
    let reports_in = reports.clone();
    server.on_progress(TYPE_ID, move |progress| {
        reports_in
            .lock()
            .unwrap()
            .push((progress.received, progress.declared));
    });
    server.on_complete(TYPE_ID, |_, _| {});

    for datagram in &datagrams {
        server.handle_datagram(datagram, 1);
    }

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 3);
    let mut previous = 0;
    for &(received, declared) in reports.iter() {
        assert!(received > previous);
        assert!(received <= declared.unwrap());
        previous = received;
    }
}

#[test]
fn begin_descriptor_may_arrive_last() {
    let payload = random_payload(2500);
    let mut datagrams = split_payload(&payload);
    let begin = datagrams.remove(0);
    datagrams.push(begin);

    let (rebuilt, completions) = reassemble(&datagrams, 7);
    assert_eq!(rebuilt, payload);
    assert_eq!(completions, 1);
}

#[test]
fn small_message_goes_out_unsplit() {
    let pool = pool();
    let mut client = Client::new(pool.clone(), config());
    let mut server = Server::new(pool, config());
    let mut capture = Capture::default();

    let mut message = client.compose(TYPE_ID, SendMode::Unreliable).unwrap();
    message.add_str("hello").unwrap().add_u32(9).unwrap();
    client.send(&mut capture, message).unwrap();
    assert_eq!(capture.datagrams.len(), 1);

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in = seen.clone();
    server.on_complete(TYPE_ID, move |message, sender| {
        assert_eq!(sender, 42);
        assert_eq!(message.get_string().value(), "hello");
        assert_eq!(message.get_u32().value(), 9);
        seen_in.fetch_add(1, Ordering::SeqCst);
    });
    server.handle_datagram(&capture.datagrams[0], 42);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn server_broadcast_reaches_client_role() {
    let pool = pool();
    let mut server = Server::new(pool.clone(), config());
    let mut client = Client::new(pool, config());
    let mut capture = Capture::default();

    let payload = random_payload(5000);
    let mut message = server.compose(TYPE_ID, SendMode::Reliable).unwrap();
    message.add_bytes_raw(&payload).unwrap();
    server.broadcast(&mut capture, message).unwrap();
    assert!(capture.datagrams.len() > 2);

    let received = Arc::new(Mutex::new(Vec::new()));
    let received_in = received.clone();
    client.on_complete(TYPE_ID, move |message| {
        *received_in.lock().unwrap() = message.get_remaining_bytes();
    });
    for datagram in &capture.datagrams {
        client.handle_datagram(datagram);
    }
    assert_eq!(*received.lock().unwrap(), payload);
}

#[test]
fn stalled_reassembly_is_reported_and_dropped() {
    let payload = random_payload(2500);
    let datagrams = split_payload(&payload);

    let mut server = Server::new(pool(), config());
    let failures = Arc::new(Mutex::new(Vec::new()));
    let failures_in = failures.clone();
    server.on_failure(move |failure| {
        failures_in.lock().unwrap().push(failure.clone());
    });
    server.on_complete(TYPE_ID, |_, _| panic!("must never complete"));

    // Deliver the begin-descriptor and one slice, then lose the rest.
    server.handle_datagram(&datagrams[0], 7);
    server.handle_datagram(&datagrams[1], 7);

    server.reclaim_expired(Instant::now() + Duration::from_secs(30));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].type_id, Some(TYPE_ID));
    assert_eq!(failures[0].sender, Some(7));
    assert_eq!(failures[0].received, 1);
    assert_eq!(failures[0].declared, Some(3));
}

#[test]
fn slices_without_begin_expire_with_unknown_type() {
    let payload = random_payload(2500);
    let datagrams = split_payload(&payload);

    let mut client = Client::new(pool(), config());
    let failures = Arc::new(Mutex::new(Vec::new()));
    let failures_in = failures.clone();
    client.on_failure(move |failure| {
        failures_in.lock().unwrap().push(failure.clone());
    });

    // Only slices arrive; the begin-descriptor is lost forever.
    for datagram in &datagrams[1..] {
        client.handle_datagram(datagram);
    }

    client.reclaim_expired(Instant::now() + Duration::from_secs(30));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].type_id, None);
    assert_eq!(failures[0].received, 3);
    assert_eq!(failures[0].declared, None);
}

#[test]
fn truncated_datagrams_never_panic() {
    let payload = random_payload(2500);
    let datagrams = split_payload(&payload);

    let mut server = Server::new(pool(), config());
    server.on_complete(TYPE_ID, |_, _| {});

    for datagram in &datagrams {
        for cut in [0, 1, 2, 3, 5, 9] {
            let truncated = &datagram[..cut.min(datagram.len())];
            server.handle_datagram(truncated, 7);
        }
    }
    server.handle_datagram(&[], 7);
    server.handle_datagram(&[0xFF], 7);
}
