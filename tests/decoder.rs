//! End to end tests for the Wiegand decoder
//!
//! Tests cover:
//! - Bit accumulation through subscribed edge sources
//! - Finalize on silence and idle behaviour
//! - Rejection of unregistered ports
//! - Edges racing the poller and each other
//! - Handlers that panic

use rppal_wiegand::{
    CardData, Clock, DecoderConfig, Edge, EdgeSink, EdgeSource, ManualClock, PortId, Result,
    WiegandDecoder, WiegandError,
};
use std::sync::mpsc::{self, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const DATA0: PortId = 17;
const DATA1: PortId = 27;
const WAIT: Duration = Duration::from_secs(5);

/// An edge source the test drives by hand
#[derive(Clone)]
struct FakeLine {
    port: PortId,
    sink: Arc<Mutex<Option<EdgeSink>>>,
}

impl FakeLine {
    fn new(port: PortId) -> FakeLine {
        FakeLine {
            port,
            sink: Arc::new(Mutex::new(None)),
        }
    }

    fn pulse(&self, edge: Edge) {
        let mut sink = self.sink.lock().unwrap();
        (sink.as_mut().expect("not subscribed"))(edge);
    }
}

impl EdgeSource for FakeLine {
    fn port(&self) -> PortId {
        self.port
    }

    fn subscribe(&mut self, sink: EdgeSink) -> Result<()> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }
}

struct Rig {
    clock: Arc<ManualClock>,
    data0: FakeLine,
    data1: FakeLine,
    decoder: WiegandDecoder,
    cards: Receiver<CardData>,
}

impl Rig {
    fn new() -> Rig {
        let clock = Arc::new(ManualClock::new());
        let mut data0 = FakeLine::new(DATA0);
        let mut data1 = FakeLine::new(DATA1);
        let decoder = WiegandDecoder::new(
            Some(&mut data0),
            Some(&mut data1),
            DecoderConfig::default().with_clock(clock.clone()),
        )
        .unwrap();
        let (tx, cards) = mpsc::channel();

        decoder.on_card_decoded(move |event| tx.send(event.card).unwrap());

        Rig {
            clock,
            data0,
            data1,
            decoder,
            cards,
        }
    }

    fn send_bits(&self, bits: u64, count: u32) {
        for i in (0..count).rev() {
            let edge_time = self.clock.now();

            if bits >> i & 1 == 1 {
                self.data1.pulse(Edge::new(DATA1, edge_time));
            } else {
                self.data0.pulse(Edge::new(DATA0, edge_time));
            }

            // Wiegand bits are ~2ms apart, well inside the timeout
            self.clock.advance(Duration::from_millis(2));
        }
    }

    fn go_quiet(&self) {
        self.clock.advance(Duration::from_millis(501));
    }
}

#[test]
fn accumulates_bits_in_arrival_order() {
    let rig = Rig::new();
    let card = CardData::from_fields(42, 31337);

    rig.send_bits(card.raw(), 26);

    assert_eq!(rig.decoder.pending_frame(), card.raw());
}

#[test]
fn finalizes_exactly_once_after_silence() {
    let rig = Rig::new();
    let card = CardData::from_fields(42, 31337);

    rig.send_bits(card.raw(), 26);
    rig.go_quiet();

    let decoded = rig.cards.recv_timeout(WAIT).unwrap();

    assert_eq!(decoded, card);
    assert!(decoded.is_valid());
    assert_eq!(decoded.facility_code(), 42);
    assert_eq!(decoded.card_number(), 31337);
    assert_eq!(rig.decoder.pending_frame(), 0);

    rig.clock.advance(Duration::from_secs(10));
    thread::sleep(Duration::from_millis(50));
    assert!(rig.cards.try_recv().is_err());
}

#[test]
fn does_not_finalize_while_bits_keep_arriving() {
    let rig = Rig::new();

    rig.send_bits(0b1011, 4);
    rig.clock.advance(Duration::from_millis(400));
    thread::sleep(Duration::from_millis(50));

    assert!(rig.cards.try_recv().is_err());
    assert_eq!(rig.decoder.pending_frame(), 0b1011);
}

#[test]
fn short_frames_are_still_emitted() {
    let rig = Rig::new();

    rig.send_bits(0b11_0101_0011, 10);
    rig.go_quiet();

    let decoded = rig.cards.recv_timeout(WAIT).unwrap();

    assert_eq!(decoded.raw(), 0b11_0101_0011);
    assert!(!decoded.is_valid());
}

#[test]
fn consecutive_frames_are_reported_separately() {
    let rig = Rig::new();
    let first = CardData::from_fields(1, 100);
    let second = CardData::from_fields(2, 200);

    rig.send_bits(first.raw(), 26);
    rig.go_quiet();
    assert_eq!(rig.cards.recv_timeout(WAIT).unwrap(), first);

    rig.send_bits(second.raw(), 26);
    rig.go_quiet();
    assert_eq!(rig.cards.recv_timeout(WAIT).unwrap(), second);
}

#[test]
fn idle_decoder_never_emits() {
    let rig = Rig::new();

    rig.clock.advance(Duration::from_secs(3600));
    thread::sleep(Duration::from_millis(50));

    assert!(rig.cards.try_recv().is_err());
}

#[test]
fn unregistered_port_is_rejected_without_mutation() {
    let rig = Rig::new();

    rig.send_bits(0b101, 3);

    let result = rig.decoder.handle_edge(Edge::new(5, rig.clock.now()));

    assert!(matches!(
        result,
        Err(WiegandError::InvalidPort {
            port: 5,
            data0: DATA0,
            data1: DATA1
        })
    ));
    assert_eq!(rig.decoder.pending_frame(), 0b101);
}

#[test]
fn miswired_source_halts_the_decoder() {
    let rig = Rig::new();

    // The DATA1 line reports a port it was not registered under
    rig.data1.pulse(Edge::new(9, rig.clock.now()));

    assert!(!rig.decoder.is_running());
    assert!(matches!(
        rig.decoder.take_fault(),
        Some(WiegandError::InvalidPort { port: 9, .. })
    ));
    assert!(rig.decoder.take_fault().is_none());
}

#[test]
fn dropping_the_decoder_stops_notifications() {
    let Rig {
        clock,
        data1,
        decoder,
        cards,
        ..
    } = Rig::new();

    drop(decoder);
    data1.pulse(Edge::new(DATA1, clock.now()));
    clock.advance(Duration::from_secs(1));
    thread::sleep(Duration::from_millis(50));

    assert!(cards.try_recv().is_err());
}

#[test]
fn panicking_handler_does_not_stop_decoding() {
    let clock = Arc::new(ManualClock::new());
    let mut data0 = FakeLine::new(DATA0);
    let mut data1 = FakeLine::new(DATA1);
    let decoder = WiegandDecoder::new(
        Some(&mut data0),
        Some(&mut data1),
        DecoderConfig::default().with_clock(clock.clone()),
    )
    .unwrap();
    let (tx, cards) = mpsc::channel();
    let calls = AtomicUsize::new(0);

    decoder.on_card_decoded(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("reader handler failed");
        }
    });
    decoder.on_card_decoded(move |event| tx.send(event.card).unwrap());

    data1.pulse(Edge::new(DATA1, clock.now()));
    clock.advance(Duration::from_secs(1));
    assert_eq!(cards.recv_timeout(WAIT).unwrap().raw(), 1);

    data1.pulse(Edge::new(DATA1, clock.now()));
    data0.pulse(Edge::new(DATA0, clock.now()));
    clock.advance(Duration::from_secs(1));
    assert_eq!(cards.recv_timeout(WAIT).unwrap().raw(), 0b10);

    assert!(decoder.is_running());
    assert_eq!(decoder.pending_frame(), 0);
    assert!(matches!(
        decoder.take_fault(),
        Some(WiegandError::HandlerPanicked(msg)) if msg == "reader handler failed"
    ));
}

#[test]
fn edges_during_notification_start_the_next_frame() {
    let rig = Rig::new();
    let (entered_tx, entered) = mpsc::channel();
    let (release, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    rig.decoder.on_card_decoded(move |_| {
        entered_tx.send(()).unwrap();
        let _ = release_rx.lock().unwrap().recv_timeout(WAIT);
    });

    rig.send_bits(0b1101, 4);
    rig.go_quiet();
    entered.recv_timeout(WAIT).unwrap();

    // The handler is still blocked, so this bit lands mid-notification
    rig.data1.pulse(Edge::new(DATA1, rig.clock.now()));
    assert_eq!(rig.decoder.pending_frame(), 1);

    release.send(()).unwrap();
    assert_eq!(rig.cards.recv_timeout(WAIT).unwrap().raw(), 0b1101);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(rig.decoder.pending_frame(), 1);
}

#[test]
fn concurrent_edges_are_not_lost() {
    const PER_THREAD: u32 = 30;
    let rig = Rig::new();
    let edge_time = rig.clock.now();
    let data1 = &rig.data1;
    let decoder = &rig.decoder;

    // One thread goes through the line's subscription, the other straight in
    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..PER_THREAD {
                data1.pulse(Edge::new(DATA1, edge_time));
            }
        });
        s.spawn(|| {
            for _ in 0..PER_THREAD {
                decoder.handle_edge(Edge::new(DATA1, edge_time)).unwrap();
            }
        });
    });

    assert_eq!(rig.decoder.pending_frame().count_ones(), 2 * PER_THREAD);
}
