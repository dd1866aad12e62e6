use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serlink::LinkSession;
use serlink::config::{
    BaudRate, CharSize, FlowMode, LineConfig, ParityMode, StopBitsMode, Terminator,
};
use serlink::error::LinkResult;
use serlink::handshake::{Handshake, HandshakeGate};
use serlink::link::SerialLink;
use serlink::ping::{PROBE_BYTE, PingOutcome, PingProbe};
use serlink::reader::{Frame, FrameReader};

/// In-memory stand-in for a serial device: scripted inbound chunks,
/// recorded outbound bytes, switchable modem lines, and a read-call counter
/// for shutdown assertions.
#[derive(Default)]
struct FakeLink {
    inbound: Mutex<VecDeque<Vec<u8>>>,
    outbound: Mutex<Vec<u8>>,
    dsr: AtomicBool,
    dtr: AtomicBool,
    reads: AtomicUsize,
    open: AtomicBool,
}

impl FakeLink {
    fn new() -> Arc<Self> {
        Arc::new(FakeLink {
            open: AtomicBool::new(true),
            ..Default::default()
        })
    }

    fn push_inbound(&self, chunk: &[u8]) {
        self.inbound.lock().unwrap().push_back(chunk.to_vec());
    }

    fn outbound(&self) -> Vec<u8> {
        self.outbound.lock().unwrap().clone()
    }

    fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn set_dsr(&self, level: bool) {
        self.dsr.store(level, Ordering::SeqCst);
    }

    fn dtr_level(&self) -> bool {
        self.dtr.load(Ordering::SeqCst)
    }
}

impl SerialLink for FakeLink {
    fn write(&self, bytes: &[u8]) -> LinkResult<()> {
        self.outbound.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> LinkResult<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut inbound = self.inbound.lock().unwrap();
            match inbound.pop_front() {
                Some(mut chunk) => {
                    if chunk.len() > buf.len() {
                        let rest = chunk.split_off(buf.len());
                        inbound.push_front(rest);
                    }
                    Some(chunk)
                }
                None => None,
            }
        };
        match next {
            Some(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => {
                // Bounded-wait poll, nothing arrived.
                thread::sleep(Duration::from_millis(5));
                Ok(0)
            }
        }
    }

    fn set_dtr(&self, asserted: bool) -> LinkResult<()> {
        self.dtr.store(asserted, Ordering::SeqCst);
        Ok(())
    }

    fn dsr(&self) -> LinkResult<bool> {
        Ok(self.dsr.load(Ordering::SeqCst))
    }

    fn close(&self) -> LinkResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn collect_frames(rx: &std::sync::mpsc::Receiver<Frame>, n: usize) -> Vec<Frame> {
    let mut frames = Vec::new();
    while frames.len() < n {
        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(frame) => frames.push(frame),
            Err(e) => panic!("expected {n} frames, got {} ({e})", frames.len()),
        }
    }
    frames
}

fn config_for(link_flow: FlowMode) -> LineConfig {
    LineConfig {
        path: "/dev/null".to_string(),
        baud: BaudRate::B9600,
        char_size: CharSize::Eight,
        parity: ParityMode::None,
        stop_bits: StopBitsMode::One,
        flow: link_flow,
        terminator: Terminator::crlf(),
    }
}

#[test]
fn reader_emits_terminated_messages_in_order() {
    let fake = FakeLink::new();
    fake.push_inbound(b"msg1\r\nmsg2\r\n");

    let (mut reader, frames) = FrameReader::start(fake.clone(), Terminator::crlf());
    let got = collect_frames(&frames, 2);
    reader.stop();

    assert_eq!(got[0].payload, b"msg1");
    assert_eq!(got[1].payload, b"msg2");
}

#[test]
fn reader_is_invariant_to_chunking() {
    let stream = b"msg1\r\nmsg2\r\n";

    let fake = FakeLink::new();
    for byte in stream {
        fake.push_inbound(&[*byte]);
    }

    let (mut reader, frames) = FrameReader::start(fake.clone(), Terminator::crlf());
    let got = collect_frames(&frames, 2);
    reader.stop();

    assert_eq!(got[0].payload, b"msg1");
    assert_eq!(got[1].payload, b"msg2");
}

#[test]
fn reader_holds_partial_frames_until_completed() {
    let fake = FakeLink::new();
    fake.push_inbound(b"never terminated");

    let (mut reader, frames) = FrameReader::start(fake.clone(), Terminator::crlf());
    assert!(frames.recv_timeout(Duration::from_millis(200)).is_err());

    // Completing the frame later releases the whole buffered payload.
    fake.push_inbound(b"\r\n");
    let got = collect_frames(&frames, 1);
    reader.stop();
    assert_eq!(got[0].payload, b"never terminated");
}

#[test]
fn reader_stop_is_synchronous() {
    let fake = FakeLink::new();
    let (mut reader, _frames) = FrameReader::start(fake.clone(), Terminator::crlf());

    // Let the loop spin a little first.
    thread::sleep(Duration::from_millis(50));
    reader.stop();
    assert!(!reader.is_running());

    let after_stop = fake.read_count();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(fake.read_count(), after_stop, "reads continued after stop");
}

#[test]
fn gate_passes_immediately_without_dtr_dsr_flow() {
    let fake = FakeLink::new();
    fake.set_dsr(false);

    let gate = HandshakeGate::new(FlowMode::None);
    let started = Instant::now();
    assert_eq!(gate.guard(fake.as_ref()).unwrap(), Handshake::Ready);
    assert!(started.elapsed() < Duration::from_millis(50));
    // The gate never touched the modem lines.
    assert!(!fake.dtr_level());
}

#[test]
fn gate_waits_for_dsr_then_reports_ready() {
    let fake = FakeLink::new();
    fake.set_dsr(true);

    let gate = HandshakeGate::new(FlowMode::DtrDsr);
    assert_eq!(gate.guard(fake.as_ref()).unwrap(), Handshake::Ready);
    // DTR stays asserted for the transmission that follows.
    assert!(fake.dtr_level());
}

#[test]
fn gate_times_out_and_clears_dtr_when_dsr_never_asserts() {
    let fake = FakeLink::new();
    fake.set_dsr(false);

    let deadline = Duration::from_millis(100);
    let gate = HandshakeGate::with_deadline(FlowMode::DtrDsr, deadline);
    let started = Instant::now();
    assert_eq!(gate.guard(fake.as_ref()).unwrap(), Handshake::TimedOut);
    let elapsed = started.elapsed();

    assert!(elapsed >= deadline, "gave up early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(500), "gave up late: {elapsed:?}");
    assert!(!fake.dtr_level(), "DTR left asserted after timeout");
}

#[test]
fn probe_measures_round_trip_latency() {
    let fake = FakeLink::new();
    let gate = HandshakeGate::new(FlowMode::None);
    let probe = PingProbe::new();

    let reply = probe.reply_signal();
    let answerer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        reply.reply_received();
    });

    let outcome = probe.probe(fake.as_ref(), &gate).unwrap();
    answerer.join().unwrap();

    match outcome {
        PingOutcome::RoundTrip(rtt) => {
            assert!(rtt >= Duration::from_millis(40), "too fast: {rtt:?}");
            assert!(rtt < Duration::from_millis(300), "too slow: {rtt:?}");
        }
        PingOutcome::TimedOut => panic!("probe timed out despite a reply"),
    }
    assert_eq!(fake.outbound(), vec![PROBE_BYTE]);
}

#[test]
fn probe_times_out_when_no_reply_arrives() {
    let fake = FakeLink::new();
    let gate = HandshakeGate::new(FlowMode::None);

    let deadline = Duration::from_millis(150);
    let probe = PingProbe::with_deadline(deadline);
    let started = Instant::now();
    let outcome = probe.probe(fake.as_ref(), &gate).unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, PingOutcome::TimedOut);
    assert!(elapsed >= deadline, "gave up early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "gave up late: {elapsed:?}");
}

#[test]
fn session_routes_frames_sends_framed_text_and_answers_pings() {
    let fake = FakeLink::new();
    let mut session = LinkSession::attach(fake.clone(), config_for(FlowMode::None));

    // Inbound frames reach the consumer with the terminator stripped.
    fake.push_inbound(b"hello\r\nworld\r\n");
    let first = session.next_frame(Duration::from_secs(2)).unwrap();
    let second = session.next_frame(Duration::from_secs(2)).unwrap();
    assert_eq!(first.text(), "hello");
    assert_eq!(second.text(), "world");

    // Sends carry the terminator; an already-terminated payload is not
    // framed twice.
    session.send(b"out").unwrap();
    assert_eq!(fake.outbound(), b"out\r\n");
    session.send(b"done\r\n").unwrap();
    assert_eq!(fake.outbound(), b"out\r\ndone\r\n");

    // A probe-byte frame while a ping is outstanding answers the ping and
    // never reaches the display.
    let echo = {
        let fake = fake.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            fake.push_inbound(&[PROBE_BYTE, b'\r', b'\n']);
        })
    };
    let outcome = session.ping().unwrap();
    echo.join().unwrap();
    assert!(matches!(outcome, PingOutcome::RoundTrip(_)), "{outcome:?}");
    assert!(session.next_frame(Duration::from_millis(100)).is_none());

    // Shutdown stops the reader before releasing the device.
    session.shutdown().unwrap();
    let after_stop = fake.read_count();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(fake.read_count(), after_stop);
    assert!(!fake.is_open());
}
