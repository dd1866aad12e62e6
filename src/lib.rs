use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::info;

pub mod config;
pub(crate) mod constants;
pub mod error;
pub mod handshake;
pub mod link;
pub mod ping;
pub mod ports;
pub mod reader;
pub(crate) mod util;

use config::LineConfig;
use error::LinkResult;
use handshake::{Handshake, HandshakeGate};
use link::SerialLink;
use link::serialport::SerialPortLink;
use ping::{PROBE_BYTE, PingOutcome, PingProbe, ReplySignal};
use reader::{Frame, FrameReader};

/// One live serial session: an open link, its background frame reader, and
/// the send-side handshake and liveness machinery wired together.
///
/// Inbound frames pass through a routing thread that peels off probe replies
/// and forwards everything else to `next_frame`'s channel, so a blocking
/// `ping` still sees its reply arrive.
pub struct LinkSession {
    link: Arc<dyn SerialLink>,
    config: LineConfig,
    reader: FrameReader,
    router: Option<JoinHandle<()>>,
    frames: Receiver<Frame>,
    gate: HandshakeGate,
    probe: PingProbe,
}

impl LinkSession {
    /// Open the device described by `config` and start receiving.
    pub fn open(config: LineConfig) -> LinkResult<Self> {
        let link: Arc<dyn SerialLink> = Arc::new(SerialPortLink::open(config.clone())?);
        Ok(Self::attach(link, config))
    }

    /// Wire a session onto an already-open link.
    pub fn attach(link: Arc<dyn SerialLink>, config: LineConfig) -> Self {
        let (reader, inbound) = FrameReader::start(Arc::clone(&link), config.terminator.clone());
        let probe = PingProbe::new();
        let reply = probe.reply_signal();
        let (frame_tx, frames) = mpsc::channel();
        let router = std::thread::spawn(move || route_frames(inbound, reply, frame_tx));

        let gate = HandshakeGate::new(config.flow);
        LinkSession {
            link,
            config,
            reader,
            router: Some(router),
            frames,
            gate,
            probe,
        }
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// Send one message, framed with the configured terminator unless the
    /// payload already carries it. Returns `Handshake::TimedOut` without
    /// transmitting when the peer never signalled ready.
    pub fn send(&self, payload: &[u8]) -> LinkResult<Handshake> {
        if self.gate.guard(self.link.as_ref())? == Handshake::TimedOut {
            return Ok(Handshake::TimedOut);
        }

        let terminator = self.config.terminator.as_bytes();
        let mut framed = Vec::with_capacity(payload.len() + terminator.len());
        framed.extend_from_slice(payload);
        if !payload.ends_with(terminator) {
            framed.extend_from_slice(terminator);
        }
        self.link.write(&framed)?;
        Ok(Handshake::Ready)
    }

    /// Wait up to `wait` for the next inbound frame.
    pub fn next_frame(&self, wait: Duration) -> Option<Frame> {
        match self.frames.recv_timeout(wait) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Measure round-trip latency over the link.
    pub fn ping(&self) -> LinkResult<PingOutcome> {
        self.probe.probe(self.link.as_ref(), &self.gate)
    }

    /// Stop the frame reader, join the router, then release the device, in
    /// that order, so nothing reads a handle that is going away.
    pub fn shutdown(&mut self) -> LinkResult<()> {
        self.reader.stop();
        if let Some(router) = self.router.take() {
            let _ = router.join();
        }
        if self.link.is_open() {
            info!("closing {}", self.config.path);
        }
        self.link.close()
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Forward inbound frames to the consumer, peeling off probe replies: a
/// frame carrying exactly the probe byte while a probe is outstanding
/// answers that probe instead of reaching the display.
fn route_frames(inbound: Receiver<Frame>, reply: ReplySignal, outbound: Sender<Frame>) {
    for frame in inbound {
        if reply.is_pending() && frame.payload == [PROBE_BYTE] {
            reply.reply_received();
            continue;
        }
        if outbound.send(frame).is_err() {
            break;
        }
    }
}
