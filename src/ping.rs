use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::constants::{PING_TIMEOUT_MS, REPLY_POLL_MICROS};
use crate::error::LinkResult;
use crate::handshake::{Handshake, HandshakeGate};
use crate::link::SerialLink;

/// Reserved liveness probe byte, sent bare with no terminator.
pub const PROBE_BYTE: u8 = 0x00;

/// Result of one liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    RoundTrip(Duration),
    TimedOut,
}

impl fmt::Display for PingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingOutcome::RoundTrip(rtt) => write!(f, "{:.1} ms", rtt.as_secs_f64() * 1000.0),
            PingOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Clearing handle for whoever recognizes probe replies in the inbound
/// frame stream.
#[derive(Clone)]
pub struct ReplySignal(Arc<AtomicBool>);

impl ReplySignal {
    /// Mark the outstanding probe as answered.
    pub fn reply_received(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Measures round-trip latency by writing the reserved probe byte and
/// clocking the time until the reply signal fires.
///
/// The probe itself does not watch the frame stream; whoever does (see
/// `LinkSession`) clears the signal through `reply_signal`.
pub struct PingProbe {
    pending: Arc<AtomicBool>,
    deadline: Duration,
}

impl PingProbe {
    pub fn new() -> Self {
        Self::with_deadline(Duration::from_millis(PING_TIMEOUT_MS))
    }

    pub fn with_deadline(deadline: Duration) -> Self {
        PingProbe {
            pending: Arc::new(AtomicBool::new(false)),
            deadline,
        }
    }

    pub fn reply_signal(&self) -> ReplySignal {
        ReplySignal(Arc::clone(&self.pending))
    }

    /// Send one probe and wait for the reply signal, sleep-polling so the
    /// surrounding system stays responsive. A handshake gate timeout aborts
    /// the probe without transmitting.
    pub fn probe(&self, link: &dyn SerialLink, gate: &HandshakeGate) -> LinkResult<PingOutcome> {
        self.pending.store(true, Ordering::SeqCst);

        if gate.guard(link)? == Handshake::TimedOut {
            debug!("probe abandoned, peer never signalled ready");
            self.pending.store(false, Ordering::SeqCst);
            return Ok(PingOutcome::TimedOut);
        }

        let started = Instant::now();
        link.write(&[PROBE_BYTE])?;

        while started.elapsed() < self.deadline {
            if !self.pending.load(Ordering::SeqCst) {
                let rtt = started.elapsed();
                debug!("probe answered in {rtt:?}");
                return Ok(PingOutcome::RoundTrip(rtt));
            }
            thread::sleep(Duration::from_micros(REPLY_POLL_MICROS));
        }

        self.pending.store(false, Ordering::SeqCst);
        Ok(PingOutcome::TimedOut)
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new()
    }
}
