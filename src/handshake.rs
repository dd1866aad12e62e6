use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::FlowMode;
use crate::constants::{DSR_POLL_MICROS, HANDSHAKE_TIMEOUT_MS};
use crate::error::LinkResult;
use crate::link::SerialLink;

/// Outcome of a pre-send handshake check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    Ready,
    TimedOut,
}

/// Gates each transmission on the DTR/DSR hardware handshake.
///
/// For every other flow control mode the gate passes immediately; those are
/// either handled by the line discipline or not at all.
pub struct HandshakeGate {
    flow: FlowMode,
    deadline: Duration,
}

impl HandshakeGate {
    pub fn new(flow: FlowMode) -> Self {
        Self::with_deadline(flow, Duration::from_millis(HANDSHAKE_TIMEOUT_MS))
    }

    pub fn with_deadline(flow: FlowMode, deadline: Duration) -> Self {
        HandshakeGate { flow, deadline }
    }

    /// Raise DTR and busy-poll the peer's DSR until it asserts or the
    /// deadline passes. On timeout DTR is dropped again and the caller must
    /// not transmit.
    pub fn guard(&self, link: &dyn SerialLink) -> LinkResult<Handshake> {
        if self.flow != FlowMode::DtrDsr {
            return Ok(Handshake::Ready);
        }

        link.set_dtr(true)?;
        let started = Instant::now();
        while started.elapsed() < self.deadline {
            if link.dsr()? {
                return Ok(Handshake::Ready);
            }
            thread::sleep(Duration::from_micros(DSR_POLL_MICROS));
        }

        warn!("DSR not asserted within {:?}, dropping DTR", self.deadline);
        link.set_dtr(false)?;
        Ok(Handshake::TimedOut)
    }
}
