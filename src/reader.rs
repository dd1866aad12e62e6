use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use tracing::{error, trace};

use crate::config::Terminator;
use crate::constants::READ_CHUNK_SIZE;
use crate::link::SerialLink;
use crate::util::hex_dump;

/// One complete inbound message, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Background receive loop: pulls bytes off the link, accumulates them, and
/// emits a frame each time the accumulator ends with the terminator.
///
/// Frames travel over an unbounded channel, so a slow consumer never stalls
/// the loop. `stop` joins the worker before returning; once it has returned,
/// no further reads happen and no further frames appear.
pub struct FrameReader {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameReader {
    /// Attach to an open link and start splitting its byte stream.
    pub fn start(link: Arc<dyn SerialLink>, terminator: Terminator) -> (Self, Receiver<Frame>) {
        let (frame_tx, frame_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let loop_flag = Arc::clone(&running);
        let handle =
            std::thread::spawn(move || receive_loop(link, terminator, loop_flag, frame_tx));
        (
            FrameReader {
                running,
                handle: Some(handle),
            },
            frame_rx,
        )
    }

    /// Request the loop to exit and wait until it has. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    link: Arc<dyn SerialLink>,
    terminator: Terminator,
    running: Arc<AtomicBool>,
    frames: Sender<Frame>,
) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut accumulator: Vec<u8> = Vec::new();

    while running.load(Ordering::SeqCst) {
        let n = match link.read(&mut chunk) {
            Ok(n) => n,
            Err(e) => {
                error!("receive loop stopping: {e}");
                break;
            }
        };
        if n == 0 {
            // Poll window elapsed; loop back and re-check the running flag.
            continue;
        }
        trace!("rx {}", hex_dump(&chunk[..n]));

        for &byte in &chunk[..n] {
            accumulator.push(byte);
            if accumulator.ends_with(terminator.as_bytes()) {
                accumulator.truncate(accumulator.len() - terminator.len());
                let payload = std::mem::take(&mut accumulator);
                // The consumer may already be gone during shutdown; keep
                // draining the line until stop lands.
                let _ = frames.send(Frame { payload });
            }
        }
    }

    running.store(false, Ordering::SeqCst);
}
