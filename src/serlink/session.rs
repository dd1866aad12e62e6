use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use serlink::LinkSession;
use serlink::config::LineConfig;
use serlink::error::LinkResult;
use serlink::handshake::Handshake;

/// How long each turn of the loop waits on the frame channel before giving
/// the keyboard a chance.
const FRAME_POLL_MS: u64 = 50;

/// Drive one interactive session: stdin lines go out on the link, inbound
/// frames and ping results come back on stdout.
pub(crate) fn run(config: LineConfig) -> LinkResult<()> {
    let mut session = LinkSession::open(config)?;
    info!("link open: {}", session.config());
    println!("Type a line to send it, /ping for latency, /quit to exit.");

    let keys = spawn_stdin_pump();

    loop {
        // Inbound first, so a burst of frames lands on screen in order.
        while let Some(frame) = session.next_frame(Duration::from_millis(FRAME_POLL_MS)) {
            println!("<< {}", frame.text());
        }

        match keys.try_recv() {
            Ok(line) => match line.trim() {
                "/quit" | "/q" => break,
                "/ping" => {
                    let outcome = session.ping()?;
                    println!("ping: {outcome}");
                }
                "" => {}
                text => {
                    if session.send(text.as_bytes())? == Handshake::TimedOut {
                        warn!("peer not ready (DSR low), message not sent");
                    }
                }
            },
            Err(TryRecvError::Empty) => {}
            // stdin closed; treat like /quit.
            Err(TryRecvError::Disconnected) => break,
        }
    }

    // Reader stops (and is joined) before the device handle goes away.
    session.shutdown()
}

fn spawn_stdin_pump() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}
