/// Bounded wait applied to every receive poll.
pub(crate) const READ_POLL_MS: u64 = 100;

/// Largest chunk pulled off the line per poll.
pub(crate) const READ_CHUNK_SIZE: usize = 256;

/// Interval between DSR samples while the handshake gate is waiting.
pub(crate) const DSR_POLL_MICROS: u64 = 1000;

/// How long the gate waits for the peer's DSR before giving up.
pub(crate) const HANDSHAKE_TIMEOUT_MS: u64 = 1000;

/// Interval between reply-flag checks while a probe is outstanding.
pub(crate) const REPLY_POLL_MICROS: u64 = 1000;

/// How long a probe waits for its reply before giving up.
pub(crate) const PING_TIMEOUT_MS: u64 = 3000;
