pub mod serialport;

use crate::error::LinkResult;

/// Byte-level access to an open serial line. The frame reader, handshake
/// gate and ping probe all talk through this seam, so tests can swap in an
/// in-memory device.
pub trait SerialLink: Send + Sync {
    /// Write raw bytes as given. Framing is the caller's business.
    fn write(&self, bytes: &[u8]) -> LinkResult<()>;

    /// Bounded-wait poll for input. Returns 0 when nothing arrived in time;
    /// that is the normal idle case, not an error.
    fn read(&self, buf: &mut [u8]) -> LinkResult<usize>;

    /// Raise or drop the DTR modem line.
    fn set_dtr(&self, asserted: bool) -> LinkResult<()>;

    /// Sample the peer's DSR modem line.
    fn dsr(&self) -> LinkResult<bool>;

    /// Release the device handle. Safe to call more than once; operations
    /// after the first close fail with `LinkError::Closed`.
    fn close(&self) -> LinkResult<()>;

    /// Whether the handle is still held.
    fn is_open(&self) -> bool;
}
