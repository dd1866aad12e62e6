use std::io::{Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use super::SerialLink;
use crate::config::{FlowMode, LineConfig};
use crate::constants::READ_POLL_MS;
use crate::error::{LinkError, LinkResult};
use crate::util::hex_dump;

/// Serial device link backed by a platform port handle.
///
/// The read and write sides are duplicated handles onto the same device, so
/// the receive loop's bounded-wait poll never holds up the send path. Modem
/// control shares the write half's lock: one DTR/DSR ioctl in flight at a
/// time, serializing gate polling against explicit DTR changes.
pub struct SerialPortLink {
    config: LineConfig,
    rx: Mutex<Option<Box<dyn SerialPort>>>,
    tx: Mutex<Option<Box<dyn SerialPort>>>,
}

impl SerialPortLink {
    /// Open `config.path` and apply the whole line discipline as one unit.
    /// A device that refuses any requested parameter never comes back open.
    pub fn open(config: LineConfig) -> LinkResult<Self> {
        let open_err = |source| LinkError::Open {
            path: config.path.clone(),
            source,
        };

        let mut builder = serialport::new(config.path.as_str(), config.baud.bits_per_second())
            .data_bits(config.char_size.data_bits())
            .parity(config.parity.parity())
            .stop_bits(config.stop_bits.stop_bits())
            .flow_control(config.flow.flow_control())
            .timeout(Duration::from_millis(READ_POLL_MS));
        if config.flow == FlowMode::DtrDsr {
            // The handshake gate owns the DTR line; keep it low until then.
            builder = builder.dtr_on_open(false);
        }
        let tx = builder.open().map_err(open_err)?;

        // Drop whatever was sitting in the driver's input queue before the
        // reader attaches.
        tx.clear(ClearBuffer::Input).map_err(open_err)?;
        let rx = tx.try_clone().map_err(open_err)?;

        debug!("opened {config}");
        Ok(SerialPortLink {
            config,
            rx: Mutex::new(Some(rx)),
            tx: Mutex::new(Some(tx)),
        })
    }

    pub fn config(&self) -> &LineConfig {
        &self.config
    }
}

impl SerialLink for SerialPortLink {
    fn write(&self, bytes: &[u8]) -> LinkResult<()> {
        let mut guard = self.tx.lock().expect("write half lock poisoned");
        let port = guard.as_mut().ok_or(LinkError::Closed)?;
        port.write_all(bytes).map_err(LinkError::Write)?;
        port.flush().map_err(LinkError::Write)?;
        trace!("tx {}", hex_dump(bytes));
        Ok(())
    }

    fn read(&self, buf: &mut [u8]) -> LinkResult<usize> {
        let mut guard = self.rx.lock().expect("read half lock poisoned");
        let port = guard.as_mut().ok_or(LinkError::Closed)?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            // Timeout just means nothing arrived within the poll window.
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(LinkError::Read(e)),
        }
    }

    fn set_dtr(&self, asserted: bool) -> LinkResult<()> {
        let mut guard = self.tx.lock().expect("write half lock poisoned");
        let port = guard.as_mut().ok_or(LinkError::Closed)?;
        port.write_data_terminal_ready(asserted)
            .map_err(LinkError::ModemControl)
    }

    fn dsr(&self) -> LinkResult<bool> {
        let mut guard = self.tx.lock().expect("write half lock poisoned");
        let port = guard.as_mut().ok_or(LinkError::Closed)?;
        port.read_data_set_ready().map_err(LinkError::ModemControl)
    }

    fn close(&self) -> LinkResult<()> {
        // Take both halves; a second close finds nothing and is a no-op.
        let rx = self.rx.lock().expect("read half lock poisoned").take();
        let tx = self.tx.lock().expect("write half lock poisoned").take();
        if rx.is_some() || tx.is_some() {
            debug!("closed {}", self.config.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.tx.lock().expect("write half lock poisoned").is_some()
    }
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
