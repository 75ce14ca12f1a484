//! Byte-stream collaborator consumed by the transport session.
//!
//! The session never talks to `serialport` directly; it drives a
//! [`ByteStream`], which keeps the correlation and framing logic
//! testable against synthetic byte sequences.

use crate::error::Result;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

/// Minimal half-duplex byte stream: write a burst, poll for incoming
/// bytes with a bounded wait, discard stale input.
pub trait ByteStream {
    /// Write the full buffer to the device.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever bytes arrive within `timeout`.
    ///
    /// Returns 0 when the wait elapsed with no byte; that quiet
    /// interval is how binary frame boundaries are detected.
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Discard any unread input.
    fn flush_input(&mut self) -> Result<()>;
}

/// [`ByteStream`] backed by a real serial port.
pub struct SerialStream {
    port: Box<dyn SerialPort>,
}

impl SerialStream {
    /// Open a serial port with the binary protocol configuration
    /// (8 data bits, 1 stop bit, no parity).
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(Duration::from_millis(100))
            .open()?;
        Ok(SerialStream { port })
    }

    /// Open a serial port with the legacy ASCII protocol configuration
    /// (8 data bits, 2 stop bits, no parity).
    pub fn open_legacy(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(crate::constants::LEGACY_STOP_BITS)
            .parity(serialport::Parity::None)
            .timeout(Duration::from_millis(100))
            .open()?;
        Ok(SerialStream { port })
    }

    /// List available serial ports.
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }
}

impl ByteStream for SerialStream {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}
