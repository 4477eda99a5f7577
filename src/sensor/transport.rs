//! Raw byte transport to the fingerprint module.
//!
//! The packet layer talks to the module through this trait so tests can
//! substitute a scripted transport for the real UART.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::collections::VecDeque;
use std::time::Duration;

/// Blocking byte I/O to the sensor module.
pub trait SensorTransport {
    /// Read exactly `buf.len()` bytes.
    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()>;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Block until pending writes are on the wire.
    fn flush(&mut self) -> std::io::Result<()>;
}

impl<T: SensorTransport + ?Sized> SensorTransport for &mut T {
    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        (**self).read_exact(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        (**self).flush()
    }
}

/// Serial transport for the module's UART.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (e.g., 57600)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            // Generous fixed timeout; the module answers within tens of ms
            .timeout(Duration::from_secs(2))
            .open()?;

        tracing::info!(path, baud_rate, "Opened sensor serial port");

        Ok(SerialTransport { port })
    }
}

impl SensorTransport for SerialTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        std::io::Read::read_exact(&mut self.port, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        std::io::Write::write_all(&mut self.port, data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut self.port)
    }
}

/// Scripted transport for unit testing.
///
/// Bytes queued with [`MockTransport::inject_read`] are served to the packet
/// layer in order; everything written is captured for inspection.
#[derive(Default)]
pub struct MockTransport {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue data to be read by the code under test.
    pub fn inject_read(&mut self, data: &[u8]) {
        self.read_buffer.extend(data);
    }

    /// All bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Drop captured writes.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Bytes still queued for reading.
    pub fn unread(&self) -> usize {
        self.read_buffer.len()
    }
}

impl SensorTransport for MockTransport {
    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        if self.read_buffer.len() < buf.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "mock transport read underrun",
            ));
        }
        for slot in buf.iter_mut() {
            *slot = self.read_buffer.pop_front().unwrap();
        }
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
