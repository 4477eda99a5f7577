//! Fingerprint module link.
//!
//! The module speaks a framed request/acknowledgement packet protocol over
//! its UART. This module provides the framing ([`packet`]), the raw byte
//! transport seam ([`transport`]) and the high-level command surface
//! ([`link`]), including the chunked template download the module's stock
//! driver surface does not expose.

pub mod link;
pub mod packet;
pub mod transport;

// Re-export commonly used types
pub use link::SensorLink;
pub use transport::{MockTransport, SensorTransport, SerialTransport};

/// Which exchange with the module an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Clearing the onboard template table
    Clear,
    /// Capturing a live finger image
    Capture,
    /// Converting a captured image into a template slot
    Convert,
    /// Fusing the two template slots
    Fuse,
    /// Persisting buffer slot 1 into the template table
    Store,
    /// Announcing an incoming template transfer
    Handshake,
    /// Transferring a template data chunk
    Data,
    /// Reading a template back out of the buffer
    Upload,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Clear => "clear",
            Stage::Capture => "capture",
            Stage::Convert => "convert",
            Stage::Fuse => "fuse",
            Stage::Store => "store",
            Stage::Handshake => "handshake",
            Stage::Data => "data",
            Stage::Upload => "upload",
        };
        write!(f, "{name}")
    }
}

/// Errors raised on the sensor link.
///
/// After any error the caller must not assume bytes past the failure point
/// were accepted by the module.
#[derive(Debug)]
pub enum SensorError {
    /// Serial transport failure
    Io(std::io::Error),
    /// Framing violation: the byte stream no longer parses as packets
    Desync(String),
    /// The module answered, but with a non-success status
    Protocol { stage: Stage, code: u8 },
    /// A bounded poll or transfer exhausted its attempt budget
    Timeout { stage: Stage },
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::Io(e) => write!(f, "Sensor transport error: {e}"),
            SensorError::Desync(msg) => write!(f, "Sensor link desync: {msg}"),
            SensorError::Protocol { stage, code } => {
                write!(f, "Sensor rejected {stage} (status {code:#04x})")
            }
            SensorError::Timeout { stage } => write!(f, "Sensor {stage} timed out"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<std::io::Error> for SensorError {
    fn from(e: std::io::Error) -> Self {
        SensorError::Io(e)
    }
}
