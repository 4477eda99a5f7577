//! High-level command surface for the fingerprint module.
//!
//! Wraps the packet layer into the operations the rest of the agent needs:
//! clearing the template table, capturing and fusing live readings, and the
//! chunked template download ([`SensorLink::push_template`]) that has to be
//! hand-built from the packet framing because the module's stock driver
//! surface has no "load template" primitive.

use super::packet::{
    self, ACK_NO_FINGER, ACK_SUCCESS, CMD_CAPTURE_IMAGE, CMD_CLEAR_ALL, CMD_FUSE_TEMPLATES,
    CMD_IMAGE_TO_TEMPLATE, CMD_PULL_TEMPLATE, CMD_PUSH_TEMPLATE, CMD_STORE_TEMPLATE,
    DATA_CHUNK_LEN, PID_COMMAND, PID_DATA, PID_END_DATA,
};
use super::transport::SensorTransport;
use super::{SensorError, Stage};
use std::time::Duration;

/// Template buffer slot used for all transfers; also holds the first
/// enrollment reading.
pub const FIRST_SLOT: u8 = 0x01;

/// Second buffer slot, used for the re-read during enrollment.
pub const SECOND_SLOT: u8 = 0x02;

const TRANSFER_SLOT: u8 = FIRST_SLOT;

/// Default bounded finger-poll budget.
const FINGER_POLL_ATTEMPTS: u32 = 50;

/// Fixed delay between finger polls.
const FINGER_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Upper bound on data packets in one template upload.
const MAX_UPLOAD_PACKETS: usize = 256;

/// Command/acknowledgement session with the fingerprint module.
pub struct SensorLink<T: SensorTransport> {
    transport: T,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl<T: SensorTransport> SensorLink<T> {
    /// Create a link with default polling budgets.
    pub fn new(transport: T) -> Self {
        Self::with_polling(transport, FINGER_POLL_ATTEMPTS, FINGER_POLL_INTERVAL)
    }

    /// Create a link with explicit polling budgets.
    pub fn with_polling(transport: T, poll_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_attempts,
            poll_interval,
        }
    }

    /// Access the underlying transport (test hook).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Clear the module's entire onboard template table.
    pub fn clear_all(&mut self) -> Result<(), SensorError> {
        self.command(Stage::Clear, &[CMD_CLEAR_ALL])
    }

    /// Attempt one live capture.
    ///
    /// Returns `Ok(true)` if an image was captured, `Ok(false)` if no finger
    /// is on the window.
    pub fn capture_image(&mut self) -> Result<bool, SensorError> {
        self.send_command(&[CMD_CAPTURE_IMAGE])?;
        match packet::read_ack(&mut self.transport)? {
            ACK_SUCCESS => Ok(true),
            ACK_NO_FINGER => Ok(false),
            code => Err(SensorError::Protocol {
                stage: Stage::Capture,
                code,
            }),
        }
    }

    /// Poll until a finger is placed, within the bounded attempt budget.
    pub fn wait_for_finger(&mut self) -> Result<(), SensorError> {
        for attempt in 0..self.poll_attempts {
            if self.capture_image()? {
                return Ok(());
            }
            if attempt + 1 < self.poll_attempts {
                std::thread::sleep(self.poll_interval);
            }
        }
        Err(SensorError::Timeout {
            stage: Stage::Capture,
        })
    }

    /// Poll until the finger is lifted, within the bounded attempt budget.
    ///
    /// Enrollment calls this between its two readings so a single static
    /// placement cannot be captured twice.
    pub fn wait_finger_lifted(&mut self) -> Result<(), SensorError> {
        for attempt in 0..self.poll_attempts {
            if !self.capture_image()? {
                return Ok(());
            }
            if attempt + 1 < self.poll_attempts {
                std::thread::sleep(self.poll_interval);
            }
        }
        Err(SensorError::Timeout {
            stage: Stage::Capture,
        })
    }

    /// Convert the captured image into the given template slot (1 or 2).
    pub fn image_to_template(&mut self, slot: u8) -> Result<(), SensorError> {
        self.command(Stage::Convert, &[CMD_IMAGE_TO_TEMPLATE, slot])
    }

    /// Fuse template slots 1 and 2 into a single template in slot 1.
    pub fn fuse_templates(&mut self) -> Result<(), SensorError> {
        self.command(Stage::Fuse, &[CMD_FUSE_TEMPLATES])
    }

    /// Persist buffer slot 1 into the template table under `identity`.
    pub fn persist_template(&mut self, identity: u16) -> Result<(), SensorError> {
        let page = identity.to_be_bytes();
        self.command(
            Stage::Store,
            &[CMD_STORE_TEMPLATE, TRANSFER_SLOT, page[0], page[1]],
        )
    }

    /// Download a template into buffer slot 1.
    ///
    /// Sends the announce command, then the template in fixed-size chunks:
    /// every chunk but the last as a data packet, the last as an end-of-data
    /// packet, validating an acknowledgement after each. Fails on the first
    /// missing or non-success acknowledgement; the caller must not assume any
    /// bytes past the failure point were accepted.
    pub fn push_template(&mut self, bytes: &[u8]) -> Result<(), SensorError> {
        self.command(Stage::Handshake, &[CMD_PUSH_TEMPLATE, TRANSFER_SLOT])?;

        let chunk_count = bytes.len().div_ceil(DATA_CHUNK_LEN).max(1);
        for (index, chunk) in chunks_or_empty(bytes).enumerate() {
            let last = index + 1 == chunk_count;
            let pid = if last { PID_END_DATA } else { PID_DATA };

            self.transport.write_all(&packet::build(pid, chunk))?;
            self.transport.flush()?;

            match packet::read_ack(&mut self.transport)? {
                ACK_SUCCESS => {}
                code => {
                    return Err(SensorError::Protocol {
                        stage: Stage::Data,
                        code,
                    })
                }
            }
        }

        tracing::debug!(len = bytes.len(), chunks = chunk_count, "Template pushed");
        Ok(())
    }

    /// Read the template in buffer slot 1 back out of the module.
    ///
    /// Mirror of [`SensorLink::push_template`]: the module answers the
    /// command with an acknowledgement, then streams data packets, the final
    /// one flagged end-of-data.
    pub fn pull_template(&mut self) -> Result<Vec<u8>, SensorError> {
        self.command(Stage::Upload, &[CMD_PULL_TEMPLATE, TRANSFER_SLOT])?;

        let mut bytes = Vec::new();
        for _ in 0..MAX_UPLOAD_PACKETS {
            let (pid, payload) = packet::read_frame(&mut self.transport)?;
            match pid {
                PID_DATA => bytes.extend_from_slice(&payload),
                PID_END_DATA => {
                    bytes.extend_from_slice(&payload);
                    tracing::debug!(len = bytes.len(), "Template pulled");
                    return Ok(bytes);
                }
                other => {
                    return Err(SensorError::Desync(format!(
                        "expected data packet, got type {other:#04x}"
                    )))
                }
            }
        }
        Err(SensorError::Timeout {
            stage: Stage::Upload,
        })
    }

    /// Send a command and require a success acknowledgement.
    fn command(&mut self, stage: Stage, payload: &[u8]) -> Result<(), SensorError> {
        self.send_command(payload)?;
        match packet::read_ack(&mut self.transport)? {
            ACK_SUCCESS => Ok(()),
            code => Err(SensorError::Protocol { stage, code }),
        }
    }

    fn send_command(&mut self, payload: &[u8]) -> Result<(), SensorError> {
        self.transport.write_all(&packet::build(PID_COMMAND, payload))?;
        self.transport.flush()?;
        Ok(())
    }
}

/// Chunk iterator that yields one empty chunk for empty input, so even a
/// zero-length transfer sends its end-of-data packet.
fn chunks_or_empty(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let empty = bytes.is_empty();
    bytes
        .chunks(DATA_CHUNK_LEN)
        .chain(std::iter::once(&bytes[0..0]).filter(move |_| empty))
}
