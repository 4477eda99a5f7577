//! Template synchronization between the central server and the sensor.
//!
//! The server owns the authoritative identity→template set; the sensor's
//! onboard table is a cache that full sync replaces wholesale: clear first,
//! then reload every pair. Per-pair failures are counted and skipped so one
//! corrupt upstream entry cannot block the rest of the set.

use crate::allocator::{AllocError, IdentityAllocator};
use crate::codec;
use crate::gateway::{ApiError, ServerApi};
use crate::sensor::link::{FIRST_SLOT, SECOND_SLOT};
use crate::sensor::{SensorError, SensorLink, SensorTransport};

/// Result of one full-sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No live network link; nothing was touched
    Offline,
    /// The set was cleared and reloaded
    Completed {
        /// Pairs now present in the local set
        succeeded: usize,
        /// Pairs that failed decode, transfer or persist
        failed: usize,
    },
}

/// Drives the sensor's local template set into agreement with the server.
pub struct SyncEngine<'a, T: SensorTransport> {
    api: &'a dyn ServerApi,
    sensor: &'a mut SensorLink<T>,
}

impl<'a, T: SensorTransport> SyncEngine<'a, T> {
    /// Create a sync engine over the given server and sensor.
    pub fn new(api: &'a dyn ServerApi, sensor: &'a mut SensorLink<T>) -> Self {
        Self { api, sensor }
    }

    /// Replace the sensor's local template set with the server's.
    ///
    /// Without a live link this is a no-op, not a failure. The clear runs
    /// before any network call so a half-populated set can never result from
    /// a mid-sync network drop; after a successful clear the device always
    /// ends with some valid (possibly empty) set.
    pub fn full_sync(&mut self) -> Result<SyncOutcome, SyncError> {
        if !self.api.link_up() {
            tracing::info!("No network link, skipping template sync");
            return Ok(SyncOutcome::Offline);
        }

        self.sensor.clear_all().map_err(SyncError::Clear)?;

        let records = self.api.templates().map_err(SyncError::Fetch)?;
        tracing::info!(count = records.len(), "Loading authoritative template set");

        let mut succeeded = 0;
        let mut failed = 0;
        for record in &records {
            match self.load_pair(record.id, &record.template) {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(id = record.id, error = %e, "Template pair failed");
                    failed += 1;
                }
            }
        }

        Ok(SyncOutcome::Completed { succeeded, failed })
    }

    /// Decode, transfer and persist one identity→template pair.
    fn load_pair(&mut self, id: u16, encoded: &str) -> Result<(), PairError> {
        let bytes = codec::decode(encoded).map_err(PairError::Decode)?;
        self.sensor.push_template(&bytes).map_err(PairError::Sensor)?;
        self.sensor.persist_template(id).map_err(PairError::Sensor)?;
        Ok(())
    }

    /// Enroll a new subject: allocate an identity, fuse two live readings,
    /// and upload the result.
    ///
    /// The finger must be lifted and re-placed between the two readings so a
    /// single static placement cannot be captured twice. Any failure after
    /// allocation abandons the enrollment and burns the issued identity —
    /// gaps in the number space are accepted fleet-wide, collisions are not.
    pub fn enroll(&mut self) -> Result<u16, EnrollError> {
        let allocator = IdentityAllocator::new(self.api);
        let identity = allocator.next_identity().map_err(EnrollError::Alloc)?;
        tracing::info!(identity, "Enrollment started");

        // First reading
        self.sensor.wait_for_finger().map_err(EnrollError::Sensor)?;
        self.sensor
            .image_to_template(FIRST_SLOT)
            .map_err(EnrollError::Sensor)?;

        // Liveness: require a lift before the second reading
        self.sensor.wait_finger_lifted().map_err(EnrollError::Sensor)?;
        self.sensor.wait_for_finger().map_err(EnrollError::Sensor)?;
        self.sensor
            .image_to_template(SECOND_SLOT)
            .map_err(EnrollError::Sensor)?;

        self.sensor.fuse_templates().map_err(EnrollError::Sensor)?;
        let bytes = self.sensor.pull_template().map_err(EnrollError::Sensor)?;

        let encoded = codec::encode(&bytes);
        self.api
            .enroll(identity, &encoded)
            .map_err(EnrollError::Upload)?;

        tracing::info!(identity, len = bytes.len(), "Enrollment uploaded");
        Ok(identity)
    }
}

/// Per-pair failure during full sync. Recorded, never fatal to the batch.
#[derive(Debug)]
enum PairError {
    Decode(codec::CodecError),
    Sensor(SensorError),
}

impl std::fmt::Display for PairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairError::Decode(e) => write!(f, "{e}"),
            PairError::Sensor(e) => write!(f, "{e}"),
        }
    }
}

/// Full-sync error types.
#[derive(Debug)]
pub enum SyncError {
    /// The sensor refused to clear its set; sync aborted before any network call
    Clear(SensorError),
    /// The authoritative set could not be fetched (the local set is empty but valid)
    Fetch(ApiError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Clear(e) => write!(f, "Template clear failed: {e}"),
            SyncError::Fetch(e) => write!(f, "Template fetch failed: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

/// Enrollment error types.
#[derive(Debug)]
pub enum EnrollError {
    /// No identity could be allocated; nothing was consumed
    Alloc(AllocError),
    /// A sensor step failed; the allocated identity is burned
    Sensor(SensorError),
    /// The upload failed; the allocated identity is burned
    Upload(ApiError),
}

impl std::fmt::Display for EnrollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollError::Alloc(e) => write!(f, "Enrollment allocation failed: {e}"),
            EnrollError::Sensor(e) => write!(f, "Enrollment capture failed: {e}"),
            EnrollError::Upload(e) => write!(f, "Enrollment upload failed: {e}"),
        }
    }
}

impl std::error::Error for EnrollError {}
