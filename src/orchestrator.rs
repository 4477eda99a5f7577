//! Sequencing of the agent's terminal operations.
//!
//! On boot (and on manual trigger) the agent first brings the sensor's
//! template set into agreement with the server, then drains whatever
//! attendance backlog accumulated while offline. Live events go through
//! [`Orchestrator::record_attendance`]: deliver now if possible, queue
//! otherwise.

use crate::event::AttendanceEvent;
use crate::gateway::ServerApi;
use crate::queue::{DrainReport, OfflineQueue, QueueError};
use crate::sensor::{SensorLink, SensorTransport};
use crate::sync::{SyncEngine, SyncError, SyncOutcome};

/// Outcome of the boot/manual sync pass, for the UI layer to render.
#[derive(Debug)]
pub struct StartupReport {
    /// Template sync result, or the error that stopped it
    pub sync: Result<SyncOutcome, SyncError>,
    /// Queue drain result, or the storage error that stopped it
    pub drain: Result<DrainReport, QueueError>,
}

/// How one live event reached durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The server acknowledged the event immediately
    Sent,
    /// Delivery failed; the event is in the durable queue
    Queued,
}

/// Sequences sync and drain over the shared collaborators.
pub struct Orchestrator<'a, T: SensorTransport> {
    api: &'a dyn ServerApi,
    sensor: &'a mut SensorLink<T>,
    queue: &'a OfflineQueue,
}

impl<'a, T: SensorTransport> Orchestrator<'a, T> {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        api: &'a dyn ServerApi,
        sensor: &'a mut SensorLink<T>,
        queue: &'a OfflineQueue,
    ) -> Self {
        Self { api, sensor, queue }
    }

    /// Full sync, then drain. Neither failure stops the other: a sensor that
    /// refuses to clear must not strand queued attendance, and vice versa.
    pub fn startup(&mut self) -> StartupReport {
        let sync = SyncEngine::new(self.api, self.sensor).full_sync();
        let drain = self.drain();
        StartupReport { sync, drain }
    }

    /// Retry delivery of every queued event.
    pub fn drain(&self) -> Result<DrainReport, QueueError> {
        self.queue.drain(|event| match self.api.attendance(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(identity = event.identity, error = %e, "Delivery failed, retained");
                false
            }
        })
    }

    /// Deliver one live event, falling back to the durable queue.
    pub fn record_attendance(&self, event: &AttendanceEvent) -> Result<Delivery, QueueError> {
        deliver_or_enqueue(self.api, self.queue, event)
    }
}

/// Deliver one live event, falling back to the durable queue.
///
/// The delivery path does not involve the sensor, so callers without an open
/// serial link use this directly. Only a storage failure surfaces as an
/// error; a network failure is the normal path into the queue.
pub fn deliver_or_enqueue(
    api: &dyn ServerApi,
    queue: &OfflineQueue,
    event: &AttendanceEvent,
) -> Result<Delivery, QueueError> {
    match api.attendance(event) {
        Ok(()) => Ok(Delivery::Sent),
        Err(e) => {
            tracing::info!(identity = event.identity, error = %e, "Queueing event offline");
            queue.enqueue(event)?;
            Ok(Delivery::Queued)
        }
    }
}
