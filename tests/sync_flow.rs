//! Integration tests for the boot sync flow against a fake server and a
//! scripted sensor transport.

use presentia_edge_agent::codec;
use presentia_edge_agent::event::AttendanceEvent;
use presentia_edge_agent::gateway::{ApiError, ServerApi, TemplateRecord};
use presentia_edge_agent::orchestrator::Orchestrator;
use presentia_edge_agent::queue::OfflineQueue;
use presentia_edge_agent::sensor::packet::{self, ACK_SUCCESS, PID_ACK};
use presentia_edge_agent::sensor::{MockTransport, SensorLink};
use presentia_edge_agent::sync::SyncOutcome;
use std::cell::RefCell;
use std::time::Duration;

/// Fake central server: a fixed template set, configurable attendance
/// acceptance, and a call log.
struct FakeServer {
    up: bool,
    records: Vec<TemplateRecord>,
    accept_attendance: bool,
    attendance_log: RefCell<Vec<AttendanceEvent>>,
}

impl FakeServer {
    fn with_templates(records: Vec<TemplateRecord>) -> Self {
        Self {
            up: true,
            records,
            accept_attendance: true,
            attendance_log: RefCell::new(vec![]),
        }
    }
}

impl ServerApi for FakeServer {
    fn link_up(&self) -> bool {
        self.up
    }

    fn last_identity(&self) -> Result<u16, ApiError> {
        Ok(self.records.iter().map(|r| r.id).max().unwrap_or(0))
    }

    fn templates(&self) -> Result<Vec<TemplateRecord>, ApiError> {
        Ok(self.records.clone())
    }

    fn enroll(&self, _id: u16, _template: &str) -> Result<(), ApiError> {
        Ok(())
    }

    fn attendance(&self, event: &AttendanceEvent) -> Result<(), ApiError> {
        if self.accept_attendance {
            self.attendance_log.borrow_mut().push(*event);
            Ok(())
        } else {
            Err(ApiError::LinkDown)
        }
    }
}

fn scripted_sensor(ack_count: usize) -> SensorLink<MockTransport> {
    let mut mock = MockTransport::new();
    for _ in 0..ack_count {
        mock.inject_read(&packet::build(PID_ACK, &[ACK_SUCCESS]));
    }
    SensorLink::with_polling(mock, 3, Duration::ZERO)
}

fn test_queue(name: &str) -> OfflineQueue {
    let path = std::env::temp_dir().join(format!(
        "presentia-it-sync-{}-{}.txt",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    OfflineQueue::new(path)
}

fn record(id: u16, bytes: &[u8]) -> TemplateRecord {
    TemplateRecord {
        id,
        template: codec::encode(bytes),
    }
}

#[test]
fn startup_loads_templates_and_drains_backlog() {
    // Two 100-byte templates: per pair handshake + 2 chunks + store = 4 acks;
    // plus the initial clear = 9 acks total.
    let api = FakeServer::with_templates(vec![
        record(1, &[0xA0; 100]),
        record(2, &[0xB0; 100]),
    ]);
    let mut sensor = scripted_sensor(9);

    let queue = test_queue("startup");
    queue.enqueue(&AttendanceEvent::new(1, 4, 500)).unwrap();

    let mut orchestrator = Orchestrator::new(&api, &mut sensor, &queue);
    let report = orchestrator.startup();

    assert_eq!(
        report.sync.unwrap(),
        SyncOutcome::Completed {
            succeeded: 2,
            failed: 0
        }
    );

    let drain = report.drain.unwrap();
    assert_eq!(drain.delivered, 1);
    assert_eq!(drain.retained, 0);
    assert!(!queue.path().exists());

    let log = api.attendance_log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].identity, 1);
}

#[test]
fn corrupt_upstream_pair_does_not_block_the_rest() {
    // Pair 2 fails decode before touching the sensor: clear + 2 good pairs
    // of (handshake + 1 chunk + store) = 7 acks.
    let api = FakeServer::with_templates(vec![
        record(1, &[1; 32]),
        TemplateRecord {
            id: 2,
            template: "%%%".to_string(),
        },
        record(3, &[3; 32]),
    ]);
    let mut sensor = scripted_sensor(7);
    let queue = test_queue("corrupt");

    let mut orchestrator = Orchestrator::new(&api, &mut sensor, &queue);
    let report = orchestrator.startup();

    assert_eq!(
        report.sync.unwrap(),
        SyncOutcome::Completed {
            succeeded: 2,
            failed: 1
        }
    );
}

#[test]
fn offline_startup_touches_nothing_but_the_queue() {
    let mut api = FakeServer::with_templates(vec![record(1, &[1; 8])]);
    api.up = false;
    api.accept_attendance = false;

    let mut sensor = scripted_sensor(0);
    let queue = test_queue("offline");
    queue.enqueue(&AttendanceEvent::new(7, 2, 900)).unwrap();

    let mut orchestrator = Orchestrator::new(&api, &mut sensor, &queue);
    let report = orchestrator.startup();

    assert_eq!(report.sync.unwrap(), SyncOutcome::Offline);
    let drain = report.drain.unwrap();
    assert_eq!(drain.delivered, 0);
    assert_eq!(drain.retained, 1);

    // The sensor was never spoken to
    assert!(sensor.transport_mut().written().is_empty());
    assert_eq!(queue.len(), 1);
    let _ = std::fs::remove_file(queue.path());
}
