//! Durable offline queue for undelivered attendance events.
//!
//! When the server cannot be reached, events are appended to a line-oriented
//! file on the storage volume. A later drain retries delivery in original
//! order and compacts the file through a temp-file + atomic-rename sequence,
//! so an interruption at any point leaves either the old queue or the new
//! one on disk, never a half-rewritten file.

use crate::event::AttendanceEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Owns the queue file. No other component reads or writes it.
pub struct OfflineQueue {
    path: PathBuf,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Events the server acknowledged; removed from the queue
    pub delivered: usize,
    /// Events that failed delivery; retained for the next drain
    pub retained: usize,
    /// Malformed lines dropped (they can never become well-formed)
    pub dropped: usize,
}

impl OfflineQueue {
    /// Create a queue over the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event.
    ///
    /// The line is written and flushed in full before the scoped file handle
    /// is released. If the volume cannot be opened the event is lost — there
    /// is deliberately no RAM-resident fallback spool.
    pub fn enqueue(&self, event: &AttendanceEvent) -> Result<(), QueueError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;

        let line = format!("{}\n", event.to_line());
        file.write_all(line.as_bytes())
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
        file.sync_all()
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;

        tracing::debug!(identity = event.identity, "Event queued offline");
        Ok(())
    }

    /// Retry delivery of every queued event, in original enqueue order.
    ///
    /// `deliver` returns true once the server has acknowledged the event;
    /// only then is it discarded. Rejected events survive into the rewritten
    /// queue in their original relative order. `deliver` must be idempotent:
    /// a crash between acknowledgement and the final rename replays the line
    /// on the next drain.
    pub fn drain<F>(&self, mut deliver: F) -> Result<DrainReport, QueueError>
    where
        F: FnMut(&AttendanceEvent) -> bool,
    {
        if !self.path.exists() {
            return Ok(DrainReport::default());
        }

        let file = File::open(&self.path)
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
        let reader = BufReader::new(file);

        let tmp_path = self.tmp_path();
        let mut tmp = File::create(&tmp_path)
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;

        let mut report = DrainReport::default();

        for line in reader.lines() {
            let line = line.map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }

            let event = match AttendanceEvent::parse_line(&line) {
                Ok(event) => event,
                Err(e) => {
                    // Not retried, not re-queued: the line cannot become
                    // well-formed in the future either.
                    tracing::warn!(error = %e, "Dropping malformed queue line");
                    report.dropped += 1;
                    continue;
                }
            };

            if deliver(&event) {
                report.delivered += 1;
            } else {
                tmp.write_all(format!("{}\n", event.to_line()).as_bytes())
                    .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
                report.retained += 1;
            }
        }

        tmp.sync_all()
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
        drop(tmp);

        // Atomic commit of the new queue contents: drop the old file, then
        // either promote the rewrite or remove it if everything was delivered.
        std::fs::remove_file(&self.path)
            .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
        if report.retained > 0 {
            std::fs::rename(&tmp_path, &self.path)
                .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
        } else {
            std::fs::remove_file(&tmp_path)
                .map_err(|e| QueueError::StorageUnavailable(e.to_string()))?;
        }

        tracing::info!(
            delivered = report.delivered,
            retained = report.retained,
            dropped = report.dropped,
            "Queue drained"
        );
        Ok(report)
    }

    /// Number of events currently queued (for status display).
    pub fn len(&self) -> usize {
        let Ok(file) = File::open(&self.path) else {
            return 0;
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty())
            .count()
    }

    /// Whether the queue has no pending events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

/// Queue error types.
#[derive(Debug)]
pub enum QueueError {
    /// The storage volume is not mounted or the file could not be opened
    StorageUnavailable(String),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for QueueError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_queue(name: &str) -> OfflineQueue {
        let path = std::env::temp_dir().join(format!(
            "presentia-queue-test-{}-{}.txt",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(format!("{}.tmp", path.display()));
        OfflineQueue::new(path)
    }

    #[test]
    fn test_drain_missing_file_is_noop() {
        let queue = temp_queue("missing");
        let report = queue.drain(|_| panic!("deliver must not be called")).unwrap();
        assert_eq!(report, DrainReport::default());
    }

    #[test]
    fn test_enqueue_then_len() {
        let queue = temp_queue("len");
        queue.enqueue(&AttendanceEvent::new(1, 2, 3)).unwrap();
        queue.enqueue(&AttendanceEvent::new(4, 5, 6)).unwrap();
        assert_eq!(queue.len(), 2);
        let _ = std::fs::remove_file(queue.path());
    }

    #[test]
    fn test_drain_preserves_rejected_in_order() {
        let queue = temp_queue("order");
        let a = AttendanceEvent::new(1, 1, 100);
        let b = AttendanceEvent::new(2, 1, 200);
        let c = AttendanceEvent::new(3, 1, 300);
        for event in [&a, &b, &c] {
            queue.enqueue(event).unwrap();
        }

        // Accept A and C, reject B
        let mut seen = Vec::new();
        let report = queue
            .drain(|event| {
                seen.push(*event);
                event.identity != 2
            })
            .unwrap();

        assert_eq!(seen, vec![a, b, c]); // FIFO delivery order
        assert_eq!(report.delivered, 2);
        assert_eq!(report.retained, 1);

        let remaining = std::fs::read_to_string(queue.path()).unwrap();
        assert_eq!(remaining, "2,1,200\n");
        let _ = std::fs::remove_file(queue.path());
    }

    #[test]
    fn test_drain_removes_file_when_all_delivered() {
        let queue = temp_queue("all-delivered");
        queue.enqueue(&AttendanceEvent::new(1, 1, 100)).unwrap();
        queue.enqueue(&AttendanceEvent::new(2, 1, 200)).unwrap();

        let report = queue.drain(|_| true).unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.retained, 0);
        assert!(!queue.path().exists());
        assert!(!queue.path().with_extension("txt.tmp").exists());
    }

    #[test]
    fn test_enqueue_drain_single_delivery() {
        let queue = temp_queue("single");
        queue.enqueue(&AttendanceEvent::new(7, 2, 900)).unwrap();

        let mut calls = 0;
        let report = queue
            .drain(|_| {
                calls += 1;
                true
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(report.delivered, 1);
        assert!(!queue.path().exists());
    }

    #[test]
    fn test_drain_drops_malformed_lines_permanently() {
        let queue = temp_queue("malformed");
        queue.enqueue(&AttendanceEvent::new(1, 1, 100)).unwrap();
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(queue.path())
                .unwrap();
            file.write_all(b"not,a,number\ngarbage\n").unwrap();
        }
        queue.enqueue(&AttendanceEvent::new(2, 1, 200)).unwrap();

        // Reject everything: well-formed events stay, garbage goes
        let report = queue.drain(|_| false).unwrap();
        assert_eq!(report.delivered, 0);
        assert_eq!(report.retained, 2);
        assert_eq!(report.dropped, 2);

        let remaining = std::fs::read_to_string(queue.path()).unwrap();
        assert_eq!(remaining, "1,1,100\n2,1,200\n");

        // A second drain sees the malformed lines gone for good
        let report = queue.drain(|_| true).unwrap();
        assert_eq!(report.dropped, 0);
        assert_eq!(report.delivered, 2);
        let _ = std::fs::remove_file(queue.path());
    }

    #[test]
    fn test_drain_empty_file_is_noop_and_cleans_up() {
        let queue = temp_queue("empty");
        std::fs::write(queue.path(), "").unwrap();

        let report = queue.drain(|_| panic!("deliver must not be called")).unwrap();
        assert_eq!(report, DrainReport::default());
        assert!(!queue.path().exists());
    }
}
