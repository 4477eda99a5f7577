//! Cumulative delivery and sync counters.
//!
//! Persisted across sessions so the status command can show what the
//! terminal has done over its lifetime, not just since boot. The agent is
//! single-threaded, so these are plain counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifetime counters for this terminal.
#[derive(Debug, Default)]
pub struct AgentStats {
    events_recorded: u64,
    events_delivered_live: u64,
    events_queued: u64,
    events_drained: u64,
    templates_loaded: u64,
    template_failures: u64,
    enrollments: u64,
    last_sync: Option<DateTime<Utc>>,
    persist_path: Option<PathBuf>,
}

impl AgentStats {
    /// Create an in-memory stats ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stats ledger with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::debug!(error = %e, "No previous stats loaded");
        }

        stats
    }

    /// Record one observed attendance event.
    pub fn record_event(&mut self) {
        self.events_recorded += 1;
    }

    /// Record an event delivered without queueing.
    pub fn record_delivered_live(&mut self) {
        self.events_delivered_live += 1;
    }

    /// Record an event that went to the offline queue.
    pub fn record_queued(&mut self) {
        self.events_queued += 1;
    }

    /// Record events delivered by a drain pass.
    pub fn record_drained(&mut self, count: u64) {
        self.events_drained += count;
    }

    /// Record the outcome of a full sync.
    pub fn record_sync(&mut self, loaded: u64, failed: u64) {
        self.templates_loaded += loaded;
        self.template_failures += failed;
        self.last_sync = Some(Utc::now());
    }

    /// Record a completed enrollment.
    pub fn record_enrollment(&mut self) {
        self.enrollments += 1;
    }

    /// Get a summary string for the status command.
    pub fn summary(&self) -> String {
        let last_sync = self
            .last_sync
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "Terminal statistics:\n\
             - Attendance events recorded: {}\n\
             - Delivered live: {}\n\
             - Queued offline: {}\n\
             - Delivered by drain: {}\n\
             - Templates loaded: {} ({} failed)\n\
             - Enrollments: {}\n\
             - Last template sync: {}",
            self.events_recorded,
            self.events_delivered_live,
            self.events_queued,
            self.events_drained,
            self.templates_loaded,
            self.template_failures,
            self.enrollments,
            last_sync
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                events_recorded: self.events_recorded,
                events_delivered_live: self.events_delivered_live,
                events_queued: self.events_queued,
                events_drained: self.events_drained,
                templates_loaded: self.templates_loaded,
                template_failures: self.template_failures,
                enrollments: self.enrollments,
                last_sync: self.last_sync,
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load counters from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.events_recorded = persisted.events_recorded;
                self.events_delivered_live = persisted.events_delivered_live;
                self.events_queued = persisted.events_queued;
                self.events_drained = persisted.events_drained;
                self.templates_loaded = persisted.templates_loaded;
                self.template_failures = persisted.template_failures;
                self.enrollments = persisted.enrollments;
                self.last_sync = persisted.last_sync;
            }
        }
        Ok(())
    }
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    events_recorded: u64,
    events_delivered_live: u64,
    events_queued: u64,
    events_drained: u64,
    templates_loaded: u64,
    template_failures: u64,
    enrollments: u64,
    last_sync: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let mut stats = AgentStats::new();
        stats.record_event();
        stats.record_event();
        stats.record_queued();
        stats.record_drained(3);

        let summary = stats.summary();
        assert!(summary.contains("recorded: 2"));
        assert!(summary.contains("Queued offline: 1"));
        assert!(summary.contains("drain: 3"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "presentia-stats-test-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut stats = AgentStats::with_persistence(path.clone());
        stats.record_event();
        stats.record_sync(4, 1);
        stats.save().unwrap();

        let reloaded = AgentStats::with_persistence(path.clone());
        assert!(reloaded.summary().contains("recorded: 1"));
        assert!(reloaded.summary().contains("loaded: 4 (1 failed)"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_summary_without_sync() {
        let stats = AgentStats::new();
        assert!(stats.summary().contains("Last template sync: never"));
    }
}
