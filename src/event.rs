//! Attendance event type and its durable line encoding.
//!
//! Events are created exactly once, at the moment a live sensor match occurs,
//! and are either delivered straight to the server or appended to the offline
//! queue. The queue stores one event per line as `identity,room,timestamp`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One observed attendance: who, where, when.
///
/// Immutable once created. `timestamp` is unix seconds, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Server-assigned identity of the matched subject
    pub identity: u16,
    /// Location tag of this terminal
    pub room: u16,
    /// Occurrence time, unix seconds UTC
    pub timestamp: i64,
}

impl AttendanceEvent {
    /// Create an event with an explicit timestamp.
    pub fn new(identity: u16, room: u16, timestamp: i64) -> Self {
        Self {
            identity,
            room,
            timestamp,
        }
    }

    /// Create an event stamped with the current time.
    pub fn capture(identity: u16, room: u16) -> Self {
        Self::new(identity, room, Utc::now().timestamp())
    }

    /// Serialize for the queue file: `identity,room,timestamp`, no spaces.
    pub fn to_line(&self) -> String {
        format!("{},{},{}", self.identity, self.room, self.timestamp)
    }

    /// Parse one queue-file line.
    ///
    /// A line that fails here can never become well-formed, so callers drop
    /// it rather than re-queueing.
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let mut fields = line.trim().split(',');

        let identity = next_field(&mut fields, line)?;
        let room = next_field(&mut fields, line)?;
        let timestamp = next_field(&mut fields, line)?;

        if fields.next().is_some() {
            return Err(ParseError::FieldCount(line.to_string()));
        }

        Ok(Self {
            identity,
            room,
            timestamp,
        })
    }
}

fn next_field<T: std::str::FromStr>(
    fields: &mut std::str::Split<'_, char>,
    line: &str,
) -> Result<T, ParseError> {
    let raw = fields
        .next()
        .ok_or_else(|| ParseError::FieldCount(line.to_string()))?;
    raw.parse()
        .map_err(|_| ParseError::BadField(raw.to_string()))
}

/// Errors from parsing a stored queue line.
#[derive(Debug)]
pub enum ParseError {
    /// Wrong number of comma-separated fields
    FieldCount(String),
    /// A field was not a valid number
    BadField(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::FieldCount(line) => write!(f, "Malformed event line: {line:?}"),
            ParseError::BadField(field) => write!(f, "Malformed event field: {field:?}"),
        }
    }
}

impl std::error::Error for ParseError {}
