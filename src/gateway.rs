//! Client for the central attendance server.
//!
//! All four server operations go through the [`ServerApi`] trait so the
//! allocator, sync engine and queue drain can be tested against a fake
//! server. The real implementation wraps an async reqwest client in a
//! blocking facade; every call is synchronous from the caller's view.

use crate::event::AttendanceEvent;
use serde::{Deserialize, Serialize};

/// Server connection configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://attendance.example.org`
    pub host: String,
    /// Optional bearer token
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Create a new API configuration.
    pub fn new(host: impl Into<String>, token: Option<String>, timeout_secs: u64) -> Self {
        Self {
            host: host.into(),
            token,
            timeout_secs,
        }
    }

    /// Get the last-assigned-identity endpoint URL.
    pub fn last_id_url(&self) -> String {
        format!("{}/v1/last-id", self.host)
    }

    /// Get the all-templates endpoint URL.
    pub fn templates_url(&self) -> String {
        format!("{}/v1/templates", self.host)
    }

    /// Get the enrollment endpoint URL.
    pub fn enroll_url(&self) -> String {
        format!("{}/v1/enroll", self.host)
    }

    /// Get the attendance endpoint URL.
    pub fn attendance_url(&self) -> String {
        format!("{}/v1/attendance", self.host)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.host)
    }
}

impl From<&crate::config::ServerConfig> for ApiConfig {
    fn from(cfg: &crate::config::ServerConfig) -> Self {
        Self::new(cfg.host.clone(), cfg.token.clone(), cfg.timeout_secs)
    }
}

/// One identity→template pair from the authoritative set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRecord {
    /// Server-assigned identity
    pub id: u16,
    /// Base64-encoded template bytes
    pub template: String,
}

/// Enrollment upload body.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollPayload {
    /// Newly allocated identity
    pub id: u16,
    /// Base64-encoded fused template
    pub template: String,
}

/// Attendance upload body.
#[derive(Debug, Clone, Serialize)]
pub struct AttendancePayload {
    /// Matched identity
    pub fingerid: u16,
    /// Location tag of the reporting terminal
    pub roomid: u16,
    /// Occurrence time, unix seconds UTC
    pub timestamp: i64,
}

impl From<&AttendanceEvent> for AttendancePayload {
    fn from(event: &AttendanceEvent) -> Self {
        Self {
            fingerid: event.identity,
            roomid: event.room,
            timestamp: event.timestamp,
        }
    }
}

/// Server API error types.
#[derive(Debug)]
pub enum ApiError {
    /// The network link itself is down (connect failure or timeout)
    LinkDown,
    /// Server reachable but returned a non-success status
    Server { status: u16 },
    /// Response body did not match the expected schema
    Parse(String),
    /// Other transport-level failure
    Network(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::LinkDown => write!(f, "Network link is down"),
            ApiError::Server { status } => write!(f, "Server error ({status})"),
            ApiError::Parse(msg) => write!(f, "Malformed server response: {msg}"),
            ApiError::Network(msg) => write!(f, "Network error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Operations the central server exposes to this agent.
///
/// The fake implementations in tests stand in for the real server; nothing
/// below this trait knows about HTTP.
pub trait ServerApi {
    /// Quick reachability probe. Never errors; an unreachable server is `false`.
    fn link_up(&self) -> bool;

    /// GET the last identity the server has assigned, fleet-wide.
    fn last_identity(&self) -> Result<u16, ApiError>;

    /// GET the full authoritative identity→template set.
    fn templates(&self) -> Result<Vec<TemplateRecord>, ApiError>;

    /// POST a newly enrolled identity and its encoded template.
    fn enroll(&self, id: u16, template: &str) -> Result<(), ApiError>;

    /// POST one attendance event.
    fn attendance(&self, event: &AttendanceEvent) -> Result<(), ApiError>;
}

/// Blocking HTTP implementation of [`ServerApi`].
pub struct HttpServerApi {
    config: ApiConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    device_id: String,
}

impl HttpServerApi {
    /// Create a new client.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create runtime: {e}")))?;

        let device_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            config,
            client,
            runtime,
            device_id,
        })
    }

    /// Get the device ID used in idempotency keys.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Classify a reqwest failure into the error taxonomy.
    fn classify(e: reqwest::Error) -> ApiError {
        if e.is_connect() || e.is_timeout() {
            ApiError::LinkDown
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    /// Send a request and map non-success statuses.
    async fn send_checked(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self.authorize(req).send().await.map_err(Self::classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn last_identity_async(&self) -> Result<u16, ApiError> {
        let response = self
            .send_checked(self.client.get(self.config.last_id_url()))
            .await?;
        let body = response.text().await.map_err(Self::classify)?;
        body.trim()
            .parse()
            .map_err(|_| ApiError::Parse(format!("last-id body {:?}", body.trim())))
    }

    async fn templates_async(&self) -> Result<Vec<TemplateRecord>, ApiError> {
        let response = self
            .send_checked(self.client.get(self.config.templates_url()))
            .await?;
        response
            .json::<Vec<TemplateRecord>>()
            .await
            .map_err(Self::classify)
    }

    async fn enroll_async(&self, id: u16, template: &str) -> Result<(), ApiError> {
        let payload = EnrollPayload {
            id,
            template: template.to_string(),
        };
        self.send_checked(self.client.post(self.config.enroll_url()).json(&payload))
            .await?;
        Ok(())
    }

    async fn attendance_async(&self, event: &AttendanceEvent) -> Result<(), ApiError> {
        let payload = AttendancePayload::from(event);
        // Deterministic per-event key so a replayed delivery (crash between
        // server ack and queue compaction) is safe to ignore server-side.
        let key = format!(
            "{}-{}-{}-{}",
            self.device_id, payload.fingerid, payload.roomid, payload.timestamp
        );
        self.send_checked(
            self.client
                .post(self.config.attendance_url())
                .header("Idempotency-Key", key)
                .json(&payload),
        )
        .await?;
        Ok(())
    }

    async fn link_up_async(&self) -> bool {
        match self.client.get(self.config.health_url()).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

impl ServerApi for HttpServerApi {
    fn link_up(&self) -> bool {
        self.runtime.block_on(self.link_up_async())
    }

    fn last_identity(&self) -> Result<u16, ApiError> {
        self.runtime.block_on(self.last_identity_async())
    }

    fn templates(&self) -> Result<Vec<TemplateRecord>, ApiError> {
        self.runtime.block_on(self.templates_async())
    }

    fn enroll(&self, id: u16, template: &str) -> Result<(), ApiError> {
        self.runtime.block_on(self.enroll_async(id, template))
    }

    fn attendance(&self, event: &AttendanceEvent) -> Result<(), ApiError> {
        self.runtime.block_on(self.attendance_async(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_config_urls() {
        let config = ApiConfig::new("https://attendance.example.org", None, 10);
        assert_eq!(
            config.last_id_url(),
            "https://attendance.example.org/v1/last-id"
        );
        assert_eq!(
            config.templates_url(),
            "https://attendance.example.org/v1/templates"
        );
        assert_eq!(
            config.enroll_url(),
            "https://attendance.example.org/v1/enroll"
        );
        assert_eq!(
            config.attendance_url(),
            "https://attendance.example.org/v1/attendance"
        );
        assert_eq!(config.health_url(), "https://attendance.example.org/health");
    }

    #[test]
    fn test_attendance_payload_field_names() {
        let event = AttendanceEvent::new(5, 3, 1_700_000_000);
        let json = serde_json::to_value(AttendancePayload::from(&event)).unwrap();
        assert_eq!(json["fingerid"], 5);
        assert_eq!(json["roomid"], 3);
        assert_eq!(json["timestamp"], 1_700_000_000i64);
    }

    #[test]
    fn test_template_record_schema_is_strict() {
        // Absent fields are a parse error, never defaulted.
        let missing: Result<TemplateRecord, _> = serde_json::from_str(r#"{"id": 1}"#);
        assert!(missing.is_err());

        let ok: TemplateRecord = serde_json::from_str(r#"{"id": 1, "template": "AA=="}"#).unwrap();
        assert_eq!(ok.id, 1);
        assert_eq!(ok.template, "AA==");
    }
}
