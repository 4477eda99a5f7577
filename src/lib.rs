//! Presentia Edge Agent - attendance terminal sync core.
//!
//! This library keeps a fingerprint terminal's enrolled-identity set in
//! agreement with a central server, and reliably delivers locally-observed
//! attendance events to that server despite an intermittent network link.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Presentia Edge Agent                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌─────────────┐    ┌──────────────┐      │
//! │  │  Gateway   │◀──▶│ Orchestrator │──▶│ OfflineQueue │      │
//! │  │  (HTTPS)   │    │ sync + drain │    │ (line file)  │      │
//! │  └────────────┘    └──────┬──────┘    └──────────────┘      │
//! │        ▲                  │                                  │
//! │        │           ┌──────▼──────┐    ┌──────────────┐      │
//! │  ┌────────────┐    │  SyncEngine │──▶│  SensorLink  │      │
//! │  │ Allocator  │    │ clear+reload│    │ (UART packets)│     │
//! │  └────────────┘    └─────────────┘    └──────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The server owns every identity and template; the sensor's onboard table
//! is a cache replaced wholesale by full sync. Attendance events are either
//! delivered live or appended to a durable queue whose drain compacts it
//! through an atomic temp-file rename, so no acknowledged event is retried
//! forever and no unacknowledged event is ever dropped.
//!
//! # Example
//!
//! ```no_run
//! use presentia_edge_agent::gateway::{ApiConfig, HttpServerApi};
//! use presentia_edge_agent::queue::OfflineQueue;
//! use presentia_edge_agent::sensor::{SensorLink, SerialTransport};
//! use presentia_edge_agent::orchestrator::Orchestrator;
//!
//! let api = HttpServerApi::new(ApiConfig::new("https://attendance.example.org", None, 10))
//!     .expect("client");
//! let transport = SerialTransport::open("/dev/ttyUSB0", 57_600).expect("serial port");
//! let mut sensor = SensorLink::new(transport);
//! let queue = OfflineQueue::new("/var/lib/presentia/attendance-queue.txt");
//!
//! let mut orchestrator = Orchestrator::new(&api, &mut sensor, &queue);
//! let report = orchestrator.startup();
//! println!("{report:?}");
//! ```

pub mod allocator;
pub mod codec;
pub mod config;
pub mod event;
pub mod gateway;
pub mod orchestrator;
pub mod queue;
pub mod sensor;
pub mod stats;
pub mod sync;

// Re-export key types at crate root for convenience
pub use allocator::{AllocError, IdentityAllocator};
pub use config::Config;
pub use event::AttendanceEvent;
pub use gateway::{ApiConfig, ApiError, HttpServerApi, ServerApi, TemplateRecord};
pub use orchestrator::{Delivery, Orchestrator, StartupReport};
pub use queue::{DrainReport, OfflineQueue, QueueError};
pub use sensor::{SensorError, SensorLink, SensorTransport, SerialTransport};
pub use stats::AgentStats;
pub use sync::{EnrollError, SyncEngine, SyncError, SyncOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
