//! Presentia Edge Agent CLI
//!
//! Attendance terminal agent: template sync and offline event delivery.

use clap::{Parser, Subcommand};
use presentia_edge_agent::{
    config::Config,
    event::AttendanceEvent,
    gateway::{ApiConfig, HttpServerApi, ServerApi},
    orchestrator::{self, Delivery, Orchestrator},
    queue::OfflineQueue,
    sensor::{SensorLink, SerialTransport},
    stats::AgentStats,
    sync::{SyncEngine, SyncOutcome},
    VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "presentia-agent")]
#[command(author = "Presentia")]
#[command(version = VERSION)]
#[command(about = "Attendance terminal agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full template sync, then drain the offline queue (the boot pass)
    Sync,

    /// Enroll a new subject on the sensor and upload the template
    Enroll,

    /// Retry delivery of queued attendance events
    Drain,

    /// Record one attendance event (deliver now or queue offline)
    Record {
        /// Matched identity
        #[arg(long)]
        identity: u16,

        /// Location tag (defaults to the configured room)
        #[arg(long)]
        room: Option<u16>,
    },

    /// Show link, queue and lifetime statistics
    Status,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync => cmd_sync(),
        Commands::Enroll => cmd_enroll(),
        Commands::Drain => cmd_drain(),
        Commands::Record { identity, room } => cmd_record(identity, room),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    }
}

/// Load config, ensuring directories exist.
fn load_config() -> Config {
    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    config
}

fn connect_server(config: &Config) -> HttpServerApi {
    match HttpServerApi::new(ApiConfig::from(&config.server)) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: Could not build server client: {e}");
            std::process::exit(1);
        }
    }
}

fn open_sensor(config: &Config) -> SensorLink<SerialTransport> {
    match SerialTransport::open(&config.sensor.port, config.sensor.baud_rate) {
        Ok(transport) => SensorLink::new(transport),
        Err(e) => {
            eprintln!("Error: Could not open sensor port {}: {e}", config.sensor.port);
            std::process::exit(1);
        }
    }
}

fn open_stats(config: &Config) -> AgentStats {
    AgentStats::with_persistence(config.data_path.join("stats.json"))
}

fn cmd_sync() {
    let config = load_config();
    let api = connect_server(&config);
    let mut sensor = open_sensor(&config);
    let queue = OfflineQueue::new(&config.queue_path);
    let mut stats = open_stats(&config);

    println!("Presentia Edge Agent v{VERSION}");
    println!("Starting sync against {}", config.server.host);

    let mut orchestrator = Orchestrator::new(&api, &mut sensor, &queue);
    let report = orchestrator.startup();

    match report.sync {
        Ok(SyncOutcome::Offline) => {
            println!("Template sync skipped: no network link");
        }
        Ok(SyncOutcome::Completed { succeeded, failed }) => {
            println!("Template sync: {succeeded} loaded, {failed} failed");
            stats.record_sync(succeeded as u64, failed as u64);
        }
        Err(e) => {
            eprintln!("Template sync failed: {e}");
        }
    }

    match report.drain {
        Ok(drain) => {
            println!(
                "Queue drain: {} delivered, {} still queued, {} malformed dropped",
                drain.delivered, drain.retained, drain.dropped
            );
            stats.record_drained(drain.delivered as u64);
        }
        Err(e) => {
            eprintln!("Queue drain failed: {e}");
        }
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }
}

fn cmd_enroll() {
    let config = load_config();
    let api = connect_server(&config);
    let mut sensor = open_sensor(&config);
    let mut stats = open_stats(&config);

    println!("Place finger on the sensor...");

    let mut engine = SyncEngine::new(&api, &mut sensor);
    match engine.enroll() {
        Ok(identity) => {
            println!("Enrolled as identity {identity}");
            stats.record_enrollment();
            if let Err(e) = stats.save() {
                eprintln!("Warning: Could not save stats: {e}");
            }
        }
        Err(e) => {
            eprintln!("Enrollment failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_drain() {
    let config = load_config();
    let api = connect_server(&config);
    let queue = OfflineQueue::new(&config.queue_path);
    let mut stats = open_stats(&config);

    match queue.drain(|event| api.attendance(event).is_ok()) {
        Ok(report) => {
            println!(
                "Drained: {} delivered, {} still queued, {} malformed dropped",
                report.delivered, report.retained, report.dropped
            );
            stats.record_drained(report.delivered as u64);
            if let Err(e) = stats.save() {
                eprintln!("Warning: Could not save stats: {e}");
            }
        }
        Err(e) => {
            eprintln!("Drain failed: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_record(identity: u16, room: Option<u16>) {
    let config = load_config();
    let api = connect_server(&config);
    let queue = OfflineQueue::new(&config.queue_path);
    let mut stats = open_stats(&config);

    let event = AttendanceEvent::capture(identity, room.unwrap_or(config.room));
    stats.record_event();

    let delivery = match orchestrator::deliver_or_enqueue(&api, &queue, &event) {
        Ok(delivery) => delivery,
        Err(storage) => {
            eprintln!("Error: Event lost, storage unavailable: {storage}");
            std::process::exit(1);
        }
    };

    match delivery {
        Delivery::Sent => {
            println!("Attendance delivered (identity {identity})");
            stats.record_delivered_live();
        }
        Delivery::Queued => {
            println!("Server unreachable; attendance queued (identity {identity})");
            stats.record_queued();
        }
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }
}

fn cmd_status() {
    let config = load_config();
    let api = connect_server(&config);
    let queue = OfflineQueue::new(&config.queue_path);
    let stats = open_stats(&config);

    println!("Presentia Edge Agent Status");
    println!("===========================");
    println!();
    println!("Server: {}", config.server.host);
    println!(
        "Link: {}",
        if api.link_up() { "up" } else { "down" }
    );
    println!("Sensor port: {}", config.sensor.port);
    println!("Room: {}", config.room);
    println!("Queued events: {}", queue.len());
    println!();
    println!("{}", stats.summary());
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
