//! Zone monitor - geofence entry/exit notifications
//!
//! Replays recorded location fixes through the monitoring engine and emits
//! notifications when the user enters or leaves a configured zone.
//!
//! Module structure:
//! - `domain/` - Core types (Zone, LocationFix, TransitionEvent) and geometry
//! - `io/` - Platform interfaces (location source, notifier, journal)
//! - `services/` - Engine (ZoneMonitor, status tracking, transition detection)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use zone_monitor::domain::TrackingMode;
use zone_monitor::infra::{Config, Metrics};
use zone_monitor::io::{BackgroundTaskAdapter, LogNotifier, ReplaySource, TransitionJournal};
use zone_monitor::services::{create_notification_worker, ZoneMonitor};

/// Zone monitor - geofence entry/exit notifications
#[derive(Parser, Debug)]
#[command(name = "zone-monitor", version = env!("GIT_HASH"), about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE or config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// JSONL file of recorded fixes to replay
    #[arg(short, long)]
    fixes: String,

    /// Tracking mode (foreground or background)
    #[arg(short, long, default_value = "foreground")]
    mode: TrackingMode,

    /// Background task payload (JSON) to deliver after the replay
    #[arg(long)]
    background_payload: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity, default INFO
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = %env!("GIT_HASH"), "zone-monitor starting");

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::default_config_path);
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        zones = %config.zones().len(),
        mode = %args.mode.as_str(),
        foreground_interval_ms = %config.foreground_interval_ms(),
        background_interval_ms = %config.background_interval_ms(),
        min_displacement_m = %config.min_displacement_m(),
        journal_enabled = %config.journal_enabled(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());

    // Notification worker (drains transitions off the fix path)
    let (dispatch_tx, worker) = create_notification_worker(
        Arc::new(LogNotifier),
        metrics.clone(),
        config.notification_queue_size(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // Metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    let source = Arc::new(
        ReplaySource::from_file(&args.fixes, Duration::from_millis(config.replay_pace_ms()))
            .with_context(|| format!("Failed to load fixes from {}", args.fixes))?,
    );
    let zones = config.zones().to_vec();
    let journal_file = config.journal_enabled().then(|| config.journal_file().to_string());
    let task_id = config.background_task_id().to_string();

    let monitor = ZoneMonitor::new(config, source.clone(), dispatch_tx, metrics.clone());

    let journal_handle = journal_file.map(|file_path| {
        let journal = TransitionJournal::new(&file_path);
        tokio::spawn(journal.run(monitor.subscribe_events()))
    });

    if !monitor.start(args.mode, zones).await {
        anyhow::bail!("Failed to start monitoring in {} mode", args.mode.as_str());
    }

    tokio::select! {
        _ = source.finished() => info!("replay_finished"),
        _ = tokio::signal::ctrl_c() => info!("shutdown_signal_received"),
    }

    if let Some(path) = &args.background_payload {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read background payload {}", path))?;
        let adapter = BackgroundTaskAdapter::new(task_id, Arc::new(monitor.clone()), metrics.clone());
        match adapter.handle_raw(&raw) {
            Ok(outcomes) => info!(task_id = %adapter.task_id(), fixes = %outcomes.len(), "background_payload_delivered"),
            Err(e) => warn!(task_id = %adapter.task_id(), error = %e, "background_payload_failed"),
        }
    }

    monitor.stop().await;

    for status in monitor.statuses().iter() {
        info!(
            zone_id = %status.zone_id,
            is_inside = %status.is_inside,
            distance_m = format!("{:.1}", status.distance_m),
            observed_at = %status.observed_at,
            "final_status"
        );
    }

    // Dropping the monitor closes the dispatch and event channels, so the
    // worker and the journal drain what is queued and exit
    drop(monitor);
    let _ = worker_handle.await;

    if let Some(handle) = journal_handle {
        let _ = handle.await;
    }

    metrics.report().log();
    info!("zone-monitor shutdown complete");
    Ok(())
}
