//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! A missing or unparsable file falls back to built-in defaults.

use crate::domain::types::{Coordinate, Zone, ZoneKind};
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Interval between foreground watch updates
    #[serde(default = "default_foreground_interval_ms")]
    pub foreground_interval_ms: u64,
    /// Interval requested for background delivery
    #[serde(default = "default_background_interval_ms")]
    pub background_interval_ms: u64,
    /// Minimum movement before the platform reports a new fix
    #[serde(default = "default_min_displacement_m")]
    pub min_displacement_m: f64,
    /// Platform identifier of the background location task
    #[serde(default = "default_background_task_id")]
    pub background_task_id: String,
    /// Take one on-demand fix as soon as the session is active
    #[serde(default = "default_initial_fix")]
    pub initial_fix: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            foreground_interval_ms: default_foreground_interval_ms(),
            background_interval_ms: default_background_interval_ms(),
            min_displacement_m: default_min_displacement_m(),
            background_task_id: default_background_task_id(),
            initial_fix: default_initial_fix(),
        }
    }
}

fn default_foreground_interval_ms() -> u64 {
    5000
}

fn default_background_interval_ms() -> u64 {
    60_000
}

fn default_min_displacement_m() -> f64 {
    10.0
}

fn default_background_task_id() -> String {
    "zone-monitor-background".to_string()
}

fn default_initial_fix() -> bool {
    true
}

/// Persistent notification shown while background tracking runs
#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundNoticeConfig {
    #[serde(default = "default_notice_title")]
    pub title: String,
    #[serde(default = "default_notice_body")]
    pub body: String,
}

impl Default for BackgroundNoticeConfig {
    fn default() -> Self {
        Self { title: default_notice_title(), body: default_notice_body() }
    }
}

fn default_notice_title() -> String {
    "Zone monitoring active".to_string()
}

fn default_notice_body() -> String {
    "Watching your saved zones in the background".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Bound of the dispatch queue between the fix path and the notifier
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { queue_size: default_queue_size() }
    }
}

fn default_queue_size() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    /// File path for the transition journal (JSONL format)
    #[serde(default = "default_journal_file")]
    pub file: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { enabled: default_journal_enabled(), file: default_journal_file() }
    }
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_file() -> String {
    "transitions.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReplayConfig {
    /// Delay between replayed fixes (0 = as fast as possible)
    #[serde(default)]
    pub pace_ms: u64,
}

/// Zone as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub kind: ZoneKind,
    #[serde(default = "default_notify")]
    pub notify_on_entry: bool,
    #[serde(default = "default_notify")]
    pub notify_on_exit: bool,
}

fn default_notify() -> bool {
    true
}

impl From<ZoneEntry> for Zone {
    fn from(entry: ZoneEntry) -> Self {
        Zone {
            id: entry.id,
            name: entry.name,
            center: Coordinate::new(entry.latitude, entry.longitude),
            radius_m: entry.radius_m,
            kind: entry.kind,
            notify_on_entry: entry.notify_on_entry,
            notify_on_exit: entry.notify_on_exit,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub background_notice: BackgroundNoticeConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub zones: Vec<ZoneEntry>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    foreground_interval_ms: u64,
    background_interval_ms: u64,
    min_displacement_m: f64,
    background_task_id: String,
    initial_fix: bool,
    notice_title: String,
    notice_body: String,
    notification_queue_size: usize,
    journal_enabled: bool,
    journal_file: String,
    metrics_interval_secs: u64,
    replay_pace_ms: u64,
    zones: Vec<Zone>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        let TomlConfig { tracking, background_notice, notifications, journal, metrics, replay, zones } =
            toml_config;

        Self {
            foreground_interval_ms: tracking.foreground_interval_ms,
            background_interval_ms: tracking.background_interval_ms,
            min_displacement_m: tracking.min_displacement_m,
            background_task_id: tracking.background_task_id,
            initial_fix: tracking.initial_fix,
            notice_title: background_notice.title,
            notice_body: background_notice.body,
            notification_queue_size: notifications.queue_size,
            journal_enabled: journal.enabled,
            journal_file: journal.file,
            metrics_interval_secs: metrics.interval_secs,
            replay_pace_ms: replay.pace_ms,
            zones: zones.into_iter().map(Zone::from).collect(),
            config_file,
        }
    }

    /// Config path used when none is given on the command line
    pub fn default_config_path() -> String {
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn foreground_interval_ms(&self) -> u64 {
        self.foreground_interval_ms
    }

    pub fn background_interval_ms(&self) -> u64 {
        self.background_interval_ms
    }

    pub fn min_displacement_m(&self) -> f64 {
        self.min_displacement_m
    }

    pub fn background_task_id(&self) -> &str {
        &self.background_task_id
    }

    pub fn initial_fix(&self) -> bool {
        self.initial_fix
    }

    pub fn notice_title(&self) -> &str {
        &self.notice_title
    }

    pub fn notice_body(&self) -> &str {
        &self.notice_body
    }

    pub fn notification_queue_size(&self) -> usize {
        self.notification_queue_size
    }

    pub fn journal_enabled(&self) -> bool {
        self.journal_enabled
    }

    pub fn journal_file(&self) -> &str {
        &self.journal_file
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn replay_pace_ms(&self) -> u64 {
        self.replay_pace_ms
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to override the initial on-demand fix
    pub fn with_initial_fix(mut self, enabled: bool) -> Self {
        self.initial_fix = enabled;
        self
    }
}
