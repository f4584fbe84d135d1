//! # skiff-telemetry
//!
//! Tracing setup for skiff binaries: an `EnvFilter`-gated fmt layer (JSON or
//! pretty, written to stderr) plus a [`RecentLogLayer`] that keeps recent
//! warn+ records in memory so the CLI can print them after a replay. Stdout is
//! left to the replay report.

#![deny(unsafe_code)]

mod logging;

pub use logging::{LogQuery, LogRecord, RecentLogLayer, RecentLogSink};

use std::sync::Arc;

use skiff_settings::LoggingSettings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: LevelFilter,
    /// Per-module level overrides (e.g. `skiff_bus` => TRACE).
    pub module_levels: Vec<(String, LevelFilter)>,
    /// JSON lines instead of pretty output.
    pub json: bool,
    /// Capacity of the in-memory warn+ ring. Zero disables it.
    pub recent_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            module_levels: Vec::new(),
            json: false,
            recent_capacity: 256,
        }
    }
}

impl TelemetryConfig {
    /// Build from the `logging` settings section.
    ///
    /// An unparseable level falls back to `info`.
    pub fn from_settings(logging: &LoggingSettings) -> Self {
        Self {
            log_level: logging.level.parse().unwrap_or(LevelFilter::INFO),
            module_levels: Vec::new(),
            json: logging.json,
            recent_capacity: logging.recent_capacity,
        }
    }

    /// Filter directive string, e.g. `info,skiff_bus=trace`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{module}={}", level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Handle to the installed telemetry.
pub struct TelemetryGuard {
    recent: Option<Arc<RecentLogSink>>,
}

impl TelemetryGuard {
    /// Recent warn+ records, if the ring is enabled.
    pub fn recent(&self) -> Option<&RecentLogSink> {
        self.recent.as_deref()
    }
}

/// Initialize tracing. Call once at startup.
///
/// A second call leaves the first subscriber in place; the returned guard then
/// still owns a working (but unattached) recent-log ring.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    let recent = (config.recent_capacity > 0)
        .then(|| Arc::new(RecentLogSink::new(config.recent_capacity)));
    let recent_layer = recent.as_ref().map(|sink| RecentLogLayer::new(Arc::clone(sink)));

    if let Err(err) = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(recent_layer)
        .try_init()
    {
        eprintln!("skiff-telemetry: subscriber already installed: {err}");
    }

    TelemetryGuard { recent }
}
