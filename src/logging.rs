//! # Structured Logging Module
//!
//! Two layers live here:
//!
//! - Process-level console logging built on `tracing-subscriber`, with the filter derived
//!   from `RUST_LOG` or from the deployment environment. `PGHA_LOG_FORMAT=json` switches
//!   to JSON lines for log shippers.
//! - The [`ClusterLogger`] capability handed to a [`Cluster`](crate::cluster::Cluster)
//!   through [`with_logger`](crate::config::with_logger). Host applications that already
//!   own a logging stack implement it themselves; [`TracingLogger`] forwards to `tracing`.
//!   When no logger is configured, node health events are simply not emitted.

use std::fmt;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize console logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let json = std::env::var("PGHA_LOG_FORMAT").is_ok_and(|format| format == "json");

        let layer = fmt_layer::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true);
        let result = if json {
            tracing_subscriber::registry()
                .with(layer.with_ansi(false).json().with_filter(filter))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    layer
                        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stdout()))
                        .with_filter(filter),
                )
                .try_init()
        };

        // A host application may already own the global subscriber
        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized - keeping it");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            started_at = %chrono::Utc::now().to_rfc3339(),
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("PGHA_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" | "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Severity of a [`ClusterLogger`] event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// One key/value attribute attached to a log event.
pub type LogField<'a> = (&'static str, &'a dyn fmt::Display);

/// Leveled logging capability with key/value attributes.
///
/// Implementations must be cheap to call from many probe tasks at once.
pub trait ClusterLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: &[LogField<'_>]);
}

/// Forwards [`ClusterLogger`] events to the `tracing` macros.
///
/// Field names are only known at runtime, so they are rendered into a single
/// `fields` attribute (`node=db-1 database=app primary=true`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

/// Render fields as space separated `key=value` pairs.
pub fn render_fields(fields: &[LogField<'_>]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl ClusterLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &[LogField<'_>]) {
        let fields = render_fields(fields);
        match level {
            LogLevel::Trace => tracing::trace!(fields = %fields, "{message}"),
            LogLevel::Debug => tracing::debug!(fields = %fields, "{message}"),
            LogLevel::Info => tracing::info!(fields = %fields, "{message}"),
            LogLevel::Warn => tracing::warn!(fields = %fields, "{message}"),
            LogLevel::Error => tracing::error!(fields = %fields, "{message}"),
        }
    }
}
