//! Configuration parsing for the Observe.Me service.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides, including the standard `OTEL_*` names
//! - Sensible defaults for quick start

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::observability::{LogFormat, LogSettings, TelemetryConfig};

/// Observe.Me: an instrumented weather forecast service.
#[derive(Parser, Debug, Clone)]
#[command(name = "observe-me")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "OBSERVE_ME_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "OBSERVE_ME_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log filter directives (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Console log format
    #[arg(long, env = "OBSERVE_ME_LOG_FORMAT", value_enum, default_value_t = ConsoleFormat::Text)]
    pub log_format: ConsoleFormat,

    /// Number of forecast records returned per request
    #[arg(long, env = "OBSERVE_ME_FORECAST_DAYS", default_value_t = 5)]
    pub forecast_days: usize,

    /// OpenTelemetry collector endpoint (optional, disables export when absent)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// Service name reported on every exported signal
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "observe-me")]
    pub service_name: String,

    /// Timeout for a single OTLP export call, in milliseconds
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TIMEOUT", default_value_t = 10_000)]
    pub otel_export_timeout_ms: u64,

    /// Interval between metric exports, in milliseconds
    #[arg(long, env = "OTEL_METRIC_EXPORT_INTERVAL", default_value_t = 10_000)]
    pub metric_export_interval_ms: u64,
}

/// Console log format selectable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

impl From<ConsoleFormat> for LogFormat {
    fn from(format: ConsoleFormat) -> Self {
        match format {
            ConsoleFormat::Text => LogFormat::Text,
            ConsoleFormat::Json => LogFormat::Json,
        }
    }
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Telemetry settings derived from this configuration.
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            endpoint: self.otel_endpoint.clone(),
            service_name: self.service_name.clone(),
            export_timeout: Duration::from_millis(self.otel_export_timeout_ms),
            metric_export_interval: Duration::from_millis(self.metric_export_interval_ms),
        }
    }

    /// Console logging settings derived from this configuration.
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            filter: self.log_level.clone(),
            format: self.log_format.into(),
            test_writer: false,
        }
    }

    /// Create a default configuration for testing.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0, // Random port
            log_level: "debug".into(),
            log_format: ConsoleFormat::Text,
            forecast_days: 5,
            otel_endpoint: None,
            service_name: "observe-me-test".into(),
            otel_export_timeout_ms: 500,
            metric_export_interval_ms: 1_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            log_level: "info".into(),
            log_format: ConsoleFormat::Text,
            forecast_days: 5,
            otel_endpoint: None,
            service_name: "observe-me".into(),
            otel_export_timeout_ms: 10_000,
            metric_export_interval_ms: 10_000,
        }
    }
}
