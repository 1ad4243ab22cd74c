//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - One telemetry pipeline for traces, metrics and logs, exporting over
//!   OTLP when an endpoint is configured
//! - The forecast counter and span source used by request handlers
//! - HTTP server request spans and metrics
//! - Console logging bridged into OpenTelemetry log records

pub mod http;
pub mod metrics;
pub mod pipeline;
pub mod span;
pub mod tracing;

pub use http::RequestScope;
pub use metrics::{ForecastCounter, HttpServerMetrics};
pub use pipeline::{Instruments, TelemetryConfig, TelemetryError, TelemetryPipeline};
pub use span::{ScopedSpan, SpanSource, SpanStats};
pub use self::tracing::{LogFormat, LogSettings};
