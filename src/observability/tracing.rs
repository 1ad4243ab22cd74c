//! Log and span subscriber setup.
//!
//! Configures structured logging with:
//! - Console output on stdout (text or JSON)
//! - `tracing` spans from registered targets bridged into OpenTelemetry traces
//! - `tracing` events bridged into OpenTelemetry log records

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use tracing::Subscriber;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

use super::pipeline::{TelemetryError, TelemetryPipeline};

/// Target used for diagnostics about the export pipeline itself.
///
/// Events on this target reach the console but are never bridged into
/// OpenTelemetry log records.
pub const EXPORT_DIAGNOSTICS_TARGET: &str = "observe_me::export";

/// `tracing` targets whose spans are exported as OpenTelemetry spans.
///
/// - `observe_me`: spans opened by this crate
/// - `tower_http::trace`: HTTP server request spans
pub const SPAN_TARGETS: &[&str] = &["observe_me", "tower_http::trace"];

/// Targets that must not feed the log bridge, since exporting their events
/// would produce more events.
const BRIDGE_EXCLUDED_TARGETS: &[&str] = &[
    EXPORT_DIAGNOSTICS_TARGET,
    "opentelemetry",
    "tonic",
    "h2",
    "hyper",
    "tower",
];

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Console logging settings.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `info,observe_me=debug`.
    pub filter: String,
    pub format: LogFormat,
    /// Write through the test harness instead of straight to stdout.
    pub test_writer: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::Text,
            test_writer: false,
        }
    }
}

impl LogSettings {
    /// Settings for tests: everything at info and above, captured output.
    pub fn for_tests() -> Self {
        Self {
            filter: "info".into(),
            format: LogFormat::Text,
            test_writer: true,
        }
    }
}

/// Build the subscriber that feeds the console and the pipeline.
///
/// The subscriber is not installed; use [`TelemetryPipeline::install`] for
/// the process-wide default or `tracing::subscriber::set_default` for a
/// scoped one.
pub fn build_subscriber(
    pipeline: &TelemetryPipeline,
    settings: &LogSettings,
) -> Result<impl Subscriber + Send + Sync + 'static, TelemetryError> {
    let filter = EnvFilter::try_new(&settings.filter)?;

    let console = match (settings.format, settings.test_writer) {
        (LogFormat::Text, false) => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        (LogFormat::Text, true) => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_test_writer()
            .boxed(),
        (LogFormat::Json, false) => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
        (LogFormat::Json, true) => tracing_subscriber::fmt::layer()
            .json()
            .with_test_writer()
            .boxed(),
    };

    let span_targets = SPAN_TARGETS
        .iter()
        .fold(Targets::new(), |targets, target| {
            targets.with_target(*target, LevelFilter::TRACE)
        });
    let spans = tracing_opentelemetry::layer()
        .with_tracer(pipeline.tracer_provider().tracer("observe-me"))
        .with_filter(span_targets);

    let bridge_filter = BRIDGE_EXCLUDED_TARGETS.iter().fold(
        Targets::new().with_default(LevelFilter::TRACE),
        |targets, target| targets.with_target(*target, LevelFilter::OFF),
    );
    let logs =
        OpenTelemetryTracingBridge::new(pipeline.logger_provider()).with_filter(bridge_filter);

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(spans)
        .with(logs))
}

/// Initialize console-only tracing for unit tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
