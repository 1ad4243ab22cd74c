//! Telemetry pipeline assembly.
//!
//! One pipeline carries all three signals. When an OTLP endpoint is
//! configured, spans and log records go through batch processors and metrics
//! through a periodic reader, all exporting over gRPC on the Tokio runtime.
//! Without an endpoint the same providers are built with no exporters:
//! instruments keep working and logs still reach the console.

use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Config as TraceConfig, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::util::SubscriberInitExt;

use super::metrics::{ForecastCounter, HttpServerMetrics};
use super::span::SpanSource;
use super::tracing::{build_subscriber, LogSettings, EXPORT_DIAGNOSTICS_TARGET};

/// Instrumentation scope of the forecast counter and span source.
pub const FORECAST_SCOPE: &str = "Observe.Me";
/// Version reported for [`FORECAST_SCOPE`].
pub const FORECAST_SCOPE_VERSION: &str = "1.0.0";
/// Instrumentation scope of the HTTP server instruments.
pub const HTTP_SERVER_SCOPE: &str = "observe_me.http.server";

/// Errors raised while building or installing the pipeline.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build trace exporter: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("failed to build metrics exporter: {0}")]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error("failed to build log exporter: {0}")]
    Logs(#[from] opentelemetry::logs::LogError),

    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Export settings, read once at startup.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; `None` keeps telemetry local.
    pub endpoint: Option<String>,
    /// `service.name` resource attribute.
    pub service_name: String,
    /// Timeout for a single export call.
    pub export_timeout: Duration,
    /// Interval between metric collections.
    pub metric_export_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_name: "observe-me".into(),
            export_timeout: Duration::from_secs(10),
            metric_export_interval: Duration::from_secs(10),
        }
    }
}

impl TelemetryConfig {
    /// The endpoint to export to, if any. Blank values count as absent.
    pub fn export_endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
    }

    fn resource(&self) -> Resource {
        Resource::default().merge(&Resource::new([
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
    }
}

/// Instruments shared by every request handler.
pub struct Instruments {
    /// Counter of forecast records sent.
    pub forecasts: ForecastCounter,
    /// Source of forecast spans.
    pub spans: SpanSource,
    /// HTTP server request instruments.
    pub http: HttpServerMetrics,
}

/// The process-wide telemetry pipeline.
///
/// Owns the tracer, meter and logger providers. Request handlers only hold
/// the [`Instruments`] handle.
#[derive(Clone)]
pub struct TelemetryPipeline {
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: LoggerProvider,
    instruments: Arc<Instruments>,
    exporting: bool,
    endpoint: Option<String>,
}

impl TelemetryPipeline {
    /// Build the pipeline described by `config`.
    ///
    /// With an endpoint this must be called from within a Tokio runtime,
    /// since the exporters run as background tasks.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        match config.export_endpoint() {
            Some(endpoint) => Self::otlp(config, endpoint),
            None => Ok(Self::local(config)),
        }
    }

    /// Build a pipeline that exports over OTLP/gRPC to `endpoint`.
    pub fn otlp(config: &TelemetryConfig, endpoint: &str) -> Result<Self, TelemetryError> {
        let exporter = || {
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_protocol(Protocol::Grpc)
                .with_timeout(config.export_timeout)
        };
        let resource = config.resource();

        let tracer_provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter())
            .with_trace_config(TraceConfig::default().with_resource(resource.clone()))
            .install_batch(runtime::Tokio)?;

        let meter_provider = opentelemetry_otlp::new_pipeline()
            .metrics(runtime::Tokio)
            .with_exporter(exporter())
            .with_resource(resource.clone())
            .with_period(config.metric_export_interval)
            .build()?;

        let logger_provider = opentelemetry_otlp::new_pipeline()
            .logging()
            .with_exporter(exporter())
            .with_resource(resource)
            .install_batch(runtime::Tokio)?;

        let mut pipeline =
            Self::from_providers(tracer_provider, meter_provider, logger_provider, true);
        pipeline.endpoint = Some(endpoint.to_string());
        Ok(pipeline)
    }

    /// Build a pipeline with no exporters.
    ///
    /// Spans are still started and ended and counters still accumulate;
    /// nothing leaves the process.
    pub fn local(config: &TelemetryConfig) -> Self {
        let resource = config.resource();

        let tracer_provider = TracerProvider::builder()
            .with_config(TraceConfig::default().with_resource(resource.clone()))
            .build();
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(ManualReader::builder().build())
            .with_resource(resource.clone())
            .build();
        let logger_provider = LoggerProvider::builder().with_resource(resource).build();

        Self::from_providers(tracer_provider, meter_provider, logger_provider, false)
    }

    /// Assemble a pipeline from prebuilt providers.
    ///
    /// `exporting` reports whether any of the providers forwards signals
    /// out of the process.
    pub fn from_providers(
        tracer_provider: TracerProvider,
        meter_provider: SdkMeterProvider,
        logger_provider: LoggerProvider,
        exporting: bool,
    ) -> Self {
        let forecast_meter = meter_provider.versioned_meter(
            FORECAST_SCOPE,
            Some(FORECAST_SCOPE_VERSION),
            None::<&'static str>,
            None,
        );
        let http_meter = meter_provider.meter(HTTP_SERVER_SCOPE);

        let instruments = Instruments {
            forecasts: ForecastCounter::new(&forecast_meter),
            spans: SpanSource::new(FORECAST_SCOPE, tracer_provider.tracer(FORECAST_SCOPE)),
            http: HttpServerMetrics::new(&http_meter),
        };

        Self {
            tracer_provider,
            meter_provider,
            logger_provider,
            instruments: Arc::new(instruments),
            exporting,
            endpoint: None,
        }
    }

    /// Shared handle to the instruments.
    pub fn instruments(&self) -> Arc<Instruments> {
        Arc::clone(&self.instruments)
    }

    /// Whether signals are forwarded out of the process.
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// OTLP endpoint the pipeline exports to, if built by [`Self::otlp`].
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Tracer provider behind the span source and the request spans.
    pub fn tracer_provider(&self) -> &TracerProvider {
        &self.tracer_provider
    }

    /// Meter provider behind the counter and HTTP instruments.
    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.meter_provider
    }

    /// Logger provider fed by the `tracing` log bridge.
    pub fn logger_provider(&self) -> &LoggerProvider {
        &self.logger_provider
    }

    /// Install the pipeline's subscriber as the process-wide default and
    /// route OpenTelemetry export errors to the console.
    ///
    /// Fails if a global subscriber is already installed.
    pub fn install(&self, settings: &LogSettings) -> Result<(), TelemetryError> {
        build_subscriber(self, settings)?.try_init()?;
        self.announce();

        let handler = opentelemetry::global::set_error_handler(|error| {
            tracing::warn!(
                target: EXPORT_DIAGNOSTICS_TARGET,
                error = %error,
                "Telemetry export failed"
            );
        });
        if let Err(e) = handler {
            tracing::warn!(error = %e, "Failed to set OpenTelemetry error handler");
        }

        tracing::info!(
            exporting = self.exporting,
            filter = %settings.filter,
            "Telemetry initialized"
        );
        Ok(())
    }

    /// Log where telemetry goes.
    fn announce(&self) {
        match (self.endpoint(), self.exporting) {
            (Some(endpoint), _) => tracing::info!(
                target: EXPORT_DIAGNOSTICS_TARGET,
                endpoint,
                "OTLP exporter configured for traces, metrics and logs"
            ),
            (None, true) => tracing::info!(
                target: EXPORT_DIAGNOSTICS_TARGET,
                "Exporting through prebuilt providers"
            ),
            (None, false) => tracing::info!(
                target: EXPORT_DIAGNOSTICS_TARGET,
                "No OTLP endpoint configured, telemetry stays local"
            ),
        }
    }

    /// Push everything buffered to the exporters.
    ///
    /// Blocks until the exporters respond; call from a blocking context.
    pub fn force_flush(&self) {
        for result in self.tracer_provider.force_flush() {
            if let Err(e) = result {
                tracing::warn!(target: EXPORT_DIAGNOSTICS_TARGET, error = %e, "Span flush failed");
            }
        }
        if let Err(e) = self.meter_provider.force_flush() {
            tracing::warn!(target: EXPORT_DIAGNOSTICS_TARGET, error = %e, "Metric flush failed");
        }
        for result in self.logger_provider.force_flush() {
            if let Err(e) = result {
                tracing::warn!(target: EXPORT_DIAGNOSTICS_TARGET, error = %e, "Log flush failed");
            }
        }
    }

    /// Flush and stop all providers.
    ///
    /// Blocks until the final batches are exported; call from a blocking
    /// context.
    pub fn shutdown(&self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!(target: EXPORT_DIAGNOSTICS_TARGET, error = %e, "Tracer provider shutdown failed");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::warn!(target: EXPORT_DIAGNOSTICS_TARGET, error = %e, "Meter provider shutdown failed");
        }
        if let Err(e) = self.logger_provider.shutdown() {
            tracing::warn!(target: EXPORT_DIAGNOSTICS_TARGET, error = %e, "Logger provider shutdown failed");
        }
        tracing::info!(target: EXPORT_DIAGNOSTICS_TARGET, "Telemetry pipeline shut down");
    }
}
