//! Test utilities for Observe.Me tests.
//!
//! Provides:
//! - A telemetry pipeline whose exporters are in-memory collectors
//! - Router and handler construction on top of that pipeline
//! - Helpers for reading exported spans, logs and metrics
//! - An OTLP/gRPC collector for pipelines built from an endpoint

#![allow(dead_code)]

pub mod collector;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use observe_me::forecast::{ForecastSource, RandomForecasts};
use observe_me::observability::tracing::build_subscriber;
use observe_me::observability::{LogSettings, TelemetryPipeline};
use observe_me::server::create_router;
use observe_me::service::forecast::DEFAULT_FORECAST_DAYS;
use observe_me::service::ForecastService;
use opentelemetry::logs::AnyValue;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::data::Sum;
use opentelemetry_sdk::metrics::{ManualReader, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::testing::logs::in_memory_exporter::LogDataWithResource;
use opentelemetry_sdk::testing::logs::InMemoryLogsExporter;
use opentelemetry_sdk::testing::metrics::InMemoryMetricsExporter;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use std::sync::Arc;
use tower::ServiceExt;

/// Telemetry pipeline wired to in-memory exporters standing in for a collector.
pub struct TestCollector {
    pub pipeline: TelemetryPipeline,
    pub spans: InMemorySpanExporter,
    pub logs: InMemoryLogsExporter,
    /// Only present for collectors built with [`TestCollector::with_metric_export`].
    pub metrics: Option<InMemoryMetricsExporter>,
}

impl TestCollector {
    /// Spans and logs are exported as soon as they end; metrics are kept
    /// in-process.
    pub fn new() -> Self {
        let meter_provider = SdkMeterProvider::builder()
            .with_reader(ManualReader::builder().build())
            .build();
        Self::build(meter_provider, None)
    }

    /// Like [`TestCollector::new`] but metrics are exported through a
    /// periodic reader. Must be created inside a multi-threaded Tokio runtime.
    pub fn with_metric_export() -> Self {
        let exporter = InMemoryMetricsExporter::default();
        let reader = PeriodicReader::builder(exporter.clone(), runtime::Tokio).build();
        let meter_provider = SdkMeterProvider::builder().with_reader(reader).build();
        Self::build(meter_provider, Some(exporter))
    }

    fn build(meter_provider: SdkMeterProvider, metrics: Option<InMemoryMetricsExporter>) -> Self {
        let spans = InMemorySpanExporter::default();
        let tracer_provider = TracerProvider::builder()
            .with_simple_exporter(spans.clone())
            .build();

        let logs = InMemoryLogsExporter::default();
        let logger_provider = LoggerProvider::builder()
            .with_simple_exporter(logs.clone())
            .build();

        let pipeline =
            TelemetryPipeline::from_providers(tracer_provider, meter_provider, logger_provider, true);

        Self {
            pipeline,
            spans,
            logs,
            metrics,
        }
    }

    /// Install the pipeline's subscriber for the current thread.
    pub fn subscribe(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = build_subscriber(&self.pipeline, &LogSettings::for_tests())
            .expect("failed to build subscriber");
        tracing::subscriber::set_default(subscriber)
    }

    /// Forecast handler serving random forecasts.
    pub fn service(&self) -> Arc<ForecastService> {
        self.service_with(Arc::new(RandomForecasts))
    }

    /// Forecast handler serving from `source`.
    pub fn service_with(&self, source: Arc<dyn ForecastSource>) -> Arc<ForecastService> {
        Arc::new(ForecastService::new(
            source,
            self.pipeline.instruments(),
            DEFAULT_FORECAST_DAYS,
        ))
    }

    /// Router serving random forecasts.
    pub fn router(&self) -> Router {
        create_router(self.service())
    }

    /// Finished spans with the given name.
    pub fn spans_named(&self, name: &str) -> Vec<SpanData> {
        self.spans
            .get_finished_spans()
            .expect("failed to read spans")
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }

    /// Exported log records whose body is `message`.
    pub fn logs_with_body(&self, message: &str) -> Vec<LogDataWithResource> {
        self.logs
            .get_emitted_logs()
            .expect("failed to read logs")
            .into_iter()
            .filter(|log| {
                matches!(&log.record.body, Some(AnyValue::String(body)) if body.as_str() == message)
            })
            .collect()
    }

    /// Attribute keys of an exported log record.
    pub fn attribute_keys(log: &LogDataWithResource) -> Vec<String> {
        log.record
            .attributes_iter()
            .map(|(key, _)| key.as_str().to_string())
            .collect()
    }

    /// String value of attribute `key` on an exported log record.
    pub fn attribute(log: &LogDataWithResource, key: &str) -> Option<String> {
        log.record
            .attributes_iter()
            .find(|(k, _)| k.as_str() == key)
            .and_then(|(_, value)| match value {
                AnyValue::String(value) => Some(value.as_str().to_string()),
                _ => None,
            })
    }

    /// Highest exported value of the `u64` sum metric `name`.
    pub fn exported_sum(&self, name: &str) -> Option<u64> {
        let exporter = self.metrics.as_ref()?;
        let exported = exporter
            .get_finished_metrics()
            .expect("failed to read metrics");

        exported
            .iter()
            .flat_map(|resource| resource.scope_metrics.iter())
            .flat_map(|scope| scope.metrics.iter())
            .filter(|metric| metric.name == name)
            .filter_map(|metric| metric.data.as_any().downcast_ref::<Sum<u64>>())
            .map(|sum| sum.data_points.iter().map(|point| point.value).sum::<u64>())
            .max()
    }

    /// Flush all providers from a blocking thread.
    pub async fn flush(&self) {
        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || pipeline.force_flush())
            .await
            .expect("flush task panicked");
    }
}

impl Default for TestCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /weatherforecast` request.
pub fn forecast_request() -> Request<Body> {
    Request::builder()
        .uri("/weatherforecast")
        .body(Body::empty())
        .expect("failed to build request")
}

/// Send a forecast request through `router`.
pub async fn get_forecast(router: Router) -> Response<Body> {
    router
        .oneshot(forecast_request())
        .await
        .expect("router is infallible")
}

/// Read a response body into bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body")
        .to_vec()
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
