//! OpenTelemetry metric instruments.
//!
//! Key metrics:
//! - forecasts.count: Counter of forecast records sent
//! - http.server.request.duration: Histogram of request latency in seconds
//! - http.server.active_requests: Up/down counter of in-flight requests

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Name of the forecast counter.
pub const FORECASTS_COUNT: &str = "forecasts.count";

/// Counter of forecast records handed out by the service.
///
/// Every delta goes to the OpenTelemetry counter (picked up by the next
/// collection cycle) and to a local atomic running total, so the total is
/// observable whether or not an exporter is attached.
#[derive(Debug)]
pub struct ForecastCounter {
    counter: Counter<u64>,
    total: AtomicU64,
}

impl ForecastCounter {
    /// Create the counter on the given meter.
    pub fn new(meter: &Meter) -> Self {
        Self {
            counter: meter
                .u64_counter(FORECASTS_COUNT)
                .with_description("Counts the number of weather forecasts sent")
                .with_unit("{forecast}")
                .init(),
            total: AtomicU64::new(0),
        }
    }

    /// Add `delta` forecasts to the running total.
    pub fn add(&self, delta: u64) {
        self.counter.add(delta, &[]);
        self.total.fetch_add(delta, Ordering::SeqCst);
    }

    /// Sum of every delta added since the counter was created.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

/// HTTP server instruments.
#[derive(Debug)]
pub struct HttpServerMetrics {
    request_duration: Histogram<f64>,
    active_requests: UpDownCounter<i64>,
}

impl HttpServerMetrics {
    /// Create the HTTP server instruments on the given meter.
    pub fn new(meter: &Meter) -> Self {
        Self {
            request_duration: meter
                .f64_histogram("http.server.request.duration")
                .with_description("Duration of HTTP server requests")
                .with_unit("s")
                .init(),
            active_requests: meter
                .i64_up_down_counter("http.server.active_requests")
                .with_description("Number of in-flight HTTP server requests")
                .with_unit("{request}")
                .init(),
        }
    }

    /// Mark a request as in flight until the returned guard is dropped.
    pub fn track_active(&self, method: &str, route: &str) -> ActiveRequest<'_> {
        let attrs = vec![
            KeyValue::new("http.request.method", method.to_string()),
            KeyValue::new("http.route", route.to_string()),
        ];
        self.active_requests.add(1, &attrs);
        ActiveRequest {
            counter: &self.active_requests,
            attrs,
        }
    }

    /// Record a completed request.
    pub fn record_request(&self, method: &str, route: &str, status: u16, elapsed: Duration) {
        let attrs = [
            KeyValue::new("http.request.method", method.to_string()),
            KeyValue::new("http.route", route.to_string()),
            KeyValue::new("http.response.status_code", i64::from(status)),
        ];
        self.request_duration.record(elapsed.as_secs_f64(), &attrs);
    }
}

/// In-flight marker returned by [`HttpServerMetrics::track_active`].
///
/// Decrements the active request count on drop, which also covers requests
/// whose futures are cancelled.
pub struct ActiveRequest<'a> {
    counter: &'a UpDownCounter<i64>,
    attrs: Vec<KeyValue>,
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.counter.add(-1, &self.attrs);
    }
}
