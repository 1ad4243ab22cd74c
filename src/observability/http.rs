//! HTTP server instrumentation.
//!
//! - Request spans for `tower_http::trace::TraceLayer`, joined to the
//!   caller's trace through W3C `traceparent` headers
//! - Duration and in-flight metrics via an axum middleware
//! - Request scope values for log records emitted by handlers

use axum::async_trait;
use axum::body::Body;
use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, Response, Uri};
use axum::middleware::Next;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::pipeline::Instruments;

/// Reads propagation headers from an HTTP header map.
struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Create the server span for an incoming request.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let span = tracing::info_span!(
        target: "tower_http::trace",
        "HTTP request",
        otel.name = %format!("{} {}", request.method(), route_of(request)),
        otel.kind = "server",
        http.request.method = %request.method(),
        url.path = %request.uri().path(),
        http.response.status_code = tracing::field::Empty,
    );

    let parent = TraceContextPropagator::new().extract(&HeaderExtractor(request.headers()));
    span.set_parent(parent);
    span
}

/// Record the response status on the server span.
pub fn record_response(response: &Response<Body>, latency: Duration, span: &Span) {
    span.record("http.response.status_code", response.status().as_u16());
    tracing::info!(
        target: "tower_http::trace",
        status = response.status().as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        "Finished processing request"
    );
}

/// Middleware recording request duration and in-flight count.
pub async fn track_requests(
    State(instruments): State<Arc<Instruments>>,
    request: Request,
    next: Next,
) -> Response<Body> {
    let method = request.method().to_string();
    let route = route_of(&request);

    let _active = instruments.http.track_active(&method, &route);
    let start = Instant::now();
    let response = next.run(request).await;

    instruments
        .http
        .record_request(&method, &route, response.status().as_u16(), start.elapsed());
    response
}

/// Scope values of the request being handled.
///
/// Handlers attach these as fields of the log records they emit, so every
/// exported record names the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Matched route template, or the raw path when no route matched.
    pub route: String,
}

impl RequestScope {
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            method: parts.method.to_string(),
            route: matched_route(&parts.extensions, &parts.uri),
        })
    }
}

fn route_of<B>(request: &Request<B>) -> String {
    matched_route(request.extensions(), request.uri())
}

fn matched_route(extensions: &Extensions, uri: &Uri) -> String {
    extensions
        .get::<MatchedPath>()
        .map_or_else(|| uri.path().to_string(), |path| path.as_str().to_string())
}
