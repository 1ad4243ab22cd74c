//! Scoped spans on top of the OpenTelemetry tracer.
//!
//! A [`ScopedSpan`] is attached as the current OpenTelemetry context while
//! it lives, so nested spans become its children and log records emitted
//! inside it carry its trace id. It is always ended exactly once: by
//! [`ScopedSpan::close`], by [`ScopedSpan::fail`], or by `Drop` on any
//! other exit path (early return, panic unwind, cancelled future).

use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{Context, ContextGuard, KeyValue, Value};
use opentelemetry_sdk::trace::Tracer as SdkTracer;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Status description for spans dropped without being closed.
pub const DROPPED_SPAN: &str = "span dropped before completion";

/// Counts of spans started and closed by a [`SpanSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanStats {
    pub started: u64,
    pub closed: u64,
}

impl SpanStats {
    /// Spans started but not yet closed.
    pub fn open(&self) -> u64 {
        self.started.saturating_sub(self.closed)
    }
}

#[derive(Debug, Default)]
struct Counts {
    started: AtomicU64,
    closed: AtomicU64,
}

/// Named source of spans.
pub struct SpanSource {
    name: &'static str,
    tracer: SdkTracer,
    counts: Arc<Counts>,
}

impl SpanSource {
    /// Create a span source backed by `tracer`.
    pub fn new(name: &'static str, tracer: SdkTracer) -> Self {
        Self {
            name,
            tracer,
            counts: Arc::new(Counts::default()),
        }
    }

    /// Name the source was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Start a span and make it the current context.
    ///
    /// The parent is the currently attached OpenTelemetry span if there is
    /// one, otherwise the span behind the current `tracing` span (such as
    /// the HTTP request span).
    pub fn start(&self, name: &'static str) -> ScopedSpan {
        let parent = if Context::current().has_active_span() {
            Context::current()
        } else {
            tracing::Span::current().context()
        };

        let span = self.tracer.start_with_context(name, &parent);
        let cx = parent.with_span(span);
        let guard = cx.clone().attach();
        self.counts.started.fetch_add(1, Ordering::SeqCst);

        ScopedSpan {
            name,
            cx,
            started_at: Instant::now(),
            counts: Arc::clone(&self.counts),
            closed: false,
            _guard: guard,
        }
    }

    /// Snapshot of started/closed counts.
    pub fn stats(&self) -> SpanStats {
        SpanStats {
            started: self.counts.started.load(Ordering::SeqCst),
            closed: self.counts.closed.load(Ordering::SeqCst),
        }
    }
}

/// An open span, attached as the current context until it is closed.
///
/// Closing consumes the handle, so tags can only be set while the span is
/// open.
#[must_use = "dropping a ScopedSpan immediately ends it as failed"]
pub struct ScopedSpan {
    name: &'static str,
    cx: Context,
    started_at: Instant,
    counts: Arc<Counts>,
    closed: bool,
    // Detaches the context on drop; must be dropped after the span ends.
    _guard: ContextGuard,
}

impl ScopedSpan {
    /// Set a key-value tag on the span.
    pub fn set_tag(&self, key: &'static str, value: impl Into<Value>) {
        self.cx.span().set_attribute(KeyValue::new(key, value));
    }

    /// End the span successfully.
    pub fn close(mut self) {
        self.end(None);
    }

    /// End the span with an error status describing `error`.
    pub fn fail(mut self, error: &dyn std::error::Error) {
        self.end(Some(Cow::Owned(error.to_string())));
    }

    fn end(&mut self, error: Option<Cow<'static, str>>) {
        if self.closed {
            return;
        }
        self.closed = true;

        let span = self.cx.span();
        if let Some(description) = error {
            span.set_status(Status::error(description));
        }
        span.end();
        self.counts.closed.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            span = self.name,
            elapsed_ms = self.started_at.elapsed().as_secs_f64() * 1000.0,
            "Span closed"
        );
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        if !self.closed {
            self.end(Some(Cow::Borrowed(DROPPED_SPAN)));
        }
    }
}
