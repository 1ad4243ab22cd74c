//! Observe.Me: a weather forecast service instrumented with OpenTelemetry.
//!
//! Every `GET /weatherforecast` request opens a span, writes a log record,
//! and adds to a counter. All three signals flow through one
//! [`observability::TelemetryPipeline`], which forwards them over OTLP when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set and stays local otherwise.
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`forecast`]: Forecast records and the sources that produce them
//! - [`observability`]: Telemetry pipeline, instruments and log subscriber
//! - [`server`]: HTTP router and server lifecycle
//! - [`service`]: The instrumented request handler

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // observability::TelemetryPipeline is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod forecast;
pub mod observability;
pub mod server;
pub mod service;
