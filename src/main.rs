//! Observe.Me: a weather forecast service instrumented with OpenTelemetry.
//!
//! # Usage
//!
//! ```bash
//! observe-me --port 8080 --otel-endpoint http://localhost:4317
//! ```
//!
//! Environment variables can also be used:
//! - `OBSERVE_ME_PORT`: Port to listen on
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP collector; telemetry stays local when unset
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context as _;
use observe_me::config::Config;
use observe_me::observability::TelemetryPipeline;
use observe_me::server::run_server;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let export = config
        .telemetry()
        .export_endpoint()
        .map_or_else(|| "disabled (console only)".to_string(), |e| format!("OTLP/gRPC -> {e}"));
    eprintln!(
        r#"
  Observe.Me v{} - Instrumented Weather Forecasts

  Configuration:
    Address:    {}:{}
    Service:    {}
    Export:     {}
    Log Level:  {}

  Press Ctrl+C to shutdown gracefully.
"#,
        version, config.host, config.port, config.service_name, export, config.log_level
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Build the telemetry pipeline (with optional OTLP export) and install logging
    let pipeline = TelemetryPipeline::from_config(&config.telemetry())
        .context("failed to build telemetry pipeline")?;
    pipeline
        .install(&config.log_settings())
        .context("failed to install log subscriber")?;

    print_banner(&config);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating shutdown...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = ctrl_c.await {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }

        // Signal shutdown
        let _ = shutdown_tx.send(true);
    });

    // Run the server
    run_server(config, pipeline.instruments(), shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    // Flush the final batches before exiting
    tokio::task::spawn_blocking(move || pipeline.shutdown())
        .await
        .context("telemetry shutdown task failed")?;

    tracing::info!("Observe.Me shutdown complete");
    Ok(())
}
