//! HTTP server setup and lifecycle.
//!
//! Configures the axum router with:
//! - `GET /weatherforecast`
//! - Request spans and request metrics
//! - Graceful shutdown support

use axum::extract::State;
use axum::routing::get;
use axum::{middleware, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::forecast::{ForecastError, RandomForecasts, WeatherForecast};
use crate::observability::http::{make_request_span, record_response, track_requests};
use crate::observability::{Instruments, RequestScope};
use crate::service::ForecastService;

/// Build the router serving the forecast endpoint.
pub fn create_router(service: Arc<ForecastService>) -> Router {
    let instruments = Arc::clone(service.instruments());

    Router::new()
        .route("/weatherforecast", get(weather_forecast_handler))
        .with_state(service)
        .layer(middleware::from_fn_with_state(instruments, track_requests))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(record_response),
        )
}

/// Handle GET /weatherforecast.
async fn weather_forecast_handler(
    State(service): State<Arc<ForecastService>>,
    scope: RequestScope,
) -> Result<Json<Vec<WeatherForecast>>, ForecastError> {
    service.weather_forecast(&scope).map(Json)
}

/// Run the HTTP server on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Starting Observe.Me HTTP server");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            tracing::info!("Shutdown signal received, stopping server");
        })
        .await
}

/// Run the Observe.Me HTTP server.
///
/// # Arguments
///
/// * `config` - Server configuration
/// * `instruments` - Telemetry instruments shared by all requests
/// * `shutdown_rx` - Receiver for shutdown signal
///
/// # Returns
///
/// Returns when the server has shut down.
pub async fn run_server(
    config: Config,
    instruments: Arc<Instruments>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let service = Arc::new(ForecastService::new(
        Arc::new(RandomForecasts),
        instruments,
        config.forecast_days,
    ));

    let listener = TcpListener::bind(addr).await?;
    serve(listener, create_router(service), shutdown_rx).await?;

    tracing::info!("Server stopped");
    Ok(())
}
