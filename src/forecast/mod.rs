//! Weather forecast records and the sources that produce them.

pub mod model;
pub mod source;

pub use model::{WeatherForecast, SUMMARIES};
pub use source::{ForecastSource, RandomForecasts};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while producing forecasts.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("forecast date out of range")]
    DateOutOfRange,

    #[error("forecast source unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ForecastError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Forecast request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
    }
}
