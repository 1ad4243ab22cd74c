//! Weather forecast handler.
//!
//! Each call runs, in order: open the `WeatherForecastActivity` span, log,
//! produce the payload, add its length to `forecasts.count`, tag the span,
//! close the span.

use std::sync::Arc;

use crate::forecast::{ForecastError, ForecastSource, WeatherForecast};
use crate::observability::{Instruments, RequestScope};

/// Name of the span opened for every forecast request.
pub const FORECAST_SPAN: &str = "WeatherForecastActivity";
/// Tag set on every successful forecast span.
pub const FORECAST_TAG: &str = "forecast";
/// Value of [`FORECAST_TAG`].
pub const FORECAST_TAG_VALUE: &str = "Proudly provided by Observe.Me";
/// Default number of records per response.
pub const DEFAULT_FORECAST_DAYS: usize = 5;

/// Instrumented forecast handler.
pub struct ForecastService {
    source: Arc<dyn ForecastSource>,
    instruments: Arc<Instruments>,
    days: usize,
}

impl ForecastService {
    /// Create a handler serving `days` records per request from `source`.
    pub fn new(
        source: Arc<dyn ForecastSource>,
        instruments: Arc<Instruments>,
        days: usize,
    ) -> Self {
        Self {
            source,
            instruments,
            days,
        }
    }

    /// Instruments this handler reports to.
    pub fn instruments(&self) -> &Arc<Instruments> {
        &self.instruments
    }

    /// Produce forecasts for the next `days` days.
    ///
    /// The log record carries the values of `scope`. On failure the span is
    /// ended with an error status before the error is returned; telemetry
    /// itself never fails the call.
    pub fn weather_forecast(
        &self,
        scope: &RequestScope,
    ) -> Result<Vec<WeatherForecast>, ForecastError> {
        let span = self.instruments.spans.start(FORECAST_SPAN);

        tracing::info!(
            http.request.method = %scope.method,
            http.route = %scope.route,
            days = self.days,
            "Sending forecasts"
        );

        let forecasts = match self.source.forecast(self.days) {
            Ok(forecasts) => forecasts,
            Err(e) => {
                span.fail(&e);
                return Err(e);
            }
        };

        self.instruments.forecasts.add(forecasts.len() as u64);
        span.set_tag(FORECAST_TAG, FORECAST_TAG_VALUE);
        span.close();

        Ok(forecasts)
    }
}
