//! Forecast sources.

use chrono::{Days, Local, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;

use super::model::{WeatherForecast, SUMMARIES};
use super::ForecastError;

/// Lowest temperature a random forecast can report, in Celsius.
pub const MIN_TEMPERATURE_C: i32 = -20;
/// Highest temperature a random forecast can report, in Celsius.
pub const MAX_TEMPERATURE_C: i32 = 54;

/// Produces forecast records for the days following today.
pub trait ForecastSource: Send + Sync {
    fn forecast(&self, days: usize) -> Result<Vec<WeatherForecast>, ForecastError>;
}

/// Random forecasts starting tomorrow.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomForecasts;

impl RandomForecasts {
    /// Forecasts for the `days` days after `today`.
    pub fn forecast_from(
        &self,
        today: NaiveDate,
        days: usize,
    ) -> Result<Vec<WeatherForecast>, ForecastError> {
        let mut rng = rand::thread_rng();

        (1..=days as u64)
            .map(|offset| {
                let date = today
                    .checked_add_days(Days::new(offset))
                    .ok_or(ForecastError::DateOutOfRange)?;
                let temperature_c = rng.gen_range(MIN_TEMPERATURE_C..=MAX_TEMPERATURE_C);
                let summary = SUMMARIES.choose(&mut rng).map(|s| (*s).to_string());
                Ok(WeatherForecast::new(date, temperature_c, summary))
            })
            .collect()
    }
}

impl ForecastSource for RandomForecasts {
    fn forecast(&self, days: usize) -> Result<Vec<WeatherForecast>, ForecastError> {
        self.forecast_from(Local::now().date_naive(), days)
    }
}
