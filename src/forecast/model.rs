//! Forecast record served by `GET /weatherforecast`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Summary labels, coldest first.
pub const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// One day of forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    /// Day the forecast applies to, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub temperature_c: i32,
    /// Derived from `temperature_c`, see [`fahrenheit`].
    pub temperature_f: i32,
    pub summary: Option<String>,
}

impl WeatherForecast {
    pub fn new(date: NaiveDate, temperature_c: i32, summary: Option<String>) -> Self {
        Self {
            date,
            temperature_c,
            temperature_f: fahrenheit(temperature_c),
            summary,
        }
    }
}

/// Approximate Celsius to Fahrenheit conversion, truncated toward zero.
pub fn fahrenheit(celsius: i32) -> i32 {
    32 + (f64::from(celsius) / 0.5556) as i32
}
