//! Request handlers for Observe.Me.

pub mod forecast;

pub use forecast::ForecastService;
