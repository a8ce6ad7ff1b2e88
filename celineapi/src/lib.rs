//! IRCEL - CELINE client library for CelineAir
//!
//! This crate provides a Rust client for the public geo services of the
//! Belgian Interregional Environment Agency (IRCEL - CELINE).
//!
//! # Features
//!
//! - **RIO**: interpolated current measurements (hourly and 24h means)
//! - **RIO-IFDM**: finer interpolation for NO2, O3, PM10 and PM2.5
//! - **Forecast**: daily forecasts for today and the next 3 days
//! - **BelAQI**: composite 1-10 index, current and per forecast day
//!
//! # Example
//!
//! ```no_run
//! use celineapi::{belaqi_index_actual, IrcelineClient, Position};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IrcelineClient::new().await?;
//!     let position = Position::new(50.85, 4.35);
//!
//!     let belaqi = belaqi_index_actual(&client, chrono::Utc::now(), position).await?;
//!     println!("BelAQI: {:?}", belaqi.value);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Data sources
//!
//! All families are queried per position; there is no station lookup. A
//! position outside the Belgian grid yields empty mappings rather than
//! errors. Errors are reserved for transport failures and non-success HTTP
//! statuses.

pub mod api;
pub mod belaqi;
pub mod client;
pub mod error;
pub mod models;

// Re-exports
pub use api::{brussels_day, forecast_days, AirQualityApi, FORECAST_DAYS};
pub use belaqi::{
    belaqi_index_actual, belaqi_index_daily, belaqi_index_forecast_daily, belaqi_index_hourly,
};
pub use client::{ClientBuilder, IrcelineClient};
pub use error::{Error, Result};
pub use models::{
    BelAqiIndex, FeatureId, FeatureValue, ForecastFeature, ObservedAt, Position, Reading,
    RioFeature, RioIfdmFeature,
};
