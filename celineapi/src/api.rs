//! Data-source abstraction over the IRCEL - CELINE services
//!
//! `AirQualityApi` is implemented by [`IrcelineClient`](crate::IrcelineClient)
//! and by test doubles. Everything above the HTTP layer (BelAQI derivation,
//! refresh coordination, setup validation) only talks to this trait.

use crate::error::Result;
use crate::models::{FeatureValue, ForecastFeature, Position, RioFeature, RioIfdmFeature};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Europe::Brussels;
use std::collections::HashMap;

/// Number of forecast days published (today + next 3 days)
pub const FORECAST_DAYS: u8 = 4;

/// Calendar day in Belgium for an instant
pub fn brussels_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Brussels).date_naive()
}

/// Forecast days covered from `timestamp`: today (Brussels) + 0..=3
pub fn forecast_days(timestamp: DateTime<Utc>) -> Vec<NaiveDate> {
    let today = brussels_day(timestamp);
    (0..FORECAST_DAYS)
        .filter_map(|d| today.checked_add_days(Days::new(u64::from(d))))
        .collect()
}

/// Access to the three data families of IRCEL - CELINE
#[async_trait]
pub trait AirQualityApi: Send + Sync {
    /// Current values from the RIO interpolation at `timestamp`
    async fn get_rio(
        &self,
        features: &[RioFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<HashMap<RioFeature, FeatureValue>>;

    /// Current values from the RIO-IFDM interpolation at `timestamp`
    async fn get_rio_ifdm(
        &self,
        features: &[RioIfdmFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<HashMap<RioIfdmFeature, FeatureValue>>;

    /// Daily forecasts for the days returned by [`forecast_days`]
    ///
    /// (feature, day) pairs without a value at `position` are absent.
    async fn get_forecast_at(
        &self,
        features: &[ForecastFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<HashMap<(ForecastFeature, NaiveDate), FeatureValue>>;

    /// Daily forecasts starting today
    async fn get_forecast(
        &self,
        features: &[ForecastFeature],
        position: Position,
    ) -> Result<HashMap<(ForecastFeature, NaiveDate), FeatureValue>> {
        self.get_forecast_at(features, Utc::now(), position).await
    }
}
