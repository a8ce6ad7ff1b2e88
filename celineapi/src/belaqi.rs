//! BelAQI composite air quality index
//!
//! The index combines PM10, PM2.5, O3 and NO2 on a 1 (excellent) to 10
//! (horrible) scale. The worst sub-index wins: each table row lists the
//! concentrations (µg/m³) above which the index reaches at least that level.
//!
//! Two tables are used:
//! - hourly: PM10/PM2.5 24h running means, O3/NO2 hourly means (current index)
//! - daily: PM10/PM2.5/NO2 daily means, O3 max 8h mean (forecast index)

use crate::api::{forecast_days, AirQualityApi};
use crate::error::{Error, Result};
use crate::models::{
    BelAqiIndex, FeatureValue, ForecastFeature, ObservedAt, Position, Reading, RioFeature,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Lower bounds (exclusive) per level: (index, pm10, pm25, o3, no2)
type Thresholds = [(BelAqiIndex, f64, f64, f64, f64); 9];

const HOURLY_THRESHOLDS: Thresholds = [
    (BelAqiIndex::Horrible, 140.0, 75.0, 240.0, 150.0),
    (BelAqiIndex::VeryBad, 110.0, 50.0, 220.0, 125.0),
    (BelAqiIndex::Bad, 90.0, 40.0, 200.0, 100.0),
    (BelAqiIndex::VeryPoor, 75.0, 35.0, 180.0, 75.0),
    (BelAqiIndex::Poor, 60.0, 25.0, 160.0, 50.0),
    (BelAqiIndex::Moderate, 45.0, 20.0, 120.0, 40.0),
    (BelAqiIndex::FairlyGood, 35.0, 15.0, 70.0, 30.0),
    (BelAqiIndex::Good, 25.0, 10.0, 50.0, 20.0),
    (BelAqiIndex::VeryGood, 15.0, 5.0, 25.0, 10.0),
];

const DAILY_THRESHOLDS: Thresholds = [
    (BelAqiIndex::Horrible, 100.0, 50.0, 220.0, 50.0),
    (BelAqiIndex::VeryBad, 80.0, 40.0, 190.0, 40.0),
    (BelAqiIndex::Bad, 70.0, 35.0, 160.0, 35.0),
    (BelAqiIndex::VeryPoor, 60.0, 25.0, 140.0, 30.0),
    (BelAqiIndex::Poor, 50.0, 20.0, 120.0, 25.0),
    (BelAqiIndex::Moderate, 40.0, 15.0, 100.0, 20.0),
    (BelAqiIndex::FairlyGood, 30.0, 10.0, 80.0, 15.0),
    (BelAqiIndex::Good, 20.0, 7.5, 60.0, 10.0),
    (BelAqiIndex::VeryGood, 10.0, 5.0, 30.0, 5.0),
];

fn classify(table: &Thresholds, pm10: f64, pm25: f64, o3: f64, no2: f64) -> Result<BelAqiIndex> {
    for (name, value) in [("pm10", pm10), ("pm25", pm25), ("o3", o3), ("no2", no2)] {
        if value.is_nan() || value < 0.0 {
            return Err(Error::InvalidValue(format!("{name} = {value}")));
        }
    }

    Ok(table
        .iter()
        .find(|(_, t_pm10, t_pm25, t_o3, t_no2)| {
            pm10 > *t_pm10 || pm25 > *t_pm25 || o3 > *t_o3 || no2 > *t_no2
        })
        .map(|(index, ..)| *index)
        .unwrap_or(BelAqiIndex::Excellent))
}

/// BelAQI from 24h running means of PM and hourly means of O3/NO2
pub fn belaqi_index_hourly(pm10_24h: f64, pm25_24h: f64, o3: f64, no2: f64) -> Result<BelAqiIndex> {
    classify(&HOURLY_THRESHOLDS, pm10_24h, pm25_24h, o3, no2)
}

/// BelAQI from daily means of PM/NO2 and the daily max 8h mean of O3
pub fn belaqi_index_daily(pm10: f64, pm25: f64, o3_max8h: f64, no2: f64) -> Result<BelAqiIndex> {
    classify(&DAILY_THRESHOLDS, pm10, pm25, o3_max8h, no2)
}

const ACTUAL_COMPONENTS: [RioFeature; 4] = [
    RioFeature::Pm10_24hMean,
    RioFeature::Pm25_24hMean,
    RioFeature::O3HMean,
    RioFeature::No2HMean,
];

const FORECAST_COMPONENTS: [ForecastFeature; 4] = [
    ForecastFeature::Pm10DMean,
    ForecastFeature::Pm25DMean,
    ForecastFeature::O3Max8hMean,
    ForecastFeature::No2DMean,
];

/// Current BelAQI index at `position`
///
/// Fetches the RIO components and computes the hourly index. The timestamp
/// of the result is the oldest component timestamp.
pub async fn belaqi_index_actual(
    api: &dyn AirQualityApi,
    timestamp: DateTime<Utc>,
    position: Position,
) -> Result<FeatureValue> {
    let components = api.get_rio(&ACTUAL_COMPONENTS, timestamp, position).await?;

    let component = |feature: RioFeature| -> Result<f64> {
        components
            .get(&feature)
            .and_then(|v| v.concentration())
            .ok_or_else(|| Error::MissingComponent(feature.to_string()))
    };

    let index = belaqi_index_hourly(
        component(RioFeature::Pm10_24hMean)?,
        component(RioFeature::Pm25_24hMean)?,
        component(RioFeature::O3HMean)?,
        component(RioFeature::No2HMean)?,
    )?;

    let observed = components.values().filter_map(|v| v.timestamp).min();
    debug!("BelAQI at {}: {} ({:?})", position, index, observed);

    Ok(FeatureValue::new(Some(Reading::BelAqi(index)), observed))
}

/// Daily BelAQI forecast at `position` for today and the next 3 days
///
/// A day for which a component is missing or invalid gets an empty value.
pub async fn belaqi_index_forecast_daily(
    api: &dyn AirQualityApi,
    timestamp: DateTime<Utc>,
    position: Position,
) -> Result<HashMap<NaiveDate, FeatureValue>> {
    let components = api
        .get_forecast_at(&FORECAST_COMPONENTS, timestamp, position)
        .await?;

    let result = forecast_days(timestamp)
        .into_iter()
        .map(|day| {
            let component = |feature: ForecastFeature| {
                components
                    .get(&(feature, day))
                    .and_then(|v| v.concentration())
            };

            let index = match (
                component(ForecastFeature::Pm10DMean),
                component(ForecastFeature::Pm25DMean),
                component(ForecastFeature::O3Max8hMean),
                component(ForecastFeature::No2DMean),
            ) {
                (Some(pm10), Some(pm25), Some(o3), Some(no2)) => {
                    belaqi_index_daily(pm10, pm25, o3, no2).ok()
                }
                _ => None,
            };

            (
                day,
                FeatureValue::new(index.map(Reading::BelAqi), Some(ObservedAt::Day(day))),
            )
        })
        .collect();

    Ok(result)
}
