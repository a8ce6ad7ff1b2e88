//! Sensors for pollutants from IRCEL - CELINE
//!
//! A sensor is a description (pollutant, feature, horizon) bound to a
//! coordinator. Reading a sensor projects one value out of the last
//! committed snapshot; it never fetches and never fails.

use crate::coordinator::{DeviceInfo, IrcelineCoordinator, Snapshot};
use crate::entry::ConfigEntry;
use crate::registry::{DeviceClass, Family, FeatureRef, Pollutant, Registry, ATTRIBUTION};
use celineapi::{brussels_day, FeatureValue, ObservedAt, FORECAST_DAYS};
use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const SENSOR_DOMAIN: &str = "sensor";

/// Value and timestamp shown by a sensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorState {
    pub value: Option<f64>,
    pub timestamp: Option<ObservedAt>,
}

impl From<&FeatureValue> for SensorState {
    fn from(value: &FeatureValue) -> Self {
        Self {
            // BelAQI readings become their 1..=10 ordinal
            value: value.value.map(|reading| reading.as_f64()),
            timestamp: value.timestamp,
        }
    }
}

/// Project one (feature, horizon) out of a snapshot
///
/// `horizon` is the day offset from `today` for daily features and is
/// ignored otherwise. Absent keys, and the absence of any snapshot, give an
/// empty state.
pub fn project(
    snapshot: Option<&Snapshot>,
    feature: FeatureRef,
    horizon: Option<u8>,
    today: NaiveDate,
) -> SensorState {
    let Some(snapshot) = snapshot else {
        return SensorState::default();
    };
    let day = || today.checked_add_days(Days::new(u64::from(horizon.unwrap_or(0))));

    let value = match feature {
        FeatureRef::Rio(_) | FeatureRef::RioIfdm(_) => feature
            .current_key()
            .and_then(|key| snapshot.current.get(&key)),
        FeatureRef::Forecast(f) => day().and_then(|day| snapshot.forecast.get(&(f, day))),
        FeatureRef::BelAqi => Some(&snapshot.belaqi),
        FeatureRef::BelAqiForecast => day().and_then(|day| snapshot.belaqi_forecast.get(&day)),
    };

    value.map(SensorState::from).unwrap_or_default()
}

/// Static part of a sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDescription {
    pub pollutant: Pollutant,
    pub feature: FeatureRef,
    pub device_class: DeviceClass,
    pub unit: Option<&'static str>,
    /// Day offset 0..=3 for daily features, `None` for current ones
    pub horizon: Option<u8>,
}

impl SensorDescription {
    /// `{pollutant}` or `{pollutant}_d{horizon}`
    pub fn key(&self) -> String {
        match self.horizon {
            Some(d) => format!("{}_d{}", self.pollutant, d),
            None => self.pollutant.to_string(),
        }
    }
}

/// Every sensor description, in family order
pub fn describe_sensors(registry: &Registry) -> Vec<SensorDescription> {
    let mut descriptions = Vec::new();
    for family in Family::ALL {
        for descriptor in registry.descriptors(family) {
            let horizons: Vec<Option<u8>> = if descriptor.feature.is_daily() {
                (0..FORECAST_DAYS).map(Some).collect()
            } else {
                vec![None]
            };
            for horizon in horizons {
                descriptions.push(SensorDescription {
                    pollutant: descriptor.pollutant,
                    feature: descriptor.feature,
                    device_class: descriptor.device_class,
                    unit: descriptor.unit,
                    horizon,
                });
            }
        }
    }
    descriptions
}

/// A sensor of one config entry
#[derive(Debug, Clone)]
pub struct IrcelineSensor {
    coordinator: Arc<IrcelineCoordinator>,
    description: SensorDescription,
    unique_id: String,
    entity_id: String,
}

impl IrcelineSensor {
    pub fn new(
        coordinator: Arc<IrcelineCoordinator>,
        entry: &ConfigEntry,
        description: SensorDescription,
    ) -> Self {
        let key = description.key();
        let object_id: String = entry
            .title
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();

        Self {
            coordinator,
            description,
            unique_id: format!("{}-{}", entry.entry_id, key),
            entity_id: format!("{}.{}_{}", SENSOR_DOMAIN, object_id, key),
        }
    }

    pub fn description(&self) -> &SensorDescription {
        &self.description
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn translation_key(&self) -> &'static str {
        self.description.pollutant.as_str()
    }

    pub fn device_class(&self) -> DeviceClass {
        self.description.device_class
    }

    pub fn native_unit_of_measurement(&self) -> Option<&'static str> {
        self.description.unit
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }

    pub fn device_info(&self) -> &DeviceInfo {
        self.coordinator.device_info()
    }

    /// Whether the last refresh of the coordinator succeeded
    pub fn available(&self) -> bool {
        self.coordinator.last_update_success()
    }

    /// State for a given Belgian calendar day
    pub fn state_on(&self, today: NaiveDate) -> SensorState {
        project(
            self.coordinator.data().as_deref(),
            self.description.feature,
            self.description.horizon,
            today,
        )
    }

    /// State as of now (Brussels time)
    pub fn state(&self) -> SensorState {
        self.state_on(brussels_day(Utc::now()))
    }

    pub fn native_value(&self) -> Option<f64> {
        self.state().value
    }

    pub fn extra_state_attributes(&self) -> Value {
        json!({ "timestamp": self.state().timestamp })
    }
}

/// Sensors of one config entry
pub fn build_sensors(
    registry: &Registry,
    coordinator: &Arc<IrcelineCoordinator>,
    entry: &ConfigEntry,
) -> Vec<IrcelineSensor> {
    describe_sensors(registry)
        .into_iter()
        .map(|description| IrcelineSensor::new(coordinator.clone(), entry, description))
        .collect()
}
