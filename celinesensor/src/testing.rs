//! In-memory doubles shared by the unit tests

use crate::zone::Zone;
use async_trait::async_trait;
use celineapi::{
    forecast_days, AirQualityApi, Error, FeatureValue, ForecastFeature, Position, Result,
    RioFeature, RioIfdmFeature,
};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// What a family returns
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Every requested feature with this value
    Values(f64),
    Empty,
    Fail,
}

pub struct FakeApi {
    rio: Mutex<Behavior>,
    rio_ifdm: Mutex<Behavior>,
    forecast: Mutex<Behavior>,
    forecast_gate: Mutex<Option<Arc<Notify>>>,
    calls: AtomicUsize,
    rio_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            rio: Mutex::new(behavior),
            rio_ifdm: Mutex::new(behavior),
            forecast: Mutex::new(behavior),
            forecast_gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            rio_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_rio(&self, behavior: Behavior) {
        *self.rio.lock() = behavior;
    }

    pub fn set_rio_ifdm(&self, behavior: Behavior) {
        *self.rio_ifdm.lock() = behavior;
    }

    pub fn set_forecast(&self, behavior: Behavior) {
        *self.forecast.lock() = behavior;
    }

    /// Park every forecast fetch until [`FakeApi::release_forecast`]
    pub fn hold_forecast(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.forecast_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_forecast(&self) {
        if let Some(gate) = self.forecast_gate.lock().take() {
            gate.notify_waiters();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rio_calls(&self) -> usize {
        self.rio_calls.load(Ordering::SeqCst)
    }

    fn current<K: Copy + Eq + std::hash::Hash>(
        behavior: Behavior,
        features: &[K],
        timestamp: DateTime<Utc>,
    ) -> Result<HashMap<K, FeatureValue>> {
        match behavior {
            Behavior::Values(v) => Ok(features
                .iter()
                .map(|f| (*f, FeatureValue::measured(v, timestamp)))
                .collect()),
            Behavior::Empty => Ok(HashMap::new()),
            Behavior::Fail => Err(Error::api_error("API returned status: 503 Service Unavailable")),
        }
    }
}

#[async_trait]
impl AirQualityApi for FakeApi {
    async fn get_rio(
        &self,
        features: &[RioFeature],
        timestamp: DateTime<Utc>,
        _position: Position,
    ) -> Result<HashMap<RioFeature, FeatureValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rio_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.rio.lock();
        Self::current(behavior, features, timestamp)
    }

    async fn get_rio_ifdm(
        &self,
        features: &[RioIfdmFeature],
        timestamp: DateTime<Utc>,
        _position: Position,
    ) -> Result<HashMap<RioIfdmFeature, FeatureValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.rio_ifdm.lock();
        Self::current(behavior, features, timestamp)
    }

    async fn get_forecast_at(
        &self,
        features: &[ForecastFeature],
        timestamp: DateTime<Utc>,
        _position: Position,
    ) -> Result<HashMap<(ForecastFeature, NaiveDate), FeatureValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.forecast_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let behavior = *self.forecast.lock();
        match behavior {
            Behavior::Values(v) => Ok(features
                .iter()
                .flat_map(|f| {
                    forecast_days(timestamp)
                        .into_iter()
                        .map(move |day| ((*f, day), FeatureValue::forecast(Some(v), day)))
                })
                .collect()),
            Behavior::Empty => Ok(HashMap::new()),
            Behavior::Fail => Err(Error::api_error("API returned status: 503 Service Unavailable")),
        }
    }
}

/// The home zone at (50.73, 4.05), named `home`
pub fn zones() -> HashMap<String, Zone> {
    HashMap::from([("home".to_string(), Zone::new("home", "home", 50.73, 4.05))])
}
