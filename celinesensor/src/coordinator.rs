//! Refresh coordinator
//!
//! One coordinator per config entry. Each cycle resolves the zone, fetches
//! the three data families and both BelAQI derivations, and commits a new
//! [`Snapshot`] only when every step succeeded. Readers always see the last
//! committed snapshot.
//!
//! # Architecture
//!
//! - `Snapshot`: immutable result of one successful cycle
//! - `IrcelineCoordinator`: owns the snapshot cell, the cadence and the
//!   update listeners

use crate::entry::ConfigEntry;
use crate::error::{DataFamily, UpdateFailed};
use crate::registry::{Registry, DOMAIN, IRCEL_CELINE, UPDATE_INTERVAL};
use crate::zone::ZoneResolver;
use celineapi::{
    belaqi_index_actual, belaqi_index_forecast_daily, AirQualityApi, FeatureId, FeatureValue,
    ForecastFeature, RioFeature, RioIfdmFeature,
};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Snapshot
// ============================================================================

/// Data of one successful refresh cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// RIO and RIO-IFDM values, keyed by family-tagged feature
    pub current: HashMap<FeatureId, FeatureValue>,
    pub forecast: HashMap<(ForecastFeature, NaiveDate), FeatureValue>,
    pub belaqi: FeatureValue,
    pub belaqi_forecast: HashMap<NaiveDate, FeatureValue>,
    pub fetched_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Device
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEntryType {
    Service,
}

/// Device shared by all sensors of one config entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub entry_type: DeviceEntryType,
    pub identifiers: Vec<(String, String)>,
    pub manufacturer: String,
    pub name: String,
}

impl DeviceInfo {
    pub fn for_entry(entry: &ConfigEntry) -> Self {
        Self {
            entry_type: DeviceEntryType::Service,
            identifiers: vec![(DOMAIN.to_string(), entry.entry_id.clone())],
            manufacturer: IRCEL_CELINE.to_string(),
            name: entry.title.clone(),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Listener called with each committed snapshot
pub type SnapshotCallback = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct UpdateStatus {
    last_update_success: bool,
    last_error: Option<String>,
    last_success_at: Option<DateTime<Utc>>,
}

/// Periodic fetcher for one config entry
pub struct IrcelineCoordinator {
    name: String,
    api: Arc<dyn AirQualityApi>,
    zones: Arc<dyn ZoneResolver>,
    zone: String,
    update_interval: Duration,
    device_info: DeviceInfo,
    rio_features: Vec<RioFeature>,
    rio_ifdm_features: Vec<RioIfdmFeature>,
    forecast_features: Vec<ForecastFeature>,
    data: RwLock<Option<Arc<Snapshot>>>,
    status: RwLock<UpdateStatus>,
    cycle: tokio::sync::Mutex<()>,
    subscribers: RwLock<Vec<SnapshotCallback>>,
}

impl IrcelineCoordinator {
    pub fn new(
        api: Arc<dyn AirQualityApi>,
        zones: Arc<dyn ZoneResolver>,
        registry: &Registry,
        entry: &ConfigEntry,
    ) -> Self {
        Self {
            name: format!("IRCEL - CELINE ({})", entry.title),
            api,
            zones,
            zone: entry.zone().to_string(),
            update_interval: UPDATE_INTERVAL,
            device_info: DeviceInfo::for_entry(entry),
            rio_features: registry.rio_features(),
            rio_ifdm_features: registry.rio_ifdm_features(),
            forecast_features: registry.forecast_features(),
            data: RwLock::new(None),
            status: RwLock::new(UpdateStatus::default()),
            cycle: tokio::sync::Mutex::new(()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Override the default 30 minute cadence
    ///
    /// A zero interval is ignored and the default kept.
    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        if update_interval.is_zero() {
            warn!(
                coordinator = %self.name,
                "Update interval must be positive, keeping {:?}",
                self.update_interval
            );
        } else {
            self.update_interval = update_interval;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zone id resolved on every cycle
    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Last committed snapshot, `None` before the first successful cycle
    pub fn data(&self) -> Option<Arc<Snapshot>> {
        self.data.read().clone()
    }

    /// Whether the most recent cycle succeeded
    pub fn last_update_success(&self) -> bool {
        self.status.read().last_update_success
    }

    /// Cause of the most recent failed cycle
    pub fn last_error(&self) -> Option<String> {
        self.status.read().last_error.clone()
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.status.read().last_success_at
    }

    /// Register a listener for committed snapshots
    pub fn subscribe(&self, callback: SnapshotCallback) {
        self.subscribers.write().push(callback);
    }

    fn notify(&self, snapshot: &Arc<Snapshot>) {
        let callbacks: Vec<_> = self.subscribers.read().clone();
        for callback in callbacks.iter() {
            callback(snapshot);
        }
    }

    /// Run one cycle now
    ///
    /// Cycles are serialized. On failure the previous snapshot stays in
    /// place and the error is returned.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, UpdateFailed> {
        let _cycle = self.cycle.lock().await;
        let now = Utc::now();
        debug!(coordinator = %self.name, zone = %self.zone, "Refreshing");

        match self.fetch(now).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.data.write() = Some(snapshot.clone());
                {
                    let mut status = self.status.write();
                    status.last_update_success = true;
                    status.last_error = None;
                    status.last_success_at = Some(now);
                }
                info!(
                    coordinator = %self.name,
                    current = snapshot.current.len(),
                    forecast = snapshot.forecast.len(),
                    belaqi_forecast = snapshot.belaqi_forecast.len(),
                    "Snapshot updated"
                );
                self.notify(&snapshot);
                Ok(snapshot)
            }
            Err(err) => {
                match &err {
                    UpdateFailed::Api { family, source } => {
                        warn!(coordinator = %self.name, family = %family, "{}: {}", err, source)
                    }
                    UpdateFailed::ZoneNotFound(_) => warn!(coordinator = %self.name, "{}", err),
                }
                let mut status = self.status.write();
                status.last_update_success = false;
                status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Fetch everything for `now` without touching the cached snapshot
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Snapshot, UpdateFailed> {
        let zone = self
            .zones
            .resolve(&self.zone)
            .ok_or_else(|| UpdateFailed::ZoneNotFound(self.zone.clone()))?;
        let position = zone.position();
        let api = self.api.as_ref();

        let rio = api
            .get_rio(&self.rio_features, now, position)
            .await
            .map_err(|e| UpdateFailed::api(DataFamily::Rio, e))?;

        let forecast = api
            .get_forecast_at(&self.forecast_features, now, position)
            .await
            .map_err(|e| UpdateFailed::api(DataFamily::Forecast, e))?;

        let rio_ifdm = api
            .get_rio_ifdm(&self.rio_ifdm_features, now, position)
            .await
            .map_err(|e| UpdateFailed::api(DataFamily::RioIfdm, e))?;

        let mut current: HashMap<FeatureId, FeatureValue> =
            rio.into_iter().map(|(f, v)| (f.into(), v)).collect();
        current.extend(rio_ifdm.into_iter().map(|(f, v)| (f.into(), v)));

        let belaqi = belaqi_index_actual(api, now, position)
            .await
            .map_err(|e| UpdateFailed::api(DataFamily::BelAqi, e))?;

        let belaqi_forecast = belaqi_index_forecast_daily(api, now, position)
            .await
            .map_err(|e| UpdateFailed::api(DataFamily::BelAqiForecast, e))?;

        Ok(Snapshot {
            current,
            forecast,
            belaqi,
            belaqi_forecast,
            fetched_at: Some(now),
        })
    }

    /// Refresh every `update_interval` until `shutdown` is cancelled
    ///
    /// The first cycle runs immediately unless a snapshot is already
    /// available. A cycle in flight at cancellation is dropped without
    /// committing anything.
    pub async fn run(&self, shutdown: CancellationToken) {
        let start = if self.data().is_some() {
            Instant::now() + self.update_interval
        } else {
            Instant::now()
        };
        let mut ticker = interval_at(start, self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(coordinator = %self.name, interval = ?self.update_interval, "Polling started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(coordinator = %self.name, "Refresh abandoned");
                    break;
                }
                // Failures are recorded and logged by refresh()
                _ = self.refresh() => {}
            }
        }

        info!(coordinator = %self.name, "Polling stopped");
    }
}

impl fmt::Debug for IrcelineCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrcelineCoordinator")
            .field("name", &self.name)
            .field("zone", &self.zone)
            .field("update_interval", &self.update_interval)
            .field("last_update_success", &self.last_update_success())
            .finish()
    }
}
