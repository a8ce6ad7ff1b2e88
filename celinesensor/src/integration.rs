//! Per-entry lifecycle
//!
//! [`Integration`] is the explicit context holding every loaded config
//! entry. Setting up an entry builds its coordinator, runs the first
//! refresh and creates its sensors; unloading stops its polling and drops
//! everything it owned.

use crate::config_flow::{ConfigFlow, OptionsFlow};
use crate::coordinator::IrcelineCoordinator;
use crate::entry::ConfigEntry;
use crate::error::{Error, Result};
use crate::registry::{Registry, UPDATE_INTERVAL};
use crate::sensor::{build_sensors, IrcelineSensor};
use crate::zone::ZoneResolver;
use celineapi::AirQualityApi;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything owned by one loaded entry
#[derive(Debug)]
pub struct EntryInstance {
    pub entry: ConfigEntry,
    pub coordinator: Arc<IrcelineCoordinator>,
    pub sensors: Vec<IrcelineSensor>,
    shutdown: CancellationToken,
}

impl EntryInstance {
    /// Start the polling loop of this entry
    ///
    /// The loop stops when the entry is unloaded or the integration shuts
    /// down.
    pub fn spawn_polling(&self) -> JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move { coordinator.run(shutdown).await })
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Loaded config entries, keyed by entry id
pub struct Integration {
    api: Arc<dyn AirQualityApi>,
    zones: Arc<dyn ZoneResolver>,
    registry: Arc<Registry>,
    update_interval: Duration,
    shutdown: CancellationToken,
    instances: RwLock<HashMap<String, Arc<EntryInstance>>>,
}

impl Integration {
    pub fn new(api: Arc<dyn AirQualityApi>, zones: Arc<dyn ZoneResolver>) -> Result<Self> {
        Ok(Self {
            api,
            zones,
            registry: Arc::new(Registry::load()?),
            update_interval: UPDATE_INTERVAL,
            shutdown: CancellationToken::new(),
            instances: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn zones(&self) -> &Arc<dyn ZoneResolver> {
        &self.zones
    }

    pub fn config_flow(&self) -> ConfigFlow {
        ConfigFlow::new(self.api.clone(), self.zones.clone())
    }

    pub fn options_flow(&self, entry: ConfigEntry) -> OptionsFlow {
        OptionsFlow::new(self.zones.clone(), entry)
    }

    /// Load an entry
    ///
    /// Fails with [`Error::NotReady`] when the first refresh fails; nothing
    /// is registered in that case. An entry already loaded under the same
    /// id is replaced.
    pub async fn setup_entry(&self, entry: ConfigEntry) -> Result<Arc<EntryInstance>> {
        let coordinator = Arc::new(
            IrcelineCoordinator::new(
                self.api.clone(),
                self.zones.clone(),
                &self.registry,
                &entry,
            )
            .with_update_interval(self.update_interval),
        );

        if let Err(err) = coordinator.refresh().await {
            warn!(entry_id = %entry.entry_id, "Setup failed: {}", err);
            return Err(Error::NotReady(err));
        }

        let sensors = build_sensors(&self.registry, &coordinator, &entry);
        let instance = Arc::new(EntryInstance {
            entry: entry.clone(),
            coordinator,
            sensors,
            shutdown: self.shutdown.child_token(),
        });

        let previous = self
            .instances
            .write()
            .insert(entry.entry_id.clone(), instance.clone());
        if let Some(previous) = previous {
            previous.shutdown.cancel();
        }

        info!(
            entry_id = %entry.entry_id,
            title = %entry.title,
            sensors = instance.sensors.len(),
            "Entry set up"
        );
        Ok(instance)
    }

    /// Unload an entry and stop its polling
    ///
    /// Returns `false` when the entry was not loaded.
    pub fn unload_entry(&self, entry_id: &str) -> bool {
        match self.instances.write().remove(entry_id) {
            Some(instance) => {
                instance.shutdown.cancel();
                info!(entry_id = %entry_id, "Entry unloaded");
                true
            }
            None => false,
        }
    }

    /// Unload then set up again, e.g. after its options changed
    pub async fn reload_entry(&self, entry: ConfigEntry) -> Result<Arc<EntryInstance>> {
        self.unload_entry(&entry.entry_id);
        self.setup_entry(entry).await
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<EntryInstance>> {
        self.instances.read().get(entry_id).cloned()
    }

    /// Loaded instance, or [`Error::EntryNotFound`]
    pub fn instance(&self, entry_id: &str) -> Result<Arc<EntryInstance>> {
        self.get(entry_id)
            .ok_or_else(|| Error::EntryNotFound(entry_id.to_string()))
    }

    pub fn entry_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.instances.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stop the polling of every entry
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_flow::{FlowResult, UserInput};
    use crate::entry::EntryData;
    use crate::error::DataFamily;
    use crate::testing::{zones, Behavior, FakeApi};

    fn integration(api: &Arc<FakeApi>) -> Integration {
        let mut all = zones();
        all.insert(
            "office".to_string(),
            crate::zone::Zone::new("office", "Office", 50.85, 4.35),
        );
        Integration::new(api.clone(), Arc::new(all)).unwrap()
    }

    async fn create_entry(integration: &Integration) -> ConfigEntry {
        let result = integration
            .config_flow()
            .step_user(Some(UserInput {
                zone: "zone.home".to_string(),
            }))
            .await;
        match result {
            FlowResult::CreateEntry { title, data } => ConfigEntry::new(title, data),
            other => panic!("expected an entry, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let integration = integration(&api);
        let entry = create_entry(&integration).await;
        assert_eq!(entry.title, "home");

        let instance = integration.setup_entry(entry.clone()).await.unwrap();
        assert_eq!(instance.sensors.len(), 37);
        assert!(instance.coordinator.data().is_some());
        assert_eq!(integration.entry_ids(), vec![entry.entry_id.clone()]);

        assert!(integration.unload_entry(&entry.entry_id));
        assert!(instance.is_stopped());
        assert!(integration.get(&entry.entry_id).is_none());
        assert!(!integration.unload_entry(&entry.entry_id));
    }

    #[tokio::test]
    async fn test_setup_not_ready() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let integration = integration(&api);
        let entry = create_entry(&integration).await;

        api.set_forecast(Behavior::Fail);
        let err = integration.setup_entry(entry.clone()).await.unwrap_err();

        match err {
            Error::NotReady(cause) => assert_eq!(cause.family(), Some(DataFamily::Forecast)),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(integration.get(&entry.entry_id).is_none());
        assert!(matches!(
            integration.instance(&entry.entry_id),
            Err(Error::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_after_options() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let integration = integration(&api);
        let entry = create_entry(&integration).await;
        let first = integration.setup_entry(entry.clone()).await.unwrap();
        assert_eq!(first.coordinator.zone(), "zone.home");

        let updated = integration
            .options_flow(entry.clone())
            .step_init("zone.office")
            .unwrap();
        let second = integration.reload_entry(updated).await.unwrap();

        assert!(first.is_stopped());
        assert!(!second.is_stopped());
        assert_eq!(second.coordinator.zone(), "zone.office");
        assert_eq!(integration.entry_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_entries_are_isolated() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let integration = integration(&api);
        let a = create_entry(&integration).await;
        let b = ConfigEntry::new(
            "Office",
            EntryData {
                zone: "zone.office".into(),
            },
        );

        integration.setup_entry(a.clone()).await.unwrap();
        integration.setup_entry(b.clone()).await.unwrap();
        assert_eq!(integration.entry_ids().len(), 2);

        integration.unload_entry(&a.entry_id);
        let b = integration.instance(&b.entry_id).unwrap();
        assert!(!b.is_stopped());
        assert!(b.sensors[0].entity_id().starts_with("sensor.office_"));

        integration.shutdown();
        assert!(b.is_stopped());
    }

    #[tokio::test]
    async fn test_polling_stops_on_unload() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let integration = integration(&api);
        let entry = create_entry(&integration).await;
        let instance = integration.setup_entry(entry.clone()).await.unwrap();

        let handle = instance.spawn_polling();
        integration.unload_entry(&entry.entry_id);
        handle.await.unwrap();
    }
}
