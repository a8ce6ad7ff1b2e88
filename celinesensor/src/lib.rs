//! IRCEL - CELINE air quality sensors
//!
//! This crate turns the IRCEL - CELINE services (see [`celineapi`]) into
//! periodically refreshed sensors for a configured zone.
//!
//! # Architecture
//!
//! - [`registry`]: static pollutant tables (feature, device class, unit)
//! - [`coordinator`]: refresh cycle and last-good snapshot
//! - [`sensor`]: read projections over the snapshot
//! - [`config_flow`]: setup validation and options
//! - [`integration`]: per-entry lifecycle (setup, unload, reload)
//! - [`config_ext`]: zones and entries stored in `celineconfig`
//!
//! # Example
//!
//! ```no_run
//! use celineapi::IrcelineClient;
//! use celinesensor::{ConfigEntry, EntryData, Integration};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let zones = HashMap::from([(
//!     "home".to_string(),
//!     celinesensor::Zone::new("home", "Home", 50.85, 4.35),
//! )]);
//! let integration = Integration::new(Arc::new(IrcelineClient::new().await?), Arc::new(zones))?;
//!
//! let entry = ConfigEntry::new("Home", EntryData { zone: "zone.home".into() });
//! let instance = integration.setup_entry(entry).await?;
//! for sensor in &instance.sensors {
//!     println!("{} = {:?}", sensor.entity_id(), sensor.native_value());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config_ext;
pub mod config_flow;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod integration;
pub mod registry;
pub mod sensor;
pub mod zone;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use config_ext::IrcelineConfigExt;
pub use config_flow::{validate_input, ConfigFlow, FlowResult, OptionsFlow, UserInput, CONF_ZONE};
pub use coordinator::{DeviceEntryType, DeviceInfo, IrcelineCoordinator, Snapshot, SnapshotCallback};
pub use entry::{ConfigEntry, EntryData, EntryOptions};
pub use error::{DataFamily, Error, FlowError, Result, UpdateFailed};
pub use integration::{EntryInstance, Integration};
pub use registry::{
    DeviceClass, Family, FeatureRef, IrcelineSensorDeviceClass, Pollutant, PollutantDescriptor,
    Registry, RegistryError, SensorDeviceClass, ATTRIBUTION, DOMAIN, IRCEL_CELINE,
    UPDATE_INTERVAL,
};
pub use sensor::{build_sensors, describe_sensors, project, IrcelineSensor, SensorDescription, SensorState};
pub use zone::{Zone, ZoneResolver, ENTITY_ID_HOME};
