//! IRCEL - CELINE settings stored in celineconfig
//!
//! This module provides the `IrcelineConfigExt` trait which adds zone and
//! config entry management to `celineconfig::Config`.
//!
//! Layout in `config.yaml`:
//!
//! ```yaml
//! zones:
//!   home:
//!     name: Home
//!     latitude: 50.8466
//!     longitude: 4.3528
//! entries:
//!   6f1c...:
//!     title: Home
//!     data:
//!       zone: zone.home
//!     options: {}
//! ```
//!
//! # Example
//!
//! ```no_run
//! use celineconfig::get_config;
//! use celinesensor::IrcelineConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//!
//! for zone in config.get_zones()? {
//!     println!("{} ({}, {})", zone.id, zone.latitude, zone.longitude);
//! }
//! # Ok(())
//! # }
//! ```

use crate::entry::{ConfigEntry, EntryData, EntryOptions};
use crate::zone::{zone_entity_id, zone_key, Zone, ZoneResolver};
use anyhow::{Context, Result};
use celineconfig::Config;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredZone {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    title: String,
    data: EntryData,
    #[serde(default)]
    options: EntryOptions,
}

/// Extension trait adding zones and config entries to `celineconfig::Config`
pub trait IrcelineConfigExt {
    // ========================================================================
    // Zones
    // ========================================================================

    /// Every configured zone, sorted by id
    fn get_zones(&self) -> Result<Vec<Zone>>;

    /// Zone named `zone_id` (`home` or `zone.home`)
    fn get_zone(&self, zone_id: &str) -> Result<Option<Zone>>;

    /// Adds or replaces a zone
    fn set_zone(&self, zone: &Zone) -> Result<()>;

    // ========================================================================
    // Config entries
    // ========================================================================

    fn get_entries(&self) -> Result<Vec<ConfigEntry>>;

    fn get_entry(&self, entry_id: &str) -> Result<Option<ConfigEntry>>;

    /// Adds or replaces an entry
    fn save_entry(&self, entry: &ConfigEntry) -> Result<()>;

    /// Returns `true` when the entry existed
    fn remove_entry(&self, entry_id: &str) -> Result<bool>;
}

impl IrcelineConfigExt for Config {
    fn get_zones(&self) -> Result<Vec<Zone>> {
        let Ok(Value::Mapping(map)) = self.get_value(&["zones"]) else {
            return Ok(Vec::new());
        };

        let mut zones = Vec::new();
        for (key, value) in map {
            let Value::String(key) = key else { continue };
            match serde_yaml::from_value::<StoredZone>(value) {
                Ok(stored) => zones.push(Zone {
                    id: zone_entity_id(&key),
                    name: stored.name,
                    latitude: stored.latitude,
                    longitude: stored.longitude,
                }),
                Err(err) => warn!(zone = %key, "Ignoring invalid zone: {}", err),
            }
        }
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(zones)
    }

    fn get_zone(&self, zone_id: &str) -> Result<Option<Zone>> {
        let key = zone_key(zone_id);
        match self.get_value(&["zones", key]) {
            Ok(value) => {
                let stored: StoredZone = serde_yaml::from_value(value)
                    .with_context(|| format!("Invalid zone {}", key))?;
                Ok(Some(Zone {
                    id: zone_entity_id(key),
                    name: stored.name,
                    latitude: stored.latitude,
                    longitude: stored.longitude,
                }))
            }
            Err(_) => Ok(None),
        }
    }

    fn set_zone(&self, zone: &Zone) -> Result<()> {
        let stored = StoredZone {
            name: zone.name.clone(),
            latitude: zone.latitude,
            longitude: zone.longitude,
        };
        self.set_value(&["zones", zone.key()], serde_yaml::to_value(stored)?)
    }

    fn get_entries(&self) -> Result<Vec<ConfigEntry>> {
        let Ok(Value::Mapping(map)) = self.get_value(&["entries"]) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for (key, value) in map {
            let Value::String(entry_id) = key else { continue };
            match serde_yaml::from_value::<StoredEntry>(value) {
                Ok(stored) => entries.push(ConfigEntry {
                    entry_id,
                    title: stored.title,
                    data: stored.data,
                    options: stored.options,
                }),
                Err(err) => warn!(entry_id = %entry_id, "Ignoring invalid entry: {}", err),
            }
        }
        entries.sort_by(|a, b| a.title.cmp(&b.title).then(a.entry_id.cmp(&b.entry_id)));
        Ok(entries)
    }

    fn get_entry(&self, entry_id: &str) -> Result<Option<ConfigEntry>> {
        match self.get_value(&["entries", entry_id]) {
            Ok(value) => {
                let stored: StoredEntry = serde_yaml::from_value(value)
                    .with_context(|| format!("Invalid entry {}", entry_id))?;
                Ok(Some(ConfigEntry {
                    entry_id: entry_id.to_lowercase(),
                    title: stored.title,
                    data: stored.data,
                    options: stored.options,
                }))
            }
            Err(_) => Ok(None),
        }
    }

    fn save_entry(&self, entry: &ConfigEntry) -> Result<()> {
        let stored = StoredEntry {
            title: entry.title.clone(),
            data: entry.data.clone(),
            options: entry.options.clone(),
        };
        self.set_value(&["entries", &entry.entry_id], serde_yaml::to_value(stored)?)
    }

    fn remove_entry(&self, entry_id: &str) -> Result<bool> {
        self.remove_value(&["entries", entry_id])
    }
}

impl ZoneResolver for Config {
    fn resolve(&self, zone_id: &str) -> Option<Zone> {
        self.get_zone(zone_id).unwrap_or_else(|err| {
            warn!(zone = %zone_id, "Cannot read zone: {}", err);
            None
        })
    }

    fn zones(&self) -> Vec<Zone> {
        self.get_zones().unwrap_or_default()
    }
}
