//! Named places resolved to a position at refresh time

use celineapi::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ZONE_DOMAIN: &str = "zone";

/// Entity id of the home zone
pub const ENTITY_ID_HOME: &str = "zone.home";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Entity id, e.g. `zone.home`
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Zone {
    pub fn new(id: &str, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: zone_entity_id(id),
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.latitude, self.longitude)
    }

    /// Identifier without the `zone.` prefix
    pub fn key(&self) -> &str {
        zone_key(&self.id)
    }
}

/// `home` and `zone.home` both name the zone `home`
pub fn zone_key(zone_id: &str) -> &str {
    zone_id
        .strip_prefix(ZONE_DOMAIN)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(zone_id)
}

pub fn zone_entity_id(zone_id: &str) -> String {
    format!("{}.{}", ZONE_DOMAIN, zone_key(zone_id))
}

/// Source of zone definitions
///
/// Zones are looked up on every refresh, so moving a zone takes effect on
/// the next cycle.
pub trait ZoneResolver: Send + Sync {
    fn resolve(&self, zone_id: &str) -> Option<Zone>;

    fn zones(&self) -> Vec<Zone>;
}

impl ZoneResolver for HashMap<String, Zone> {
    fn resolve(&self, zone_id: &str) -> Option<Zone> {
        let key = zone_key(zone_id);
        self.values().find(|zone| zone.key() == key).cloned()
    }

    fn zones(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = self.values().cloned().collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_key() {
        assert_eq!(zone_key("zone.home"), "home");
        assert_eq!(zone_key("home"), "home");
        assert_eq!(zone_key("zoned"), "zoned");
        assert_eq!(zone_entity_id("office"), "zone.office");
        assert_eq!(zone_entity_id("zone.office"), "zone.office");
    }

    #[test]
    fn test_map_resolver() {
        let zones = HashMap::from([(
            "home".to_string(),
            Zone::new("home", "home", 50.73, 4.05),
        )]);

        let zone = zones.resolve(ENTITY_ID_HOME).unwrap();
        assert_eq!(zone.position(), Position::new(50.73, 4.05));
        assert_eq!(zone.id, "zone.home");
        assert!(zones.resolve("zone.unknown").is_none());
    }
}
