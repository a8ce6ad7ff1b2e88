//! Data models for the IRCEL - CELINE geo services
//!
//! This module contains the feature identifiers understood by the remote
//! API, the values returned for them, and the raw GeoJSON structures used
//! to deserialize WFS/WMS responses.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Position
// ============================================================================

/// A WGS84 position (latitude, longitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for Position {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

// ============================================================================
// Feature identifiers
// ============================================================================

/// Generates a feature enum with its remote identifiers.
///
/// Remote identifiers are `<project>:<layer>`; `layer()` returns the part
/// after the colon, which is also the prefix of GeoJSON feature ids.
macro_rules! irceline_features {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $id:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every feature of this family
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Remote identifier (e.g. `rio:no2_hmean`)
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $id),+
                }
            }

            /// Layer name without the project prefix (e.g. `no2_hmean`)
            pub fn layer(&self) -> &'static str {
                let id = self.as_str();
                id.split_once(':').map(|(_, layer)| layer).unwrap_or(id)
            }

            /// Look up a feature from its remote identifier
            pub fn from_id(id: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|f| f.as_str() == id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

irceline_features!(
    /// Features of the RIO interpolation model
    RioFeature {
        Bc24hMean => "rio:bc_24hmean",
        BcDMean => "rio:bc_dmean",
        BcHMean => "rio:bc_hmean",
        No2AnMean => "rio:no2_anmean",
        No2DMean => "rio:no2_dmean",
        No2HMean => "rio:no2_hmean",
        O3HMean => "rio:o3_hmean",
        O3Max8hMean => "rio:o3_max8hmean",
        O3MaxHMean => "rio:o3_maxhmean",
        Pm10_24hMean => "rio:pm10_24hmean",
        Pm10DMean => "rio:pm10_dmean",
        Pm10HMean => "rio:pm10_hmean",
        Pm25_24hMean => "rio:pm25_24hmean",
        Pm25DMean => "rio:pm25_dmean",
        Pm25HMean => "rio:pm25_hmean",
        So2HMean => "rio:so2_hmean",
    }
);

irceline_features!(
    /// Features of the RIO-IFDM interpolation model (finer grid)
    RioIfdmFeature {
        No2HMean => "rioifdm:no2_hmean",
        O3HMean => "rioifdm:o3_hmean",
        Pm10HMean => "rioifdm:pm10_hmean",
        Pm25HMean => "rioifdm:pm25_hmean",
    }
);

irceline_features!(
    /// Features of the daily forecast model
    ForecastFeature {
        No2MaxHMean => "forecast:no2_maxhmean",
        No2DMean => "forecast:no2_dmean",
        O3MaxHMean => "forecast:o3_maxhmean",
        O3Max8hMean => "forecast:o3_max8hmean",
        Pm10DMean => "forecast:pm10_dmean",
        Pm25DMean => "forecast:pm25_dmean",
    }
);

/// A feature of any family
///
/// The family is part of the key, so mappings merged from several families
/// cannot have colliding keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureId {
    Rio(RioFeature),
    RioIfdm(RioIfdmFeature),
    Forecast(ForecastFeature),
}

impl FeatureId {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureId::Rio(f) => f.as_str(),
            FeatureId::RioIfdm(f) => f.as_str(),
            FeatureId::Forecast(f) => f.as_str(),
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RioFeature> for FeatureId {
    fn from(f: RioFeature) -> Self {
        FeatureId::Rio(f)
    }
}

impl From<RioIfdmFeature> for FeatureId {
    fn from(f: RioIfdmFeature) -> Self {
        FeatureId::RioIfdm(f)
    }
}

impl From<ForecastFeature> for FeatureId {
    fn from(f: ForecastFeature) -> Self {
        FeatureId::Forecast(f)
    }
}

// ============================================================================
// Feature values
// ============================================================================

/// BelAQI composite index, from 1 (excellent) to 10 (horrible)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum BelAqiIndex {
    Excellent = 1,
    VeryGood = 2,
    Good = 3,
    FairlyGood = 4,
    Moderate = 5,
    Poor = 6,
    VeryPoor = 7,
    Bad = 8,
    VeryBad = 9,
    Horrible = 10,
}

impl BelAqiIndex {
    pub const ALL: [BelAqiIndex; 10] = [
        BelAqiIndex::Excellent,
        BelAqiIndex::VeryGood,
        BelAqiIndex::Good,
        BelAqiIndex::FairlyGood,
        BelAqiIndex::Moderate,
        BelAqiIndex::Poor,
        BelAqiIndex::VeryPoor,
        BelAqiIndex::Bad,
        BelAqiIndex::VeryBad,
        BelAqiIndex::Horrible,
    ];

    /// Position on the 1..=10 scale
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal).checked_sub(1)?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            BelAqiIndex::Excellent => "excellent",
            BelAqiIndex::VeryGood => "very_good",
            BelAqiIndex::Good => "good",
            BelAqiIndex::FairlyGood => "fairly_good",
            BelAqiIndex::Moderate => "moderate",
            BelAqiIndex::Poor => "poor",
            BelAqiIndex::VeryPoor => "very_poor",
            BelAqiIndex::Bad => "bad",
            BelAqiIndex::VeryBad => "very_bad",
            BelAqiIndex::Horrible => "horrible",
        }
    }
}

impl fmt::Display for BelAqiIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value carried by a feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    /// Pollutant concentration (µg/m³)
    Concentration(f64),
    /// BelAQI index
    BelAqi(BelAqiIndex),
}

impl Reading {
    /// Numeric form: the concentration, or the index ordinal
    pub fn as_f64(&self) -> f64 {
        match self {
            Reading::Concentration(v) => *v,
            Reading::BelAqi(index) => f64::from(index.ordinal()),
        }
    }

    pub fn concentration(&self) -> Option<f64> {
        match self {
            Reading::Concentration(v) => Some(*v),
            Reading::BelAqi(_) => None,
        }
    }
}

/// When a value was observed (RIO) or which day it forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ObservedAt {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

impl fmt::Display for ObservedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedAt::Instant(ts) => write!(f, "{}", ts.to_rfc3339()),
            ObservedAt::Day(day) => write!(f, "{}", day),
        }
    }
}

/// A value fetched for one feature, with its timestamp
///
/// Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureValue {
    pub value: Option<Reading>,
    pub timestamp: Option<ObservedAt>,
}

impl FeatureValue {
    pub fn new(value: Option<Reading>, timestamp: Option<ObservedAt>) -> Self {
        Self { value, timestamp }
    }

    /// A concentration observed at an instant
    pub fn measured(value: f64, at: DateTime<Utc>) -> Self {
        Self {
            value: Some(Reading::Concentration(value)),
            timestamp: Some(ObservedAt::Instant(at)),
        }
    }

    /// A concentration forecast for a day
    pub fn forecast(value: Option<f64>, day: NaiveDate) -> Self {
        Self {
            value: value.map(Reading::Concentration),
            timestamp: Some(ObservedAt::Day(day)),
        }
    }

    pub fn concentration(&self) -> Option<f64> {
        self.value.and_then(|v| v.concentration())
    }
}

// ============================================================================
// GeoJSON responses
// ============================================================================

/// GeoJSON feature collection returned by WFS `GetFeature` and
/// WMS `GetFeatureInfo` with `application/json` output
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<GeoFeature>,
}

/// A single GeoJSON feature
#[derive(Debug, Clone, Deserialize)]
pub struct GeoFeature {
    /// Feature id, `<layer>.<fid>` (e.g. `no2_hmean.1234`)
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: FeatureProperties,
}

impl GeoFeature {
    /// Layer part of the feature id
    pub fn layer(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(|id| id.split_once('.').map(|(layer, _)| layer).unwrap_or(id))
    }
}

/// Properties of a feature
///
/// RIO vector layers carry `value`/`timestamp`; raster layers queried
/// through `GetFeatureInfo` carry `GRAY_INDEX`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureProperties {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "GRAY_INDEX", default)]
    pub gray_index: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_layer() {
        assert_eq!(RioFeature::No2HMean.as_str(), "rio:no2_hmean");
        assert_eq!(RioFeature::No2HMean.layer(), "no2_hmean");
        assert_eq!(ForecastFeature::O3Max8hMean.layer(), "o3_max8hmean");
        assert_eq!(
            RioIfdmFeature::from_id("rioifdm:pm25_hmean"),
            Some(RioIfdmFeature::Pm25HMean)
        );
        assert_eq!(RioFeature::from_id("rioifdm:pm25_hmean"), None);
    }

    #[test]
    fn test_feature_id_families_do_not_collide() {
        let rio = FeatureId::from(RioFeature::No2HMean);
        let ifdm = FeatureId::from(RioIfdmFeature::No2HMean);
        assert_ne!(rio, ifdm);
        assert_ne!(rio.as_str(), ifdm.as_str());
    }

    #[test]
    fn test_belaqi_ordinal() {
        assert_eq!(BelAqiIndex::Excellent.ordinal(), 1);
        assert_eq!(BelAqiIndex::Horrible.ordinal(), 10);
        assert_eq!(BelAqiIndex::from_ordinal(5), Some(BelAqiIndex::Moderate));
        assert_eq!(BelAqiIndex::from_ordinal(0), None);
        assert_eq!(BelAqiIndex::from_ordinal(11), None);
        assert_eq!(Reading::BelAqi(BelAqiIndex::Bad).as_f64(), 8.0);
    }

    #[test]
    fn test_geo_feature_parsing() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"id": "no2_hmean.42", "properties": {"value": 12.5, "timestamp": "2024-06-15T10:00:00Z"}},
                {"properties": {"GRAY_INDEX": 7.0}}
            ]
        }"#;
        let collection: FeatureCollection = serde_json::from_str(json).unwrap();
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.features[0].layer(), Some("no2_hmean"));
        assert_eq!(collection.features[0].properties.value, Some(12.5));
        assert_eq!(collection.features[1].layer(), None);
        assert_eq!(collection.features[1].properties.gray_index, Some(7.0));
    }
}
