//! Pollutant registry
//!
//! Static description of every pollutant exposed as a sensor: which remote
//! feature it reads, its device class and its unit. The tables are grouped by
//! family and checked for consistency when the registry is loaded.

use celineapi::{FeatureId, ForecastFeature, RioFeature, RioIfdmFeature};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const DOMAIN: &str = "irceline";

pub const IRCEL_CELINE: &str = "Belgian Interregional Environment Agency (IRCEL - CELINE)";

pub const ATTRIBUTION: &str =
    "Air quality data from the Belgian Interregional Environment Agency (IRCEL - CELINE)";

pub const CONCENTRATION_MICROGRAMS_PER_CUBIC_METER: &str = "µg/m³";

/// Default refresh cadence
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Device classes
// ============================================================================

/// Every device class value known to the host platform
pub const BUILTIN_SENSOR_DEVICE_CLASSES: &[&str] = &[
    "apparent_power",
    "aqi",
    "area",
    "atmospheric_pressure",
    "battery",
    "blood_glucose_concentration",
    "carbon_dioxide",
    "carbon_monoxide",
    "conductivity",
    "current",
    "data_rate",
    "data_size",
    "date",
    "distance",
    "duration",
    "energy",
    "energy_distance",
    "energy_storage",
    "enum",
    "frequency",
    "gas",
    "humidity",
    "illuminance",
    "irradiance",
    "moisture",
    "monetary",
    "nitrogen_dioxide",
    "nitrogen_monoxide",
    "nitrous_oxide",
    "ozone",
    "ph",
    "pm1",
    "pm10",
    "pm25",
    "power",
    "power_factor",
    "precipitation",
    "precipitation_intensity",
    "pressure",
    "reactive_power",
    "signal_strength",
    "sound_pressure",
    "speed",
    "sulphur_dioxide",
    "temperature",
    "timestamp",
    "volatile_organic_compounds",
    "volatile_organic_compounds_parts",
    "voltage",
    "volume",
    "volume_flow_rate",
    "volume_storage",
    "water",
    "weight",
    "wind_direction",
    "wind_speed",
];

/// Built-in device classes used by this integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorDeviceClass {
    Aqi,
    NitrogenDioxide,
    Ozone,
    Pm10,
    Pm25,
}

impl SensorDeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            SensorDeviceClass::Aqi => "aqi",
            SensorDeviceClass::NitrogenDioxide => "nitrogen_dioxide",
            SensorDeviceClass::Ozone => "ozone",
            SensorDeviceClass::Pm10 => "pm10",
            SensorDeviceClass::Pm25 => "pm25",
        }
    }
}

/// Device classes the host platform does not provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrcelineSensorDeviceClass {
    BlackCarbon,
}

impl IrcelineSensorDeviceClass {
    pub const ALL: [IrcelineSensorDeviceClass; 1] = [IrcelineSensorDeviceClass::BlackCarbon];

    pub fn as_str(self) -> &'static str {
        match self {
            IrcelineSensorDeviceClass::BlackCarbon => "black_carbon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Builtin(SensorDeviceClass),
    Irceline(IrcelineSensorDeviceClass),
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Builtin(class) => class.as_str(),
            DeviceClass::Irceline(class) => class.as_str(),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Pollutants
// ============================================================================

/// Family a pollutant is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    RioHourly,
    RioIfdmHourly,
    ForecastDaily,
    BelAqi,
}

impl Family {
    pub const ALL: [Family; 4] = [
        Family::RioHourly,
        Family::RioIfdmHourly,
        Family::ForecastDaily,
        Family::BelAqi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Family::RioHourly => "rio_hourly",
            Family::RioIfdmHourly => "rio_ifdm_hourly",
            Family::ForecastDaily => "forecast_daily",
            Family::BelAqi => "belaqi",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical pollutant identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pollutant {
    CurrentBc24hMean,
    CurrentBcHMean,
    CurrentPm10_24hMean,
    CurrentPm25_24hMean,
    CurrentNo2HMean,
    CurrentO3HMean,
    CurrentPm10HMean,
    CurrentPm25HMean,
    ForecastNo2MaxHMean,
    ForecastNo2DMean,
    ForecastO3MaxHMean,
    ForecastO3Max8hMean,
    ForecastPm10DMean,
    ForecastPm25DMean,
    CurrentBelAqi,
    ForecastBelAqi,
}

impl Pollutant {
    pub const ALL: [Pollutant; 16] = [
        Pollutant::CurrentBc24hMean,
        Pollutant::CurrentBcHMean,
        Pollutant::CurrentPm10_24hMean,
        Pollutant::CurrentPm25_24hMean,
        Pollutant::CurrentNo2HMean,
        Pollutant::CurrentO3HMean,
        Pollutant::CurrentPm10HMean,
        Pollutant::CurrentPm25HMean,
        Pollutant::ForecastNo2MaxHMean,
        Pollutant::ForecastNo2DMean,
        Pollutant::ForecastO3MaxHMean,
        Pollutant::ForecastO3Max8hMean,
        Pollutant::ForecastPm10DMean,
        Pollutant::ForecastPm25DMean,
        Pollutant::CurrentBelAqi,
        Pollutant::ForecastBelAqi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Pollutant::CurrentBc24hMean => "current_bc_24hmean",
            Pollutant::CurrentBcHMean => "current_bc_hmean",
            Pollutant::CurrentPm10_24hMean => "current_pm10_24hmean",
            Pollutant::CurrentPm25_24hMean => "current_pm25_24hmean",
            Pollutant::CurrentNo2HMean => "current_no2_hmean",
            Pollutant::CurrentO3HMean => "current_o3_hmean",
            Pollutant::CurrentPm10HMean => "current_pm10_hmean",
            Pollutant::CurrentPm25HMean => "current_pm25_hmean",
            Pollutant::ForecastNo2MaxHMean => "forecast_no2_maxhmean",
            Pollutant::ForecastNo2DMean => "forecast_no2_dmean",
            Pollutant::ForecastO3MaxHMean => "forecast_o3_maxhmean",
            Pollutant::ForecastO3Max8hMean => "forecast_o3_max8hmean",
            Pollutant::ForecastPm10DMean => "forecast_pm10_dmean",
            Pollutant::ForecastPm25DMean => "forecast_pm25_dmean",
            Pollutant::CurrentBelAqi => "current_belaqi",
            Pollutant::ForecastBelAqi => "forecast_belaqi",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == id)
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pollutant value lives in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureRef {
    Rio(RioFeature),
    RioIfdm(RioIfdmFeature),
    Forecast(ForecastFeature),
    BelAqi,
    BelAqiForecast,
}

impl FeatureRef {
    /// Whether values are published per forecast day
    pub fn is_daily(self) -> bool {
        matches!(self, FeatureRef::Forecast(_) | FeatureRef::BelAqiForecast)
    }

    /// Key in the merged current mapping, for current features
    pub fn current_key(self) -> Option<FeatureId> {
        match self {
            FeatureRef::Rio(f) => Some(f.into()),
            FeatureRef::RioIfdm(f) => Some(f.into()),
            _ => None,
        }
    }
}

/// Static description of one pollutant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollutantDescriptor {
    pub pollutant: Pollutant,
    pub feature: FeatureRef,
    pub device_class: DeviceClass,
    pub unit: Option<&'static str>,
}

const UG_M3: Option<&str> = Some(CONCENTRATION_MICROGRAMS_PER_CUBIC_METER);
const BC: DeviceClass = DeviceClass::Irceline(IrcelineSensorDeviceClass::BlackCarbon);
const NO2: DeviceClass = DeviceClass::Builtin(SensorDeviceClass::NitrogenDioxide);
const O3: DeviceClass = DeviceClass::Builtin(SensorDeviceClass::Ozone);
const PM10: DeviceClass = DeviceClass::Builtin(SensorDeviceClass::Pm10);
const PM25: DeviceClass = DeviceClass::Builtin(SensorDeviceClass::Pm25);
const AQI: DeviceClass = DeviceClass::Builtin(SensorDeviceClass::Aqi);

const RIO_HOURLY_POLLUTANTS: &[Pollutant] = &[
    Pollutant::CurrentBc24hMean,
    Pollutant::CurrentBcHMean,
    Pollutant::CurrentPm10_24hMean,
    Pollutant::CurrentPm25_24hMean,
];

const RIO_IFDM_HOURLY_POLLUTANTS: &[Pollutant] = &[
    Pollutant::CurrentNo2HMean,
    Pollutant::CurrentO3HMean,
    Pollutant::CurrentPm10HMean,
    Pollutant::CurrentPm25HMean,
];

const FORECAST_POLLUTANTS: &[Pollutant] = &[
    Pollutant::ForecastNo2MaxHMean,
    Pollutant::ForecastNo2DMean,
    Pollutant::ForecastO3MaxHMean,
    Pollutant::ForecastO3Max8hMean,
    Pollutant::ForecastPm10DMean,
    Pollutant::ForecastPm25DMean,
];

const BELAQI_POLLUTANTS: &[Pollutant] = &[Pollutant::CurrentBelAqi, Pollutant::ForecastBelAqi];

const POLLUTANT_TO_FEATURE: &[(Pollutant, FeatureRef)] = &[
    (Pollutant::CurrentBc24hMean, FeatureRef::Rio(RioFeature::Bc24hMean)),
    (Pollutant::CurrentBcHMean, FeatureRef::Rio(RioFeature::BcHMean)),
    (Pollutant::CurrentPm10_24hMean, FeatureRef::Rio(RioFeature::Pm10_24hMean)),
    (Pollutant::CurrentPm25_24hMean, FeatureRef::Rio(RioFeature::Pm25_24hMean)),
    (Pollutant::CurrentNo2HMean, FeatureRef::RioIfdm(RioIfdmFeature::No2HMean)),
    (Pollutant::CurrentO3HMean, FeatureRef::RioIfdm(RioIfdmFeature::O3HMean)),
    (Pollutant::CurrentPm10HMean, FeatureRef::RioIfdm(RioIfdmFeature::Pm10HMean)),
    (Pollutant::CurrentPm25HMean, FeatureRef::RioIfdm(RioIfdmFeature::Pm25HMean)),
    (Pollutant::ForecastNo2MaxHMean, FeatureRef::Forecast(ForecastFeature::No2MaxHMean)),
    (Pollutant::ForecastNo2DMean, FeatureRef::Forecast(ForecastFeature::No2DMean)),
    (Pollutant::ForecastO3MaxHMean, FeatureRef::Forecast(ForecastFeature::O3MaxHMean)),
    (Pollutant::ForecastO3Max8hMean, FeatureRef::Forecast(ForecastFeature::O3Max8hMean)),
    (Pollutant::ForecastPm10DMean, FeatureRef::Forecast(ForecastFeature::Pm10DMean)),
    (Pollutant::ForecastPm25DMean, FeatureRef::Forecast(ForecastFeature::Pm25DMean)),
    (Pollutant::CurrentBelAqi, FeatureRef::BelAqi),
    (Pollutant::ForecastBelAqi, FeatureRef::BelAqiForecast),
];

const POLLUTANT_TO_DEVICE_CLASS: &[(Pollutant, DeviceClass)] = &[
    (Pollutant::CurrentBc24hMean, BC),
    (Pollutant::CurrentBcHMean, BC),
    (Pollutant::CurrentPm10_24hMean, PM10),
    (Pollutant::CurrentPm25_24hMean, PM25),
    (Pollutant::CurrentNo2HMean, NO2),
    (Pollutant::CurrentO3HMean, O3),
    (Pollutant::CurrentPm10HMean, PM10),
    (Pollutant::CurrentPm25HMean, PM25),
    (Pollutant::ForecastNo2MaxHMean, NO2),
    (Pollutant::ForecastNo2DMean, NO2),
    (Pollutant::ForecastO3MaxHMean, O3),
    (Pollutant::ForecastO3Max8hMean, O3),
    (Pollutant::ForecastPm10DMean, PM10),
    (Pollutant::ForecastPm25DMean, PM25),
    (Pollutant::CurrentBelAqi, AQI),
    (Pollutant::ForecastBelAqi, AQI),
];

const POLLUTANT_TO_UNIT: &[(Pollutant, Option<&str>)] = &[
    (Pollutant::CurrentBc24hMean, UG_M3),
    (Pollutant::CurrentBcHMean, UG_M3),
    (Pollutant::CurrentPm10_24hMean, UG_M3),
    (Pollutant::CurrentPm25_24hMean, UG_M3),
    (Pollutant::CurrentNo2HMean, UG_M3),
    (Pollutant::CurrentO3HMean, UG_M3),
    (Pollutant::CurrentPm10HMean, UG_M3),
    (Pollutant::CurrentPm25HMean, UG_M3),
    (Pollutant::ForecastNo2MaxHMean, UG_M3),
    (Pollutant::ForecastNo2DMean, UG_M3),
    (Pollutant::ForecastO3MaxHMean, UG_M3),
    (Pollutant::ForecastO3Max8hMean, UG_M3),
    (Pollutant::ForecastPm10DMean, UG_M3),
    (Pollutant::ForecastPm25DMean, UG_M3),
    (Pollutant::CurrentBelAqi, None),
    (Pollutant::ForecastBelAqi, None),
];

/// Lookup map a pollutant must appear in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryMap {
    Feature,
    DeviceClass,
    Unit,
}

impl fmt::Display for RegistryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RegistryMap::Feature => "feature",
            RegistryMap::DeviceClass => "device class",
            RegistryMap::Unit => "unit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Pollutant {pollutant} has no entry in the {map} map")]
    Missing {
        pollutant: Pollutant,
        map: RegistryMap,
    },

    #[error("Pollutant {pollutant} of family {family} maps to a {found} feature")]
    WrongFamily {
        pollutant: Pollutant,
        family: Family,
        found: &'static str,
    },
}

/// Pollutant lookup tables
///
/// # Example
///
/// ```
/// use celinesensor::registry::{Family, Pollutant, Registry};
///
/// let registry = Registry::load()?;
/// assert_eq!(registry.pollutants(Family::ForecastDaily).len(), 6);
/// assert_eq!(registry.unit(Pollutant::CurrentBelAqi), None);
/// # Ok::<(), celinesensor::registry::RegistryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    families: HashMap<Family, Vec<Pollutant>>,
    features: HashMap<Pollutant, FeatureRef>,
    device_classes: HashMap<Pollutant, DeviceClass>,
    units: HashMap<Pollutant, Option<&'static str>>,
}

impl Registry {
    /// Build the registry from the static tables and check it
    pub fn load() -> Result<Self, RegistryError> {
        let registry = Self {
            families: HashMap::from([
                (Family::RioHourly, RIO_HOURLY_POLLUTANTS.to_vec()),
                (Family::RioIfdmHourly, RIO_IFDM_HOURLY_POLLUTANTS.to_vec()),
                (Family::ForecastDaily, FORECAST_POLLUTANTS.to_vec()),
                (Family::BelAqi, BELAQI_POLLUTANTS.to_vec()),
            ]),
            features: POLLUTANT_TO_FEATURE.iter().copied().collect(),
            device_classes: POLLUTANT_TO_DEVICE_CLASS.iter().copied().collect(),
            units: POLLUTANT_TO_UNIT.iter().copied().collect(),
        };
        registry.check()?;
        Ok(registry)
    }

    /// Every pollutant of every family has a feature, a device class and a
    /// unit, and its feature belongs to that family
    pub fn check(&self) -> Result<(), RegistryError> {
        for family in Family::ALL {
            for &pollutant in self.pollutants(family) {
                let missing = |map| RegistryError::Missing { pollutant, map };

                let feature = *self
                    .features
                    .get(&pollutant)
                    .ok_or_else(|| missing(RegistryMap::Feature))?;
                if !self.device_classes.contains_key(&pollutant) {
                    return Err(missing(RegistryMap::DeviceClass));
                }
                if !self.units.contains_key(&pollutant) {
                    return Err(missing(RegistryMap::Unit));
                }

                let found = match feature {
                    FeatureRef::Rio(_) => Family::RioHourly,
                    FeatureRef::RioIfdm(_) => Family::RioIfdmHourly,
                    FeatureRef::Forecast(_) => Family::ForecastDaily,
                    FeatureRef::BelAqi | FeatureRef::BelAqiForecast => Family::BelAqi,
                };
                if found != family {
                    return Err(RegistryError::WrongFamily {
                        pollutant,
                        family,
                        found: found.as_str(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pollutants of a family, in declaration order
    pub fn pollutants(&self, family: Family) -> &[Pollutant] {
        self.families.get(&family).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn feature(&self, pollutant: Pollutant) -> Option<FeatureRef> {
        self.features.get(&pollutant).copied()
    }

    pub fn device_class(&self, pollutant: Pollutant) -> Option<DeviceClass> {
        self.device_classes.get(&pollutant).copied()
    }

    /// Unit of measurement, `None` for index values
    pub fn unit(&self, pollutant: Pollutant) -> Option<&'static str> {
        self.units.get(&pollutant).copied().flatten()
    }

    pub fn descriptor(&self, pollutant: Pollutant) -> Option<PollutantDescriptor> {
        Some(PollutantDescriptor {
            pollutant,
            feature: self.feature(pollutant)?,
            device_class: self.device_class(pollutant)?,
            unit: self.units.get(&pollutant).copied()?,
        })
    }

    /// Descriptors of a family, in declaration order
    pub fn descriptors(&self, family: Family) -> Vec<PollutantDescriptor> {
        self.pollutants(family)
            .iter()
            .filter_map(|p| self.descriptor(*p))
            .collect()
    }

    pub fn rio_features(&self) -> Vec<RioFeature> {
        self.features_of(Family::RioHourly, |f| match f {
            FeatureRef::Rio(f) => Some(f),
            _ => None,
        })
    }

    pub fn rio_ifdm_features(&self) -> Vec<RioIfdmFeature> {
        self.features_of(Family::RioIfdmHourly, |f| match f {
            FeatureRef::RioIfdm(f) => Some(f),
            _ => None,
        })
    }

    pub fn forecast_features(&self) -> Vec<ForecastFeature> {
        self.features_of(Family::ForecastDaily, |f| match f {
            FeatureRef::Forecast(f) => Some(f),
            _ => None,
        })
    }

    fn features_of<T: PartialEq>(
        &self,
        family: Family,
        select: impl Fn(FeatureRef) -> Option<T>,
    ) -> Vec<T> {
        let mut features = Vec::new();
        for feature in self
            .pollutants(family)
            .iter()
            .filter_map(|p| self.feature(*p))
            .filter_map(&select)
        {
            if !features.contains(&feature) {
                features.push(feature);
            }
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_consistency() {
        let registry = Registry::load().unwrap();

        for family in Family::ALL {
            for pollutant in registry.pollutants(family) {
                assert!(registry.features.contains_key(pollutant));
                assert!(registry.device_classes.contains_key(pollutant));
                assert!(registry.units.contains_key(pollutant));
            }
        }
    }

    #[test]
    fn test_every_pollutant_in_one_family() {
        let registry = Registry::load().unwrap();
        let mut seen = HashSet::new();
        for family in Family::ALL {
            for pollutant in registry.pollutants(family) {
                assert!(seen.insert(*pollutant), "{pollutant} listed twice");
            }
        }
        assert_eq!(seen.len(), Pollutant::ALL.len());
    }

    #[test]
    fn test_custom_device_classes_do_not_collide() {
        let builtin: HashSet<&str> = BUILTIN_SENSOR_DEVICE_CLASSES.iter().copied().collect();
        for class in IrcelineSensorDeviceClass::ALL {
            assert!(!builtin.contains(class.as_str()));
        }
    }

    #[test]
    fn test_used_builtin_classes_are_known() {
        for (_, class) in POLLUTANT_TO_DEVICE_CLASS {
            if let DeviceClass::Builtin(class) = class {
                assert!(BUILTIN_SENSOR_DEVICE_CLASSES.contains(&class.as_str()));
            }
        }
    }

    #[test]
    fn test_missing_entry_is_detected() {
        let mut registry = Registry::load().unwrap();
        registry.units.remove(&Pollutant::ForecastNo2DMean);

        assert_eq!(
            registry.check(),
            Err(RegistryError::Missing {
                pollutant: Pollutant::ForecastNo2DMean,
                map: RegistryMap::Unit,
            })
        );
    }

    #[test]
    fn test_wrong_family_is_detected() {
        let mut registry = Registry::load().unwrap();
        registry
            .features
            .insert(Pollutant::CurrentBcHMean, FeatureRef::BelAqi);

        assert!(matches!(
            registry.check(),
            Err(RegistryError::WrongFamily {
                pollutant: Pollutant::CurrentBcHMean,
                family: Family::RioHourly,
                ..
            })
        ));
    }

    #[test]
    fn test_lookups() {
        let registry = Registry::load().unwrap();

        assert_eq!(
            registry.feature(Pollutant::CurrentBc24hMean),
            Some(FeatureRef::Rio(RioFeature::Bc24hMean))
        );
        assert_eq!(
            registry.device_class(Pollutant::CurrentBcHMean).map(DeviceClass::as_str),
            Some("black_carbon")
        );
        assert_eq!(registry.unit(Pollutant::CurrentO3HMean), Some("µg/m³"));
        assert_eq!(registry.unit(Pollutant::ForecastBelAqi), None);
        assert_eq!(
            registry.descriptor(Pollutant::CurrentBelAqi).map(|d| d.device_class),
            Some(AQI)
        );
        assert_eq!(Pollutant::from_id("forecast_o3_max8hmean"), Some(Pollutant::ForecastO3Max8hMean));
    }

    #[test]
    fn test_family_features() {
        let registry = Registry::load().unwrap();

        assert_eq!(
            registry.rio_features(),
            vec![
                RioFeature::Bc24hMean,
                RioFeature::BcHMean,
                RioFeature::Pm10_24hMean,
                RioFeature::Pm25_24hMean
            ]
        );
        assert_eq!(registry.rio_ifdm_features().len(), 4);
        assert_eq!(registry.forecast_features().len(), 6);
    }
}
