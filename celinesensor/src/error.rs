//! Error types for the IRCEL - CELINE sensors

use crate::registry::RegistryError;
use std::fmt;

/// Result type alias for integration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sub-fetch of a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFamily {
    Rio,
    Forecast,
    RioIfdm,
    BelAqi,
    BelAqiForecast,
}

impl DataFamily {
    /// Human-readable cause reported when this sub-fetch fails
    pub fn failure_message(self) -> &'static str {
        match self {
            DataFamily::Rio => "Could not get RIO hourly data",
            DataFamily::Forecast => "Could not get forecast data",
            DataFamily::RioIfdm => "Could not get RIO IFDM hourly data",
            DataFamily::BelAqi => "Could not compute BelAQI index",
            DataFamily::BelAqiForecast => "Could not compute BelAQI forecast",
        }
    }
}

impl fmt::Display for DataFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataFamily::Rio => "rio",
            DataFamily::Forecast => "forecast",
            DataFamily::RioIfdm => "rio_ifdm",
            DataFamily::BelAqi => "belaqi",
            DataFamily::BelAqiForecast => "belaqi_forecast",
        })
    }
}

/// Failure of one refresh cycle
///
/// The cached snapshot is left untouched when a cycle fails.
#[derive(Debug, thiserror::Error)]
pub enum UpdateFailed {
    #[error("Zone '{0}' not found")]
    ZoneNotFound(String),

    #[error("{}", family.failure_message())]
    Api {
        family: DataFamily,
        #[source]
        source: celineapi::Error,
    },
}

impl UpdateFailed {
    pub fn api(family: DataFamily, source: celineapi::Error) -> Self {
        Self::Api { family, source }
    }

    /// Family whose sub-fetch failed, if any
    pub fn family(&self) -> Option<DataFamily> {
        match self {
            UpdateFailed::ZoneNotFound(_) => None,
            UpdateFailed::Api { family, .. } => Some(*family),
        }
    }
}

/// Validation failure of the setup and options flows
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Cannot connect to IRCEL - CELINE")]
    CannotConnect,

    #[error("Zone does not exist")]
    UnknownZone,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl FlowError {
    /// Form field and error key shown to the user
    pub fn form_error(&self) -> (&'static str, &'static str) {
        match self {
            FlowError::CannotConnect => ("base", "cannot_connect"),
            FlowError::UnknownZone => ("zone", "zone_not_exist"),
            FlowError::Unexpected(_) => ("base", "unknown"),
        }
    }
}

/// Errors of the integration lifecycle
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// First refresh failed, nothing was registered
    #[error("Integration not ready: {0}")]
    NotReady(#[source] UpdateFailed),

    #[error("Config entry not found: {0}")]
    EntryNotFound(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid options: {0}")]
    Flow(#[from] FlowError),

    /// Configuration error (from celineconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}
