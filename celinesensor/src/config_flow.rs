//! Setup and options flows
//!
//! The setup flow validates a zone with one RIO fetch before any entry is
//! created. Errors are returned as form errors so the same flow can be
//! submitted again.

use crate::entry::{ConfigEntry, EntryData};
use crate::error::FlowError;
use crate::zone::ZoneResolver;
use celineapi::{AirQualityApi, RioFeature};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

pub const CONF_ZONE: &str = "zone";

/// Title used when the zone has no display name
pub const DEFAULT_TITLE: &str = "IRCEL - CELINE";

const VALIDATION_FEATURES: [RioFeature; 3] =
    [RioFeature::Pm10HMean, RioFeature::No2HMean, RioFeature::O3HMean];

/// User input of the setup form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub zone: String,
}

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    /// Show the form again, with errors keyed by field (`base` for the form)
    Form {
        step_id: &'static str,
        errors: HashMap<String, String>,
    },
    /// Validation passed
    CreateEntry { title: String, data: EntryData },
}

impl FlowResult {
    fn form(step_id: &'static str, error: Option<&FlowError>) -> Self {
        let errors = error
            .map(|err| {
                let (field, key) = err.form_error();
                HashMap::from([(field.to_string(), key.to_string())])
            })
            .unwrap_or_default();
        FlowResult::Form { step_id, errors }
    }
}

/// Check that `zone_id` resolves and that the service has data there
///
/// Returns the entry title: the zone's display name.
pub async fn validate_input(
    api: &dyn AirQualityApi,
    zones: &dyn ZoneResolver,
    zone_id: &str,
    timestamp: DateTime<Utc>,
) -> Result<String, FlowError> {
    let zone = zones.resolve(zone_id).ok_or(FlowError::UnknownZone)?;

    let result = api
        .get_rio(&VALIDATION_FEATURES, timestamp, zone.position())
        .await
        .map_err(|err| FlowError::Unexpected(err.to_string()))?;

    if result.is_empty() {
        return Err(FlowError::CannotConnect);
    }

    debug!(zone = %zone.id, values = result.len(), "Zone validated");
    Ok(if zone.name.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        zone.name
    })
}

/// Setup flow
pub struct ConfigFlow {
    api: Arc<dyn AirQualityApi>,
    zones: Arc<dyn ZoneResolver>,
}

impl ConfigFlow {
    pub const VERSION: u32 = 1;

    pub fn new(api: Arc<dyn AirQualityApi>, zones: Arc<dyn ZoneResolver>) -> Self {
        Self { api, zones }
    }

    /// Without input, show the empty form; with input, validate it
    pub async fn step_user(&self, user_input: Option<UserInput>) -> FlowResult {
        let Some(input) = user_input else {
            return FlowResult::form("user", None);
        };

        match validate_input(self.api.as_ref(), self.zones.as_ref(), &input.zone, Utc::now()).await
        {
            Ok(title) => FlowResult::CreateEntry {
                title,
                data: EntryData { zone: input.zone },
            },
            Err(err) => {
                if let FlowError::Unexpected(cause) = &err {
                    error!(zone = %input.zone, "Unexpected exception: {}", cause);
                }
                FlowResult::form("user", Some(&err))
            }
        }
    }
}

/// Options flow: change the zone of an existing entry
pub struct OptionsFlow {
    zones: Arc<dyn ZoneResolver>,
    entry: ConfigEntry,
}

impl OptionsFlow {
    pub fn new(zones: Arc<dyn ZoneResolver>, entry: ConfigEntry) -> Self {
        Self { zones, entry }
    }

    /// Zone currently in effect, as the form default
    pub fn current_zone(&self) -> &str {
        self.entry.zone()
    }

    /// Returns the updated entry, or the error to show on the form
    pub fn step_init(&self, zone: &str) -> Result<ConfigEntry, FlowError> {
        if self.zones.resolve(zone).is_none() {
            return Err(FlowError::UnknownZone);
        }

        let mut entry = self.entry.clone();
        entry.options.zone = Some(zone.to_string());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{zones, Behavior, FakeApi};
    use crate::zone::ENTITY_ID_HOME;

    fn flow(api: &Arc<FakeApi>) -> ConfigFlow {
        ConfigFlow::new(api.clone(), Arc::new(zones()))
    }

    fn home() -> Option<UserInput> {
        Some(UserInput {
            zone: ENTITY_ID_HOME.to_string(),
        })
    }

    fn form_errors(result: &FlowResult) -> HashMap<String, String> {
        match result {
            FlowResult::Form { errors, .. } => errors.clone(),
            other => panic!("expected a form, got {other:?}"),
        }
    }

    fn assert_created(result: FlowResult) {
        assert_eq!(
            result,
            FlowResult::CreateEntry {
                title: "home".to_string(),
                data: EntryData {
                    zone: ENTITY_ID_HOME.to_string()
                },
            }
        );
    }

    #[tokio::test]
    async fn test_form() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let flow = flow(&api);

        let result = flow.step_user(None).await;
        assert_eq!(result, FlowResult::form("user", None));
        assert!(form_errors(&result).is_empty());

        assert_created(flow.step_user(home()).await);
    }

    #[tokio::test]
    async fn test_form_cannot_connect() {
        let api = Arc::new(FakeApi::new(Behavior::Empty));
        let flow = flow(&api);

        let result = flow.step_user(home()).await;
        assert_eq!(
            form_errors(&result),
            HashMap::from([("base".to_string(), "cannot_connect".to_string())])
        );

        // The same flow recovers once data is available
        api.set_rio(Behavior::Values(3.0));
        assert_created(flow.step_user(home()).await);
    }

    #[tokio::test]
    async fn test_form_unknown_zone() {
        let api = Arc::new(FakeApi::new(Behavior::Values(3.0)));
        let flow = flow(&api);

        let result = flow
            .step_user(Some(UserInput {
                zone: "zone.unknown".to_string(),
            }))
            .await;
        assert_eq!(
            form_errors(&result),
            HashMap::from([("zone".to_string(), "zone_not_exist".to_string())])
        );
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn test_form_unknown_error() {
        let api = Arc::new(FakeApi::new(Behavior::Fail));
        let flow = flow(&api);

        let result = flow.step_user(home()).await;
        assert_eq!(
            form_errors(&result),
            HashMap::from([("base".to_string(), "unknown".to_string())])
        );

        api.set_rio(Behavior::Values(3.0));
        assert_created(flow.step_user(home()).await);
    }

    #[test]
    fn test_options_flow() {
        let mut all = zones();
        all.insert(
            "office".to_string(),
            crate::zone::Zone::new("office", "Office", 50.85, 4.35),
        );
        let entry = ConfigEntry::new(
            "home",
            EntryData {
                zone: ENTITY_ID_HOME.to_string(),
            },
        );
        let flow = OptionsFlow::new(Arc::new(all), entry.clone());
        assert_eq!(flow.current_zone(), ENTITY_ID_HOME);

        assert_eq!(flow.step_init("zone.nowhere"), Err(FlowError::UnknownZone));

        let updated = flow.step_init("zone.office").unwrap();
        assert_eq!(updated.entry_id, entry.entry_id);
        assert_eq!(updated.data, entry.data);
        assert_eq!(updated.zone(), "zone.office");
    }
}
