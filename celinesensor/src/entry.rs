//! Configured instances of the integration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settings chosen in the setup flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub zone: String,
}

/// Settings changed afterwards in the options flow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// One configured instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
    pub data: EntryData,
    #[serde(default)]
    pub options: EntryOptions,
}

impl ConfigEntry {
    /// New entry with a fresh random id
    pub fn new(title: impl Into<String>, data: EntryData) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            title: title.into(),
            data,
            options: EntryOptions::default(),
        }
    }

    /// Zone in effect: the option when set, the setup value otherwise
    pub fn zone(&self) -> &str {
        self.options.zone.as_deref().unwrap_or(&self.data.zone)
    }
}
