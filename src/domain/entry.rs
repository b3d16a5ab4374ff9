use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EntryId, Environment, ProjectId, ServiceId};

/// One decrypted configuration value, as handed to the conflict detector.
///
/// This is a point-in-time snapshot row: the detector never reads the store
/// itself. `decrypted_value` is only ever fingerprinted, never echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: EntryId,
    pub key_name: String,
    pub environment: Environment,
    pub decrypted_value: String,
    #[serde(default)]
    pub associated_service_id: Option<ServiceId>,
    #[serde(default)]
    pub associated_service_name: Option<String>,
    /// Display ordering and duplicate tie-breaking only.
    pub updated_at: DateTime<Utc>,
}

/// A configuration record as persisted by a [`crate::domain::ports::RecordStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: EntryId,
    pub project_id: ProjectId,
    pub key_name: String,
    pub environment: Environment,
    /// Output of [`crate::domain::ports::ValueCipher::encrypt`].
    pub encrypted_value: String,
    pub service_id: Option<ServiceId>,
    /// Joined from the services table on read; ignored on write.
    pub service_name: Option<String>,
    pub is_secret: bool,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a record that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub project_id: ProjectId,
    pub key_name: String,
    pub environment: Environment,
    pub encrypted_value: String,
    pub service_id: Option<ServiceId>,
    pub is_secret: bool,
    pub description: Option<String>,
}

/// In-place overwrite of an existing record's mutable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    pub encrypted_value: String,
    pub service_id: Option<ServiceId>,
    pub is_secret: bool,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEntry {
    /// Project a stored record into a detector snapshot row, given its
    /// already-decrypted value.
    pub fn to_config_entry(&self, decrypted_value: String) -> ConfigEntry {
        ConfigEntry {
            id: self.id.clone(),
            key_name: self.key_name.clone(),
            environment: self.environment,
            decrypted_value,
            associated_service_id: self.service_id.clone(),
            associated_service_name: self.service_name.clone(),
            updated_at: self.updated_at,
        }
    }
}
