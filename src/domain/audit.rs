use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::value_objects::ProjectId;

pub const ACTION_CONFLICT_SCAN: &str = "config_entry.conflict_scan";
pub const ACTION_CONFLICT_RESOLVE: &str = "config_entry.conflict_resolve";

/// One compliance/trace record. Written by the facade after a scan or a
/// resolution; never read back by this crate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub action: &'static str,
    pub actor_id: String,
    pub project_id: ProjectId,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: &'static str,
        actor_id: &str,
        project_id: &ProjectId,
        details: Value,
    ) -> Self {
        Self {
            action,
            actor_id: actor_id.to_string(),
            project_id: project_id.clone(),
            details,
            recorded_at: Utc::now(),
        }
    }
}
