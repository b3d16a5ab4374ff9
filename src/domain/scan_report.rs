use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::conflict::{Conflict, ConflictMetrics, Severity};
use crate::domain::value_objects::ProjectId;

/// Result of scanning one project (produced by `ScanService`).
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub project_id: ProjectId,
    pub scanned_at: DateTime<Utc>,
    /// Number of stored entries that went into the detector.
    pub entries_scanned: usize,
    pub metrics: ConflictMetrics,
    /// Sorted by severity, critical first.
    pub conflicts: Vec<Conflict>,
}

impl ScanReport {
    pub fn new(project_id: ProjectId, entries_scanned: usize, conflicts: Vec<Conflict>) -> Self {
        Self {
            project_id,
            scanned_at: Utc::now(),
            entries_scanned,
            metrics: ConflictMetrics::from_conflicts(&conflicts),
            conflicts,
        }
    }

    /// Returns `true` if nothing was detected.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn has_critical(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.severity == Severity::Critical)
    }
}
