use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::{EntryId, Environment, Fingerprint, ServiceId};

/// Classification of a cross-environment inconsistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The key exists in some environments but not in others.
    MissingValue,
    /// Reserved. No detection rule produces it: diverging values across
    /// environments are normal and only surface through `ConfigMismatch`.
    /// Kept as the extension point for a future "suspicious divergence" rule.
    CriticalMismatch,
    /// The key is wired to different services depending on the environment.
    ConfigMismatch,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::MissingValue => "missing_value",
            ConflictKind::CriticalMismatch => "critical_mismatch",
            ConflictKind::ConfigMismatch => "config_mismatch",
        }
    }
}

/// Ordering is significant: `Critical < Warning < Info`, which is the order
/// the detector emits conflicts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// What a conflict reports about one present environment. Carries the
/// fingerprint, never the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictEnvironmentEntry {
    pub entry_id: EntryId,
    pub fingerprint: Fingerprint,
    pub service_id: Option<ServiceId>,
    pub service_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Fixed-shape map with one slot per [`Environment`]; `None` serialises as
/// `null` so every conflict has the same JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentSlots {
    pub development: Option<ConflictEnvironmentEntry>,
    pub staging: Option<ConflictEnvironmentEntry>,
    pub production: Option<ConflictEnvironmentEntry>,
}

impl EnvironmentSlots {
    pub fn get(&self, env: Environment) -> Option<&ConflictEnvironmentEntry> {
        match env {
            Environment::Development => self.development.as_ref(),
            Environment::Staging => self.staging.as_ref(),
            Environment::Production => self.production.as_ref(),
        }
    }

    pub fn set(&mut self, env: Environment, entry: ConflictEnvironmentEntry) {
        let slot = match env {
            Environment::Development => &mut self.development,
            Environment::Staging => &mut self.staging,
            Environment::Production => &mut self.production,
        };
        *slot = Some(entry);
    }

    /// Environments whose slot is empty, in canonical order.
    pub fn missing(&self) -> Vec<Environment> {
        Environment::ALL
            .into_iter()
            .filter(|env| self.get(*env).is_none())
            .collect()
    }

    /// Environments whose slot is filled, in canonical order.
    pub fn present(&self) -> Vec<Environment> {
        Environment::ALL
            .into_iter()
            .filter(|env| self.get(*env).is_some())
            .collect()
    }
}

/// A detected inconsistency for one key.
///
/// Transient: recomputed on every detector run, never persisted. The only way
/// to clear it is to fix the underlying entries and scan again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    /// `{kind}-{key_name}`, stable across runs over the same snapshot.
    pub id: String,
    pub key_name: String,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    pub environments: EnvironmentSlots,
    /// Distinct non-null service names across present environments.
    pub affected_services: Vec<String>,
}

impl Conflict {
    pub fn conflict_id(kind: ConflictKind, key_name: &str) -> String {
        format!("{}-{}", kind.as_str(), key_name)
    }

    /// Human-readable summary, reproducible from kind, key and the affected
    /// environments (the missing ones for `MissingValue`).
    pub fn describe(kind: ConflictKind, key_name: &str, affected: &[Environment]) -> String {
        match kind {
            ConflictKind::MissingValue => {
                let envs: Vec<&str> = affected.iter().map(Environment::as_str).collect();
                format!("{} is missing in {}", key_name, envs.join(", "))
            }
            ConflictKind::CriticalMismatch => {
                format!("{} has diverging values across environments", key_name)
            }
            ConflictKind::ConfigMismatch => {
                format!(
                    "{} is wired to different services across environments",
                    key_name
                )
            }
        }
    }
}

/// Per-severity counts for a conflict list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConflictMetrics {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub total: usize,
}

impl ConflictMetrics {
    pub fn from_conflicts(conflicts: &[Conflict]) -> Self {
        conflicts.iter().fold(Self::default(), |mut m, c| {
            match c.severity {
                Severity::Critical => m.critical += 1,
                Severity::Warning => m.warning += 1,
                Severity::Info => m.info += 1,
            }
            m.total += 1;
            m
        })
    }
}
