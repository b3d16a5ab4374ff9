use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::domain::conflict::{
    Conflict, ConflictEnvironmentEntry, ConflictKind, EnvironmentSlots, Severity,
};
use crate::domain::entry::ConfigEntry;
use crate::domain::fingerprint::fingerprint;
use crate::domain::value_objects::{Environment, Fingerprint, ServiceId};

// ─────────────────────────────────────────────────────────────────────────────
// ConflictDetector
// ─────────────────────────────────────────────────────────────────────────────

/// Classifies cross-environment inconsistencies in a project's configuration.
///
/// # Responsibility (SRP)
/// `ScanService` loads and decrypts entries. `ConflictDetector` is a pure
/// function over that snapshot: no I/O, deterministic, safe to run in
/// parallel across projects.
///
/// # Algorithm
/// For each key, in first-seen order:
/// 1. Build a per-environment map. If the store invariant is violated and a
///    key has several entries for one environment, keep the one with the
///    latest `updated_at` (later-seen wins a tie) and log a warning.
/// 2. Missing value: present in ≥1 environment and absent in ≥1 → emit
///    `missing_value`, `critical` if production is absent, else `warning`.
/// 3. Service divergence: present in ≥2 environments and the kept entries
///    reference more than one distinct non-null service → emit
///    `config_mismatch` with severity `info`. Diverging *values* are normal
///    across environments and are not reported on their own.
/// 4. Stable-sort the result by severity, critical first.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Run detection over every entry of one project.
    pub fn detect(&self, entries: &[ConfigEntry]) -> Vec<Conflict> {
        let mut conflicts: Vec<Conflict> = Vec::new();

        for (key_name, group) in group_by_key(entries) {
            let by_env = keep_latest_per_environment(&key_name, &group);
            let slots = build_slots(&by_env);
            let affected_services = affected_services(&by_env);

            let missing = slots.missing();
            if !by_env.is_empty() && !missing.is_empty() {
                let severity = if missing.contains(&Environment::Production) {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                conflicts.push(build_conflict(
                    ConflictKind::MissingValue,
                    &key_name,
                    severity,
                    &missing,
                    slots.clone(),
                    affected_services.clone(),
                ));
            }

            if by_env.len() >= 2 {
                let distinct_values: BTreeSet<&Fingerprint> = Environment::ALL
                    .iter()
                    .filter_map(|env| slots.get(*env).map(|e| &e.fingerprint))
                    .collect();
                let distinct_services: BTreeSet<&ServiceId> = by_env
                    .values()
                    .filter_map(|e| e.associated_service_id.as_ref())
                    .collect();

                debug!(
                    key = %key_name,
                    values = distinct_values.len(),
                    services = distinct_services.len(),
                    "compared environments"
                );

                if distinct_services.len() > 1 {
                    conflicts.push(build_conflict(
                        ConflictKind::ConfigMismatch,
                        &key_name,
                        Severity::Info,
                        &slots.present(),
                        slots,
                        affected_services,
                    ));
                }
            }
        }

        // Stable: equal severities keep first-seen key order.
        conflicts.sort_by_key(|c| c.severity);
        conflicts
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Detection helpers ───────────────────────────────────────────────────────

/// Group entries by key, preserving the order in which keys first appear.
fn group_by_key(entries: &[ConfigEntry]) -> Vec<(String, Vec<&ConfigEntry>)> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut groups: Vec<(String, Vec<&ConfigEntry>)> = Vec::new();

    for entry in entries {
        match index.get(entry.key_name.as_str()) {
            Some(&i) => groups[i].1.push(entry),
            None => {
                index.insert(entry.key_name.as_str(), groups.len());
                groups.push((entry.key_name.clone(), vec![entry]));
            }
        }
    }
    groups
}

fn keep_latest_per_environment<'a>(
    key_name: &str,
    group: &[&'a ConfigEntry],
) -> BTreeMap<Environment, &'a ConfigEntry> {
    let mut by_env: BTreeMap<Environment, &ConfigEntry> = BTreeMap::new();

    for entry in group {
        match by_env.get(&entry.environment) {
            None => {
                by_env.insert(entry.environment, *entry);
            }
            Some(kept) => {
                let (winner, loser) = if entry.updated_at >= kept.updated_at {
                    (*entry, *kept)
                } else {
                    (*kept, *entry)
                };
                warn!(
                    key = %key_name,
                    environment = %entry.environment,
                    kept = %winner.id,
                    ignored = %loser.id,
                    "duplicate entry for key and environment; keeping the most recent"
                );
                by_env.insert(entry.environment, winner);
            }
        }
    }
    by_env
}

fn build_slots(by_env: &BTreeMap<Environment, &ConfigEntry>) -> EnvironmentSlots {
    let mut slots = EnvironmentSlots::default();
    for (env, entry) in by_env {
        slots.set(
            *env,
            ConflictEnvironmentEntry {
                entry_id: entry.id.clone(),
                fingerprint: fingerprint(&entry.decrypted_value),
                service_id: entry.associated_service_id.clone(),
                service_name: entry.associated_service_name.clone(),
                updated_at: entry.updated_at,
            },
        );
    }
    slots
}

/// Distinct non-null service names in canonical environment order.
fn affected_services(by_env: &BTreeMap<Environment, &ConfigEntry>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for entry in by_env.values() {
        if let Some(name) = &entry.associated_service_name {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

fn build_conflict(
    kind: ConflictKind,
    key_name: &str,
    severity: Severity,
    affected_envs: &[Environment],
    environments: EnvironmentSlots,
    affected_services: Vec<String>,
) -> Conflict {
    Conflict {
        id: Conflict::conflict_id(kind, key_name),
        key_name: key_name.to_string(),
        kind,
        severity,
        description: Conflict::describe(kind, key_name, affected_envs),
        environments,
        affected_services,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::EntryId;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    // ── Helpers ──

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: &str, key: &str, env: Environment, value: &str) -> ConfigEntry {
        ConfigEntry {
            id: EntryId(id.to_string()),
            key_name: key.to_string(),
            environment: env,
            decrypted_value: value.to_string(),
            associated_service_id: None,
            associated_service_name: None,
            updated_at: t0(),
        }
    }

    fn with_service(mut e: ConfigEntry, id: &str, name: &str) -> ConfigEntry {
        e.associated_service_id = Some(ServiceId(id.to_string()));
        e.associated_service_name = Some(name.to_string());
        e
    }

    fn detect(entries: &[ConfigEntry]) -> Vec<Conflict> {
        ConflictDetector::new().detect(entries)
    }

    use Environment::{Development as Dev, Production as Prod, Staging as Stg};

    // ── Missing value ──

    #[test]
    fn missing_production_is_critical() {
        let conflicts = detect(&[
            entry("1", "API_KEY", Dev, "abc"),
            entry("2", "API_KEY", Stg, "abc"),
        ]);

        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.kind, ConflictKind::MissingValue);
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.id, "missing_value-API_KEY");
        assert_eq!(c.description, "API_KEY is missing in production");
        assert!(c.environments.production.is_none());
        assert!(c.environments.development.is_some());
        assert!(c.environments.staging.is_some());
    }

    #[test]
    fn missing_non_production_is_warning() {
        let conflicts = detect(&[
            entry("1", "LOG_LEVEL", Stg, "info"),
            entry("2", "LOG_LEVEL", Prod, "warn"),
        ]);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, Severity::Warning);
        assert_eq!(
            conflicts[0].description,
            "LOG_LEVEL is missing in development"
        );
    }

    #[test]
    fn single_environment_names_both_missing() {
        for env in Environment::ALL {
            let conflicts = detect(&[entry("1", "ONLY_ONE", env, "v")]);
            assert_eq!(conflicts.len(), 1);
            let c = &conflicts[0];
            assert_eq!(c.kind, ConflictKind::MissingValue);

            let missing: Vec<Environment> =
                Environment::ALL.into_iter().filter(|e| *e != env).collect();
            assert_eq!(c.environments.missing(), missing);
            let expected = if missing.contains(&Prod) {
                Severity::Critical
            } else {
                Severity::Warning
            };
            assert_eq!(c.severity, expected);
        }
    }

    // ── No conflict ──

    #[test]
    fn identical_values_everywhere_is_clean() {
        let conflicts = detect(&[
            with_service(entry("1", "TOKEN", Dev, "x"), "s1", "Stripe"),
            with_service(entry("2", "TOKEN", Stg, "x"), "s1", "Stripe"),
            with_service(entry("3", "TOKEN", Prod, "x"), "s1", "Stripe"),
        ]);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn differing_values_alone_are_not_reported() {
        let conflicts = detect(&[
            entry("1", "SECRET", Dev, "dev-secret"),
            entry("2", "SECRET", Stg, "stg-secret"),
            entry("3", "SECRET", Prod, "prod-secret"),
        ]);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn one_service_and_unassociated_is_not_a_mismatch() {
        let conflicts = detect(&[
            with_service(entry("1", "DSN", Dev, "a"), "s1", "Sentry"),
            entry("2", "DSN", Stg, "b"),
            entry("3", "DSN", Prod, "c"),
        ]);
        assert!(conflicts.is_empty());
    }

    // ── Config mismatch ──

    #[test]
    fn different_services_is_info_mismatch() {
        let conflicts = detect(&[
            with_service(entry("1", "DB_URL", Dev, "a"), "s1", "Supabase"),
            with_service(entry("2", "DB_URL", Stg, "b"), "s2", "Neon"),
            with_service(entry("3", "DB_URL", Prod, "c"), "s1", "Supabase"),
        ]);

        assert_eq!(conflicts.len(), 1);
        let c = &conflicts[0];
        assert_eq!(c.kind, ConflictKind::ConfigMismatch);
        assert_eq!(c.severity, Severity::Info);
        assert_eq!(c.id, "config_mismatch-DB_URL");
        assert_eq!(c.affected_services, vec!["Supabase", "Neon"]);
        assert_eq!(
            c.description,
            "DB_URL is wired to different services across environments"
        );
    }

    #[test]
    fn different_services_with_equal_values_is_still_a_mismatch() {
        let conflicts = detect(&[
            with_service(entry("1", "REGION", Dev, "eu"), "s1", "AWS"),
            with_service(entry("2", "REGION", Stg, "eu"), "s2", "GCP"),
            with_service(entry("3", "REGION", Prod, "eu"), "s2", "GCP"),
        ]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ConfigMismatch);
        assert_eq!(conflicts[0].affected_services, vec!["AWS", "GCP"]);
    }

    #[test]
    fn missing_and_mismatch_for_same_key() {
        let conflicts = detect(&[
            with_service(entry("1", "MAIL", Dev, "a"), "s1", "Resend"),
            with_service(entry("2", "MAIL", Stg, "b"), "s2", "Postmark"),
        ]);

        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].kind, ConflictKind::MissingValue);
        assert_eq!(conflicts[0].severity, Severity::Critical);
        assert_eq!(conflicts[1].kind, ConflictKind::ConfigMismatch);
        // Both carry the same environments and services.
        assert_eq!(conflicts[0].environments, conflicts[1].environments);
        assert_eq!(conflicts[0].affected_services, vec!["Resend", "Postmark"]);
        assert_eq!(conflicts[1].affected_services, vec!["Resend", "Postmark"]);
    }

    // ── Ordering ──

    #[test]
    fn sorted_by_severity_then_first_seen_key() {
        let conflicts = detect(&[
            // info
            with_service(entry("1", "A_MISMATCH", Dev, "a"), "s1", "One"),
            with_service(entry("2", "A_MISMATCH", Stg, "a"), "s2", "Two"),
            with_service(entry("3", "A_MISMATCH", Prod, "a"), "s2", "Two"),
            // warning
            entry("4", "B_WARN", Stg, "x"),
            entry("5", "B_WARN", Prod, "x"),
            // critical
            entry("6", "C_CRIT", Dev, "x"),
            // warning, seen after B_WARN
            entry("7", "D_WARN", Prod, "x"),
            entry("8", "D_WARN", Stg, "x"),
            // critical, seen after C_CRIT
            entry("9", "E_CRIT", Stg, "x"),
        ]);

        let ids: Vec<&str> = conflicts.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "missing_value-C_CRIT",
                "missing_value-E_CRIT",
                "missing_value-B_WARN",
                "missing_value-D_WARN",
                "config_mismatch-A_MISMATCH",
            ]
        );
        assert!(conflicts.windows(2).all(|w| w[0].severity <= w[1].severity));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let entries = vec![
            entry("1", "K", Dev, "a"),
            with_service(entry("2", "J", Stg, "b"), "s1", "X"),
            with_service(entry("3", "J", Prod, "b"), "s2", "Y"),
        ];
        assert_eq!(detect(&entries), detect(&entries));
    }

    #[test]
    fn empty_input_is_clean() {
        assert!(detect(&[]).is_empty());
    }

    // ── Invariant violation ──

    #[test]
    fn duplicate_environment_keeps_most_recent() {
        let mut older = entry("old", "API_KEY", Dev, "old-value");
        older.updated_at = t0() - Duration::hours(1);
        let newer = entry("new", "API_KEY", Dev, "new-value");

        // Order of appearance must not matter.
        for input in [vec![older.clone(), newer.clone()], vec![newer.clone(), older.clone()]] {
            let conflicts = detect(&input);
            assert_eq!(conflicts.len(), 1);
            let dev = conflicts[0].environments.development.as_ref().unwrap();
            assert_eq!(dev.entry_id, EntryId("new".into()));
            assert_eq!(dev.fingerprint, fingerprint("new-value"));
        }
    }

    #[test]
    fn duplicate_with_equal_timestamp_keeps_later_seen() {
        let first = entry("first", "K", Prod, "a");
        let second = entry("second", "K", Prod, "b");
        let conflicts = detect(&[first, second]);
        let prod = conflicts[0].environments.production.as_ref().unwrap();
        assert_eq!(prod.entry_id, EntryId("second".into()));
    }

    #[test]
    fn discarded_duplicate_service_is_ignored() {
        let mut stale = with_service(entry("stale", "DB", Dev, "a"), "s9", "Legacy");
        stale.updated_at = t0() - Duration::days(1);
        let conflicts = detect(&[
            stale,
            with_service(entry("1", "DB", Dev, "a"), "s1", "Primary"),
            with_service(entry("2", "DB", Stg, "a"), "s1", "Primary"),
            with_service(entry("3", "DB", Prod, "a"), "s1", "Primary"),
        ]);
        assert!(conflicts.is_empty());
    }

    // ── Fingerprints ──

    #[test]
    fn slots_carry_fingerprints_not_values() {
        let conflicts = detect(&[entry("1", "PW", Prod, "hunter2")]);
        let json = serde_json::to_string(&conflicts).unwrap();
        assert!(!json.contains("hunter2"));
        let prod = conflicts[0].environments.production.as_ref().unwrap();
        assert_eq!(prod.fingerprint, fingerprint("hunter2"));
    }
}
