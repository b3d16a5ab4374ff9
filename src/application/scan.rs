use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::application::detector::ConflictDetector;
use crate::domain::entry::ConfigEntry;
use crate::domain::ports::{RecordStore, ValueCipher};
use crate::domain::scan_report::ScanReport;
use crate::domain::value_objects::ProjectId;

// ─────────────────────────────────────────────────────────────────────────────
// ScanService
// ─────────────────────────────────────────────────────────────────────────────

/// Loads a project's stored entries, decrypts them and runs detection.
///
/// # Responsibility (SRP)
/// `ConflictDetector` classifies an in-memory snapshot.
/// `ScanService` builds that snapshot from the record store. It is the only
/// place decrypted values exist during a scan; the returned report carries
/// fingerprints only.
pub struct ScanService {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn ValueCipher>,
    detector: ConflictDetector,
}

impl ScanService {
    pub fn new(store: Arc<dyn RecordStore>, cipher: Arc<dyn ValueCipher>) -> Self {
        Self {
            store,
            cipher,
            detector: ConflictDetector::new(),
        }
    }

    #[instrument(name = "scan", skip(self), fields(project = %project), level = "info")]
    pub async fn scan(&self, project: &ProjectId) -> Result<ScanReport> {
        let stored = self
            .store
            .list_entries(project)
            .await
            .with_context(|| format!("failed to list entries for project {}", project))?;

        let entries: Vec<ConfigEntry> = stored
            .iter()
            .map(|entry| {
                // An unreadable value still counts as present.
                let value = self.cipher.decrypt(&entry.encrypted_value).unwrap_or_else(|e| {
                    warn!(
                        key = %entry.key_name,
                        environment = %entry.environment,
                        error = %format!("{:#}", e),
                        "failed to decrypt value; scanning as empty"
                    );
                    String::new()
                });
                entry.to_config_entry(value)
            })
            .collect();

        let conflicts = self.detector.detect(&entries);
        let report = ScanReport::new(project.clone(), entries.len(), conflicts);

        info!(
            entries = report.entries_scanned,
            critical = report.metrics.critical,
            warning = report.metrics.warning,
            info = report.metrics.info,
            "scan completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conflict::{ConflictKind, Severity};
    use crate::domain::entry::StoredEntry;
    use crate::domain::value_objects::{EntryId, Environment, ServiceId};
    use crate::infrastructure::cipher::ChaChaValueCipher;
    use crate::infrastructure::memory_store::InMemoryRecordStore;
    use chrono::Utc;

    fn cipher() -> ChaChaValueCipher {
        ChaChaValueCipher::new([3u8; 32])
    }

    fn stored(key: &str, env: Environment, value: &str, service: Option<&str>) -> StoredEntry {
        StoredEntry {
            id: EntryId(format!("{}-{}", key, env)),
            project_id: ProjectId("p".into()),
            key_name: key.into(),
            environment: env,
            encrypted_value: cipher().encrypt(value).unwrap(),
            service_id: service.map(|s| ServiceId(s.into())),
            service_name: None,
            is_secret: false,
            description: None,
            updated_at: Utc::now(),
        }
    }

    fn service(store: InMemoryRecordStore) -> ScanService {
        ScanService::new(Arc::new(store), Arc::new(cipher()))
    }

    #[tokio::test]
    async fn reports_conflicts_and_metrics() {
        let store = InMemoryRecordStore::with_entries(vec![
            stored("API_KEY", Environment::Development, "abc", None),
            stored("API_KEY", Environment::Staging, "abc", None),
            stored("DB_URL", Environment::Development, "a", Some("s1")),
            stored("DB_URL", Environment::Staging, "b", Some("s2")),
            stored("DB_URL", Environment::Production, "c", Some("s1")),
        ]);
        let (s1, s2) = (ServiceId("s1".into()), ServiceId("s2".into()));
        store.register_service(s1, "Postgres").unwrap();
        store.register_service(s2, "Neon").unwrap();

        let report = service(store).scan(&ProjectId("p".into())).await.unwrap();

        assert_eq!(report.entries_scanned, 5);
        assert_eq!(report.metrics.total, 2);
        assert_eq!(report.metrics.critical, 1);
        assert_eq!(report.metrics.info, 1);
        assert_eq!(report.conflicts[0].kind, ConflictKind::MissingValue);
        assert_eq!(report.conflicts[1].severity, Severity::Info);
        assert_eq!(
            report.conflicts[1].affected_services,
            vec!["Postgres", "Neon"]
        );
        assert!(report.has_critical());
    }

    #[tokio::test]
    async fn consistent_project_is_clean() {
        let store = InMemoryRecordStore::with_entries(
            Environment::ALL
                .iter()
                .map(|&env| stored("TOKEN", env, "x", None))
                .collect(),
        );
        let report = service(store).scan(&ProjectId("p".into())).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.metrics.total, 0);
    }

    #[tokio::test]
    async fn undecryptable_value_does_not_abort_scan() {
        let mut broken = stored("SECRET", Environment::Production, "v", None);
        broken.encrypted_value = "not-a-ciphertext".into();
        let store = InMemoryRecordStore::with_entries(vec![
            broken,
            stored("SECRET", Environment::Development, "v", None),
        ]);

        let report = service(store).scan(&ProjectId("p".into())).await.unwrap();

        // Production is still present; only staging is reported missing.
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].severity, Severity::Warning);
        assert!(report.conflicts[0].environments.production.is_some());
    }

    #[tokio::test]
    async fn report_never_contains_plaintext() {
        let store = InMemoryRecordStore::with_entries(vec![stored(
            "API_KEY",
            Environment::Development,
            "sk-live-very-secret",
            None,
        )]);
        let report = service(store).scan(&ProjectId("p".into())).await.unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("sk-live-very-secret"));
    }

    #[tokio::test]
    async fn other_projects_are_ignored() {
        let mut foreign = stored("OTHER", Environment::Development, "v", None);
        foreign.project_id = ProjectId("q".into());
        let store = InMemoryRecordStore::with_entries(vec![foreign]);
        let report = service(store).scan(&ProjectId("p".into())).await.unwrap();
        assert_eq!(report.entries_scanned, 0);
        assert!(report.is_clean());
    }
}
