use anyhow::Result;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of envsync's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                              |
/// |---------|-----------------|------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                 |
/// | `Info`  | `info`          | Default: scan summary, per-target result |
/// | `Debug` | `debug`         | `--verbose`: shows SQL queries too       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[cfg_attr(not(feature = "cli"), allow(dead_code))]
    fn default_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "envsync=error",
            LogLevel::Info => "envsync=info",
            LogLevel::Debug => "envsync=debug",
        }
    }
}

/// Initialise the global `tracing` subscriber for envsync.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise. Call
/// this **once** at startup. Library consumers who manage their own
/// subscriber should skip it.
///
/// Only available with the `cli` feature (pulls in `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.default_filter().into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::detector::ConflictDetector;
pub use application::monitoring::PerfReport;
pub use application::resolver::ConflictResolver;
pub use application::scan::ScanService;
pub use domain::conflict::{
    Conflict, ConflictEnvironmentEntry, ConflictKind, ConflictMetrics, EnvironmentSlots, Severity,
};
pub use domain::entry::ConfigEntry;
pub use domain::fingerprint::fingerprint;
pub use domain::resolution::{
    ActionTaken, ResolutionAction, ResolutionReport, ResolutionResult, ResolveError, ResolveRequest,
};
pub use domain::scan_report::ScanReport;
pub use domain::value_objects::{EntryId, Environment, Fingerprint, ProjectId, ServiceId};
pub use infrastructure::config::{AppConfig, AuditConfig, CipherConfig, DbConfig, OutputConfig};

use crate::application::monitoring::MonitoringRecordStore;
use crate::domain::audit::{AuditEntry, ACTION_CONFLICT_RESOLVE, ACTION_CONFLICT_SCAN};
use crate::domain::ports::{AuditSink, RecordStore};
use crate::infrastructure::audit::sink_for;
use crate::infrastructure::cipher::ChaChaValueCipher;
use crate::infrastructure::db::client::connect;
use crate::infrastructure::notifier::TracingSyncNotifier;

// ─── Public entry points ───

/// Classify cross-environment conflicts in an already-decrypted snapshot.
///
/// Pure and synchronous. The caller scopes `entries` to one project.
/// Conflicts come back critical first.
pub fn detect_conflicts(entries: &[ConfigEntry]) -> Vec<Conflict> {
    ConflictDetector::new().detect(entries)
}

/// Scan one project in the configured database.
///
/// Records a `conflict_scan` audit entry for `actor_id`.
/// Use [`scan_with_timing`] if you also want a performance report.
pub async fn scan(cfg: &AppConfig, project: &ProjectId, actor_id: &str) -> Result<ScanReport> {
    let (report, _) = scan_with_timing(cfg, project, actor_id).await?;
    Ok(report)
}

/// Scan with per-operation store timings.
pub async fn scan_with_timing(
    cfg: &AppConfig,
    project: &ProjectId,
    actor_id: &str,
) -> Result<(ScanReport, PerfReport)> {
    let perf = PerfReport::new();
    let store = build_store(&cfg.database, Arc::clone(&perf)).await?;
    let cipher = Arc::new(ChaChaValueCipher::from_config(&cfg.cipher)?);

    let report = ScanService::new(store, cipher).scan(project).await?;

    let audit = sink_for(&cfg.audit);
    record_audit(
        audit.as_ref(),
        AuditEntry::new(
            ACTION_CONFLICT_SCAN,
            actor_id,
            project,
            json!({ "conflict_count": report.conflicts.len() }),
        ),
    )
    .await;

    Ok((report, PerfReport::snapshot(&perf)))
}

/// Apply a `copy` or `delete` resolution against the configured database.
///
/// Whole-request failures (malformed request, missing or unreadable copy
/// source, unreachable database) are returned as [`ResolveError`].
/// Per-target failures live in the report's result slots.
pub async fn resolve(
    cfg: &AppConfig,
    request: &ResolveRequest,
    actor_id: &str,
) -> Result<ResolutionReport, ResolveError> {
    let (report, _) = resolve_with_timing(cfg, request, actor_id).await?;
    Ok(report)
}

/// Resolve with per-operation store timings.
pub async fn resolve_with_timing(
    cfg: &AppConfig,
    request: &ResolveRequest,
    actor_id: &str,
) -> Result<(ResolutionReport, PerfReport), ResolveError> {
    // Fail fast before connecting.
    request.validate()?;

    let perf = PerfReport::new();
    let store = build_store(&cfg.database, Arc::clone(&perf)).await?;
    let cipher = Arc::new(ChaChaValueCipher::from_config(&cfg.cipher)?);
    let resolver = ConflictResolver::new(store, cipher, Arc::new(TracingSyncNotifier));

    let report = resolver.resolve(request, actor_id).await?;

    let audit = sink_for(&cfg.audit);
    record_audit(
        audit.as_ref(),
        AuditEntry::new(
            ACTION_CONFLICT_RESOLVE,
            actor_id,
            &request.project_id,
            resolve_audit_details(request, &report),
        ),
    )
    .await;

    Ok((report, PerfReport::snapshot(&perf)))
}

/// Create the entries and services tables in the configured database.
pub async fn migrate(cfg: &AppConfig) -> Result<()> {
    connect(&cfg.database).await?.migrate().await
}

// ─── Private helpers ───────────────────────────────────────────────────────────

/// Connect and wrap the store in the monitoring decorator.
async fn build_store(cfg: &DbConfig, perf: Arc<Mutex<PerfReport>>) -> Result<Arc<dyn RecordStore>> {
    let store = Arc::new(connect(cfg).await?);
    Ok(Arc::new(MonitoringRecordStore::new(store, perf)))
}

/// `source_environment` is only meaningful for copy.
fn resolve_audit_details(request: &ResolveRequest, report: &ResolutionReport) -> serde_json::Value {
    let mut details = json!({
        "key_name": request.key_name,
        "action": request.action,
        "target_environments": request.target_environments,
        "results": report.results,
    });
    if request.action == ResolutionAction::Copy {
        details["source_environment"] = json!(request.source_environment);
    }
    details
}

/// Audit failures never fail the operation they describe.
async fn record_audit(sink: &dyn AuditSink, entry: AuditEntry) {
    if let Err(e) = sink.record(&entry).await {
        warn!(action = entry.action, error = %format!("{:#}", e), "failed to record audit entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _: &AuditEntry) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn detect_conflicts_matches_detector() {
        let entries = vec![ConfigEntry {
            id: EntryId("1".into()),
            key_name: "API_KEY".into(),
            environment: Environment::Development,
            decrypted_value: "abc".into(),
            associated_service_id: None,
            associated_service_name: None,
            updated_at: Utc::now(),
        }];
        let conflicts = detect_conflicts(&entries);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::MissingValue);
        assert_eq!(conflicts[0].severity, Severity::Critical);
    }

    #[test]
    fn resolve_audit_details_carry_request_and_results() {
        let request = ResolveRequest {
            project_id: ProjectId("p".into()),
            key_name: "API_KEY".into(),
            source_environment: Some(Environment::Development),
            target_environments: vec![Environment::Staging, Environment::Production],
            action: ResolutionAction::Copy,
        };
        let report = ResolutionReport::new(vec![
            ResolutionResult {
                environment: Environment::Staging,
                action_taken: ActionTaken::Updated,
                error: None,
            },
            ResolutionResult {
                environment: Environment::Production,
                action_taken: ActionTaken::Created,
                error: Some("boom".into()),
            },
        ]);

        let details = resolve_audit_details(&request, &report);
        assert_eq!(details["action"], "copy");
        assert_eq!(details["source_environment"], "development");
        assert_eq!(
            details["target_environments"],
            json!(["staging", "production"])
        );
        assert_eq!(details["results"][0]["action_taken"], "updated");
        assert!(details["results"][0]["error"].is_null());
        assert_eq!(details["results"][1]["error"], "boom");
    }

    #[test]
    fn delete_audit_details_omit_source_environment() {
        let request = ResolveRequest {
            project_id: ProjectId("p".into()),
            key_name: "OLD_FLAG".into(),
            source_environment: Some(Environment::Development),
            target_environments: vec![Environment::Production],
            action: ResolutionAction::Delete,
        };
        let report = ResolutionReport::new(vec![ResolutionResult {
            environment: Environment::Production,
            action_taken: ActionTaken::Deleted,
            error: None,
        }]);

        let details = resolve_audit_details(&request, &report);
        assert_eq!(details["action"], "delete");
        assert!(details.get("source_environment").is_none());
        assert_eq!(details["results"][0]["action_taken"], "deleted");
    }

    #[tokio::test]
    async fn audit_failure_is_swallowed() {
        let entry = AuditEntry::new(ACTION_CONFLICT_SCAN, "u", &ProjectId("p".into()), json!({}));
        record_audit(&FailingSink, entry).await;
    }

    #[tokio::test]
    async fn invalid_request_fails_before_connecting() {
        let cfg = AppConfig {
            database: DbConfig {
                driver: "postgres".into(),
                host: "unreachable.invalid".into(),
                port: 1,
                dbname: "x".into(),
                user: "u".into(),
                password: "p".into(),
                schema: "public".into(),
                entries_table: "environment_variables".into(),
                services_table: "services".into(),
            },
            cipher: CipherConfig { key: "k".into() },
            output: OutputConfig::default(),
            audit: AuditConfig::default(),
        };
        let request = ResolveRequest {
            project_id: ProjectId("p".into()),
            key_name: "K".into(),
            source_environment: None,
            target_environments: vec![Environment::Production],
            action: ResolutionAction::Copy,
        };
        let err = resolve(&cfg, &request, "u").await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest(_)));
    }

    #[test]
    fn log_level_filters() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Debug.default_filter(), "envsync=debug");
        assert_eq!(LogLevel::Error.default_filter(), "envsync=error");
    }
}
