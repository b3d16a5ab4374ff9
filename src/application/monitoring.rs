use crate::domain::entry::{EntryUpdate, NewEntry, StoredEntry};
use crate::domain::ports::RecordStore;
use crate::domain::value_objects::{EntryId, Environment, ProjectId};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed store operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Port method name, e.g. "list_entries" or "update_entry".
    pub operation: &'static str,
    /// Project id, or `key@environment` for single-entry calls.
    pub subject: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Records returned or affected.
    pub rows: usize,
}

/// Accumulated store timings for one scan or resolution.
///
/// Shared across decorator instances via `Arc<Mutex<_>>`. After the run,
/// pass to [`crate::presentation::cli_summary::print_perf_summary`].
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub total_rows_read: usize,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Copy out the accumulated timings; an empty report if the lock is poisoned.
    pub fn snapshot(report: &Arc<Mutex<Self>>) -> Self {
        report.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            if matches!(timing.operation, "list_entries" | "find_entry") {
                r.total_rows_read += timing.rows;
            }
            r.timings.push(timing);
        }
    }
}

// ─── MonitoringRecordStore ───────────────────────────────────────────────────

/// Decorator: wraps any `RecordStore`, measures wall time per call and
/// appends the result to the shared `PerfReport`.
pub struct MonitoringRecordStore {
    inner: Arc<dyn RecordStore>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringRecordStore {
    pub fn new(inner: Arc<dyn RecordStore>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }

    fn finish(&self, operation: &'static str, subject: String, start: Instant, rows: usize) {
        let duration_ms = start.elapsed().as_millis();
        info!(%subject, rows, duration_ms, "{} completed", operation);
        PerfReport::record(
            &self.report,
            OpTiming {
                operation,
                subject,
                duration_ms,
                rows,
            },
        );
    }
}

fn entry_subject(key_name: &str, environment: Environment) -> String {
    format!("{}@{}", key_name, environment)
}

#[async_trait]
impl RecordStore for MonitoringRecordStore {
    #[instrument(
        name = "list_entries",
        skip(self, project),
        fields(project = %project),
        level = "info"
    )]
    async fn list_entries(&self, project: &ProjectId) -> Result<Vec<StoredEntry>> {
        let start = Instant::now();
        let rows = self.inner.list_entries(project).await?;
        self.finish("list_entries", project.to_string(), start, rows.len());
        Ok(rows)
    }

    #[instrument(
        name = "find_entry",
        skip(self, project, key_name),
        fields(project = %project, key = %key_name, env = %environment),
        level = "info"
    )]
    async fn find_entry(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<Option<StoredEntry>> {
        let start = Instant::now();
        let found = self.inner.find_entry(project, key_name, environment).await?;
        self.finish(
            "find_entry",
            entry_subject(key_name, environment),
            start,
            usize::from(found.is_some()),
        );
        Ok(found)
    }

    #[instrument(
        name = "create_entry",
        skip(self, entry),
        fields(key = %entry.key_name, env = %entry.environment),
        level = "info"
    )]
    async fn create_entry(&self, entry: &NewEntry) -> Result<EntryId> {
        let start = Instant::now();
        let id = self.inner.create_entry(entry).await?;
        self.finish(
            "create_entry",
            entry_subject(&entry.key_name, entry.environment),
            start,
            1,
        );
        Ok(id)
    }

    #[instrument(
        name = "update_entry",
        skip(self, id, update),
        fields(entry = %id),
        level = "info"
    )]
    async fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<()> {
        let start = Instant::now();
        self.inner.update_entry(id, update).await?;
        self.finish("update_entry", id.to_string(), start, 1);
        Ok(())
    }

    #[instrument(
        name = "delete_entries",
        skip(self, project, key_name),
        fields(project = %project, key = %key_name, env = %environment),
        level = "info"
    )]
    async fn delete_entries(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<u64> {
        let start = Instant::now();
        let removed = self
            .inner
            .delete_entries(project, key_name, environment)
            .await?;
        self.finish(
            "delete_entries",
            entry_subject(key_name, environment),
            start,
            removed as usize,
        );
        Ok(removed)
    }
}
