use crate::domain::{
    audit::AuditEntry,
    entry::{EntryUpdate, NewEntry, StoredEntry},
    scan_report::ScanReport,
    value_objects::{EntryId, Environment, ProjectId},
};
use anyhow::Result;
use async_trait::async_trait;

/// Port: keyed configuration records (implemented by SqlxRecordStore,
/// InMemoryRecordStore)
///
/// At most one record exists per `(project, key, environment)`; the store
/// enforces this, callers assume it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records of a project, with `service_name` joined in.
    async fn list_entries(&self, project: &ProjectId) -> Result<Vec<StoredEntry>>;

    async fn find_entry(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<Option<StoredEntry>>;

    async fn create_entry(&self, entry: &NewEntry) -> Result<EntryId>;

    async fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<()>;

    /// Delete every record for the key in that environment. Returns the number
    /// removed; zero is not an error.
    async fn delete_entries(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<u64>;
}

/// Port: reversible value cipher (implemented by ChaChaValueCipher)
///
/// May be non-deterministic: two encryptions of the same plaintext are not
/// expected to be equal, so ciphertext is never copied between records.
pub trait ValueCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// Port: best-effort refresh signal after a successful mutation
/// (implemented by TracingSyncNotifier, NoopSyncNotifier)
///
/// Only ever invoked detached; its result is never observed.
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn notify(
        &self,
        project: &ProjectId,
        environment: Environment,
        actor_id: &str,
    ) -> Result<()>;
}

/// Port: audit trail (implemented by TracingAuditSink, JsonLinesAuditSink)
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Port: output formatting (implemented by JsonWriter, HtmlWriter)
pub trait OutputWriter: Send + Sync {
    /// Serializes the scan report to a string (JSON, HTML, etc.)
    fn format(&self, report: &ScanReport) -> Result<String>;
    /// Extension of the produced file (e.g. "json", "html")
    fn extension(&self) -> &'static str;
}
