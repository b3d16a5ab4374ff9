use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::entry::{EntryUpdate, NewEntry, StoredEntry};
use crate::domain::ports::RecordStore;
use crate::domain::value_objects::{EntryId, Environment, ProjectId, ServiceId};

/// In-memory implementation of [`RecordStore`].
///
/// Enforces the same uniqueness rule as the SQL schema: one record per
/// `(project, key, environment)`. Backs the offline `detect` command, the
/// library demo and the tests.
#[derive(Default)]
pub struct InMemoryRecordStore {
    entries: Mutex<Vec<StoredEntry>>,
    services: Mutex<BTreeMap<ServiceId, String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records (ids and timestamps kept as given).
    pub fn with_entries(entries: Vec<StoredEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            services: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a display name, joined into `service_name` on every read.
    pub fn register_service(&self, id: ServiceId, name: &str) -> Result<()> {
        lock(&self.services)?.insert(id, name.to_string());
        Ok(())
    }

    /// Copy of every stored record, in insertion order.
    pub fn snapshot(&self) -> Result<Vec<StoredEntry>> {
        Ok(lock(&self.entries)?.clone())
    }

    fn with_service_name(&self, mut entry: StoredEntry) -> Result<StoredEntry> {
        entry.service_name = match &entry.service_id {
            Some(id) => lock(&self.services)?.get(id).cloned(),
            None => None,
        };
        Ok(entry)
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow!("store lock poisoned"))
}

fn matches(e: &StoredEntry, project: &ProjectId, key_name: &str, env: Environment) -> bool {
    &e.project_id == project && e.key_name == key_name && e.environment == env
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_entries(&self, project: &ProjectId) -> Result<Vec<StoredEntry>> {
        let mut rows: Vec<StoredEntry> = lock(&self.entries)?
            .iter()
            .filter(|e| &e.project_id == project)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.key_name.cmp(&b.key_name));
        rows.into_iter()
            .map(|e| self.with_service_name(e))
            .collect()
    }

    async fn find_entry(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<Option<StoredEntry>> {
        let found = lock(&self.entries)?
            .iter()
            .find(|e| matches(e, project, key_name, environment))
            .cloned();
        found.map(|e| self.with_service_name(e)).transpose()
    }

    async fn create_entry(&self, entry: &NewEntry) -> Result<EntryId> {
        let mut entries = lock(&self.entries)?;
        if entries
            .iter()
            .any(|e| matches(e, &entry.project_id, &entry.key_name, entry.environment))
        {
            bail!(
                "entry {} already exists in {}",
                entry.key_name,
                entry.environment
            );
        }

        let id = EntryId(Uuid::new_v4().to_string());
        entries.push(StoredEntry {
            id: id.clone(),
            project_id: entry.project_id.clone(),
            key_name: entry.key_name.clone(),
            environment: entry.environment,
            encrypted_value: entry.encrypted_value.clone(),
            service_id: entry.service_id.clone(),
            service_name: None,
            is_secret: entry.is_secret,
            description: entry.description.clone(),
            updated_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<()> {
        let mut entries = lock(&self.entries)?;
        let entry = entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| anyhow!("entry {} not found", id))?;

        entry.encrypted_value = update.encrypted_value.clone();
        entry.service_id = update.service_id.clone();
        entry.is_secret = update.is_secret;
        entry.description = update.description.clone();
        entry.updated_at = update.updated_at;
        Ok(())
    }

    async fn delete_entries(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<u64> {
        let mut entries = lock(&self.entries)?;
        let before = entries.len();
        entries.retain(|e| !matches(e, project, key_name, environment));
        Ok((before - entries.len()) as u64)
    }
}
