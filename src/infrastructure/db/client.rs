use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::entry::{EntryUpdate, NewEntry, StoredEntry};
use crate::domain::ports::RecordStore;
use crate::domain::value_objects::{EntryId, Environment, ProjectId};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::{from_driver, Dialect};
use crate::infrastructure::db::row_mapper::{format_timestamp, row_to_entry};
use crate::infrastructure::db::sql_utils::{
    build_create_statements, build_delete_query, build_find_query, build_insert_query,
    build_list_query, build_update_query, TableNames,
};

pub struct SqlxRecordStore {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
    tables: TableNames,
}

/// Connect to the database described in `cfg` and return a `SqlxRecordStore`.
pub async fn connect(cfg: &DbConfig) -> Result<SqlxRecordStore> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {} (driver: {})",
                cfg.dbname, cfg.driver
            )
        })?;

    debug!(
        "Connected to {}/{} via {} driver",
        cfg.host, cfg.dbname, cfg.driver
    );

    Ok(SqlxRecordStore {
        pool,
        dialect: Arc::from(from_driver(&cfg.driver)),
        tables: TableNames::from_config(cfg),
    })
}

impl SqlxRecordStore {
    /// Create the schema (where supported) and both tables if missing.
    pub async fn migrate(&self) -> Result<()> {
        for statement in build_create_statements(&self.tables, self.dialect.as_ref()) {
            debug!("Executing: {}", statement);
            sqlx::query(&statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run migration: {}", statement))?;
        }
        info!(
            driver = self.dialect.name(),
            entries = %self.tables.entries,
            services = %self.tables.services,
            "schema is up to date"
        );
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqlxRecordStore {
    async fn list_entries(&self, project: &ProjectId) -> Result<Vec<StoredEntry>> {
        let query = build_list_query(&self.tables, self.dialect.as_ref());
        debug!("Executing: {}", query);

        let rows = sqlx::query(&query)
            .bind(&project.0)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list entries of {}", project))?;

        rows.iter()
            .map(|row| row_to_entry(row, self.dialect.as_ref()))
            .collect()
    }

    async fn find_entry(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<Option<StoredEntry>> {
        let query = build_find_query(&self.tables, self.dialect.as_ref());
        debug!("Executing: {}", query);

        let row = sqlx::query(&query)
            .bind(&project.0)
            .bind(key_name)
            .bind(environment.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to look up {} in {}", key_name, environment))?;

        row.map(|r| row_to_entry(&r, self.dialect.as_ref()))
            .transpose()
    }

    async fn create_entry(&self, entry: &NewEntry) -> Result<EntryId> {
        let query = build_insert_query(&self.tables, self.dialect.as_ref());
        debug!("Executing: {}", query);

        let id = EntryId(Uuid::new_v4().to_string());
        sqlx::query(&query)
            .bind(&id.0)
            .bind(&entry.project_id.0)
            .bind(&entry.key_name)
            .bind(entry.environment.as_str())
            .bind(&entry.encrypted_value)
            .bind(entry.service_id.as_ref().map(|s| s.0.clone()))
            .bind(entry.is_secret)
            .bind(entry.description.clone())
            .bind(format_timestamp(&Utc::now()))
            .execute(&self.pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to insert {} in {}",
                    entry.key_name, entry.environment
                )
            })?;
        Ok(id)
    }

    async fn update_entry(&self, id: &EntryId, update: &EntryUpdate) -> Result<()> {
        let query = build_update_query(&self.tables, self.dialect.as_ref());
        debug!("Executing: {}", query);

        let result = sqlx::query(&query)
            .bind(&update.encrypted_value)
            .bind(update.service_id.as_ref().map(|s| s.0.clone()))
            .bind(update.is_secret)
            .bind(update.description.clone())
            .bind(format_timestamp(&update.updated_at))
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to update entry {}", id))?;

        if result.rows_affected() == 0 {
            bail!("entry {} not found", id);
        }
        Ok(())
    }

    async fn delete_entries(
        &self,
        project: &ProjectId,
        key_name: &str,
        environment: Environment,
    ) -> Result<u64> {
        let query = build_delete_query(&self.tables, self.dialect.as_ref());
        debug!("Executing: {}", query);

        let result = sqlx::query(&query)
            .bind(&project.0)
            .bind(key_name)
            .bind(environment.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete {} in {}", key_name, environment))?;
        Ok(result.rows_affected())
    }
}
