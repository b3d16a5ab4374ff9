use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;

use crate::domain::entry::StoredEntry;
use crate::domain::value_objects::{EntryId, Environment, ProjectId, ServiceId};
use crate::infrastructure::db::dialect::RowDecoder;

/// Convert a sqlx `AnyRow` into a `StoredEntry`.
///
/// Columns are read by position, in `sql_utils::ENTRY_COLUMNS` order.
/// `decoder` is the dialect-specific `RowDecoder`.
pub fn row_to_entry(row: &AnyRow, decoder: &dyn RowDecoder) -> Result<StoredEntry> {
    let text = |idx: usize| decoder.decode_text(row, idx);
    let required = |idx: usize, name: &str| -> Result<String> {
        text(idx)?.ok_or_else(|| anyhow!("column {} is NULL", name))
    };

    let environment: Environment = required(3, "environment")?
        .parse()
        .context("unexpected environment value in store")?;

    Ok(StoredEntry {
        id: EntryId(required(0, "id")?),
        project_id: ProjectId(required(1, "project_id")?),
        key_name: required(2, "key_name")?,
        environment,
        encrypted_value: required(4, "encrypted_value")?,
        service_id: text(5)?.map(ServiceId),
        service_name: text(6)?,
        is_secret: decoder.decode_flag(row, 7)?,
        description: text(8)?,
        updated_at: parse_timestamp(&required(9, "updated_at")?)?,
    })
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp in store: {}", s))
}
