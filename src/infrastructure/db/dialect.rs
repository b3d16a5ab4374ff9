use anyhow::{anyhow, Result};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// SQL dialect: identifier quoting, placeholders and DDL types.
///
/// Implemented per driver. Pure string manipulation with no sqlx dependency,
/// so the query builders in `sql_utils` can be unit-tested without a database.
pub trait QueryDialect: Send + Sync {
    /// Return the driver name as a lowercase string ("postgres", "mysql", …).
    /// Used for log output only, never for branching logic.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, schema) per dialect.
    /// - MySQL / MariaDB → backtick: `` `col` ``
    /// - PostgreSQL / SQLite → double-quote: `"col"`
    fn quote_ident(&self, s: &str) -> String;

    /// Return the `schema.` prefix for a qualified table reference.
    /// SQLite has no schema namespace, so it returns `""`.
    fn schema_prefix(&self, schema: &str) -> String {
        if schema.is_empty() {
            String::new()
        } else {
            format!("{}.", self.quote_ident(schema))
        }
    }

    /// Positional bind parameter, 1-based.
    /// - PostgreSQL → `$n`
    /// - everything else → `?`
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    /// Column type for short indexed strings (ids, key names, environments).
    fn key_type(&self) -> &'static str {
        "VARCHAR(255)"
    }

    /// Column type for the boolean `is_secret` flag.
    fn flag_type(&self) -> &'static str {
        "BOOLEAN"
    }

    /// Statement creating the schema namespace, if the driver has one.
    fn create_schema_sql(&self, _schema: &str) -> Option<String> {
        None
    }
}

/// Row decoder: read a single `AnyRow` column.
///
/// Implemented per driver. Lives in infrastructure only; callers outside this
/// module receive domain types, never raw `AnyRow`s.
pub trait RowDecoder: Send + Sync {
    /// Decode a nullable text column.
    fn decode_text(&self, row: &AnyRow, idx: usize) -> Result<Option<String>> {
        Ok(row.try_get::<Option<String>, _>(idx)?)
    }

    /// Decode a boolean flag regardless of how the driver stores it.
    fn decode_flag(&self, row: &AnyRow, idx: usize) -> Result<bool> {
        flag_from_row(row, idx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresDialect;

impl QueryDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${}", n)
    }

    fn create_schema_sql(&self, schema: &str) -> Option<String> {
        if schema.is_empty() {
            return None;
        }
        Some(format!("CREATE SCHEMA IF NOT EXISTS {}", self.quote_ident(schema)))
    }
}

impl RowDecoder for PostgresDialect {}

// ─────────────────────────────────────────────────────────────────────────────
// MySQL / MariaDB
// ─────────────────────────────────────────────────────────────────────────────

pub struct MysqlDialect;

impl QueryDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("`{}`", s.replace('`', "``"))
    }

    fn flag_type(&self) -> &'static str {
        "INT"
    }
}

impl RowDecoder for MysqlDialect {
    fn decode_text(&self, row: &AnyRow, idx: usize) -> Result<Option<String>> {
        // TEXT columns can reach sqlx AnyRow as BLOB; read raw bytes then.
        if row.column(idx).type_info().name() == "BLOB" {
            blob_to_string(row, idx)
        } else {
            Ok(row.try_get::<Option<String>, _>(idx)?)
        }
    }
}

// MariaDB shares MySQL's wire protocol and AnyRow behaviour.
pub struct MariadbDialect;

impl QueryDialect for MariadbDialect {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn quote_ident(&self, s: &str) -> String {
        MysqlDialect.quote_ident(s)
    }

    fn flag_type(&self) -> &'static str {
        MysqlDialect.flag_type()
    }
}

impl RowDecoder for MariadbDialect {
    fn decode_text(&self, row: &AnyRow, idx: usize) -> Result<Option<String>> {
        MysqlDialect.decode_text(row, idx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteDialect;

impl QueryDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn schema_prefix(&self, _schema: &str) -> String {
        // SQLite has no schema namespace
        String::new()
    }

    fn key_type(&self) -> &'static str {
        "TEXT"
    }

    fn flag_type(&self) -> &'static str {
        "INTEGER"
    }
}

impl RowDecoder for SqliteDialect {}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve the dialect pair (QueryDialect + RowDecoder) from a driver name string.
pub fn from_driver(driver: &str) -> Box<dyn Dialect> {
    match driver {
        "mysql" => Box::new(MysqlDialect),
        "mariadb" => Box::new(MariadbDialect),
        "sqlite" => Box::new(SqliteDialect),
        _ => Box::new(PostgresDialect),
    }
}

/// Combined supertrait so callers only store one object.
pub trait Dialect: QueryDialect + RowDecoder {}
impl Dialect for PostgresDialect {}
impl Dialect for MysqlDialect {}
impl Dialect for MariadbDialect {}
impl Dialect for SqliteDialect {}

// ─────────────────────────────────────────────────────────────────────────────
// Shared decoding helpers (private to this module)
// ─────────────────────────────────────────────────────────────────────────────

fn blob_to_string(row: &AnyRow, idx: usize) -> Result<Option<String>> {
    let bytes: Option<Vec<u8>> = row.try_get(idx)?;
    bytes
        .map(|b| String::from_utf8(b).map_err(|e| anyhow!("column {} is not UTF-8: {}", idx, e)))
        .transpose()
}

/// Postgres reports BOOLEAN, SQLite INTEGER (i64), MySQL INT (i32). Try each
/// representation in turn; NULL reads as `false`.
fn flag_from_row(row: &AnyRow, idx: usize) -> Result<bool> {
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return Ok(v.unwrap_or(false));
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.is_some_and(|n| n != 0));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return Ok(v.is_some_and(|n| n != 0));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return Ok(v.is_some_and(|n| n != 0));
    }
    let text: Option<String> = row.try_get(idx)?;
    Ok(text.as_deref().is_some_and(parse_flag))
}

/// Text forms of a true flag.
pub(crate) fn parse_flag(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    matches!(s.as_str(), "1" | "t" | "true" | "yes")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
