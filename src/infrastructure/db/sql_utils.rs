use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::QueryDialect;

// ─────────────────────────────────────────────────────────────────────────────
// Table names
// ─────────────────────────────────────────────────────────────────────────────

/// Where the entries and services live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub schema: String,
    pub entries: String,
    pub services: String,
}

impl TableNames {
    /// MySQL has no schema separate from the database, so the `public`
    /// default falls back to `dbname` there.
    pub fn from_config(cfg: &DbConfig) -> Self {
        let schema = match cfg.driver.as_str() {
            "mysql" | "mariadb" if cfg.schema == "public" => cfg.dbname.clone(),
            _ => cfg.schema.clone(),
        };
        Self {
            schema,
            entries: cfg.entries_table.clone(),
            services: cfg.services_table.clone(),
        }
    }

    fn entries_q(&self, dialect: &dyn QueryDialect) -> String {
        format!(
            "{}{}",
            dialect.schema_prefix(&self.schema),
            dialect.quote_ident(&self.entries)
        )
    }

    fn services_q(&self, dialect: &dyn QueryDialect) -> String {
        format!(
            "{}{}",
            dialect.schema_prefix(&self.schema),
            dialect.quote_ident(&self.services)
        )
    }
}

/// Column order of every SELECT built here; `row_mapper` reads by index.
pub const ENTRY_COLUMNS: [&str; 10] = [
    "id",
    "project_id",
    "key_name",
    "environment",
    "encrypted_value",
    "service_id",
    "service_name",
    "is_secret",
    "description",
    "updated_at",
];

/// Columns written by INSERT, in bind order.
const INSERT_COLUMNS: [&str; 9] = [
    "id",
    "project_id",
    "key_name",
    "environment",
    "encrypted_value",
    "service_id",
    "is_secret",
    "description",
    "updated_at",
];

// ─────────────────────────────────────────────────────────────────────────────
// Query builders
// ─────────────────────────────────────────────────────────────────────────────

fn select_prefix(tables: &TableNames, dialect: &dyn QueryDialect) -> String {
    let q = |c: &str| dialect.quote_ident(c);
    let cols: Vec<String> = ENTRY_COLUMNS
        .iter()
        .map(|c| match *c {
            "service_name" => format!("s.{} AS {}", q("name"), q("service_name")),
            other => format!("e.{}", q(other)),
        })
        .collect();
    format!(
        "SELECT {} FROM {} e LEFT JOIN {} s ON s.{} = e.{}",
        cols.join(", "),
        tables.entries_q(dialect),
        tables.services_q(dialect),
        q("id"),
        q("service_id"),
    )
}

/// Every entry of one project, service name joined. Binds: project_id.
pub fn build_list_query(tables: &TableNames, dialect: &dyn QueryDialect) -> String {
    format!(
        "{} WHERE e.{} = {} ORDER BY e.{}, e.{}",
        select_prefix(tables, dialect),
        dialect.quote_ident("project_id"),
        dialect.placeholder(1),
        dialect.quote_ident("key_name"),
        dialect.quote_ident("environment"),
    )
}

/// One `(project, key, environment)` entry. Binds: project_id, key_name, environment.
pub fn build_find_query(tables: &TableNames, dialect: &dyn QueryDialect) -> String {
    format!(
        "{} WHERE {}",
        select_prefix(tables, dialect),
        entry_filter(dialect, Some("e"), 1)
    )
}

/// Binds follow `INSERT_COLUMNS`.
pub fn build_insert_query(tables: &TableNames, dialect: &dyn QueryDialect) -> String {
    let cols: Vec<String> = INSERT_COLUMNS
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect();
    let params: Vec<String> = (1..=INSERT_COLUMNS.len())
        .map(|n| dialect.placeholder(n))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        tables.entries_q(dialect),
        cols.join(", "),
        params.join(", ")
    )
}

/// Binds: encrypted_value, service_id, is_secret, description, updated_at, id.
pub fn build_update_query(tables: &TableNames, dialect: &dyn QueryDialect) -> String {
    let sets: Vec<String> = [
        "encrypted_value",
        "service_id",
        "is_secret",
        "description",
        "updated_at",
    ]
    .iter()
    .enumerate()
    .map(|(i, c)| {
        format!(
            "{} = {}",
            dialect.quote_ident(c),
            dialect.placeholder(i + 1)
        )
    })
    .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = {}",
        tables.entries_q(dialect),
        sets.join(", "),
        dialect.quote_ident("id"),
        dialect.placeholder(sets.len() + 1)
    )
}

/// Binds: project_id, key_name, environment.
pub fn build_delete_query(tables: &TableNames, dialect: &dyn QueryDialect) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        tables.entries_q(dialect),
        entry_filter(dialect, None, 1)
    )
}

fn entry_filter(dialect: &dyn QueryDialect, alias: Option<&str>, first: usize) -> String {
    let prefix = alias.map(|a| format!("{}.", a)).unwrap_or_default();
    ["project_id", "key_name", "environment"]
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}{} = {}",
                prefix,
                dialect.quote_ident(c),
                dialect.placeholder(first + i)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

// ─────────────────────────────────────────────────────────────────────────────
// DDL
// ─────────────────────────────────────────────────────────────────────────────

/// Statements creating both tables, idempotent (`IF NOT EXISTS`).
///
/// Timestamps are RFC 3339 text so every driver round-trips them through
/// `sqlx::AnyRow` the same way.
pub fn build_create_statements(tables: &TableNames, dialect: &dyn QueryDialect) -> Vec<String> {
    let q = |c: &str| dialect.quote_ident(c);
    let key = dialect.key_type();

    let mut statements = Vec::new();
    if let Some(schema_sql) = dialect.create_schema_sql(&tables.schema) {
        statements.push(schema_sql);
    }

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} ({} {key} PRIMARY KEY, {} {key} NOT NULL)",
        tables.services_q(dialect),
        q("id"),
        q("name"),
    ));

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         {} {key} PRIMARY KEY, \
         {} {key} NOT NULL, \
         {} {key} NOT NULL, \
         {} {key} NOT NULL, \
         {} TEXT NOT NULL, \
         {} {key} NULL, \
         {} {} NOT NULL, \
         {} TEXT NULL, \
         {} {key} NOT NULL, \
         UNIQUE ({}, {}, {}))",
        tables.entries_q(dialect),
        q("id"),
        q("project_id"),
        q("key_name"),
        q("environment"),
        q("encrypted_value"),
        q("service_id"),
        q("is_secret"),
        dialect.flag_type(),
        q("description"),
        q("updated_at"),
        q("project_id"),
        q("key_name"),
        q("environment"),
    ));

    statements
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::dialect::{MysqlDialect, PostgresDialect, SqliteDialect};

    fn tables(schema: &str) -> TableNames {
        TableNames {
            schema: schema.into(),
            entries: "environment_variables".into(),
            services: "services".into(),
        }
    }

    fn db_config(driver: &str) -> DbConfig {
        DbConfig {
            driver: driver.into(),
            host: "h".into(),
            port: 1,
            dbname: "appdb".into(),
            user: "u".into(),
            password: "p".into(),
            schema: "public".into(),
            entries_table: "environment_variables".into(),
            services_table: "services".into(),
        }
    }

    #[test]
    fn test_table_names_mysql_falls_back_to_dbname() {
        let schema = |driver| TableNames::from_config(&db_config(driver)).schema;
        assert_eq!(schema("mysql"), "appdb");
        assert_eq!(schema("mariadb"), "appdb");
        assert_eq!(schema("postgres"), "public");
    }

    #[test]
    fn test_list_query_postgres() {
        let q = build_list_query(&tables("public"), &PostgresDialect);
        assert!(q.starts_with(r#"SELECT e."id", e."project_id""#), "{}", q);
        assert!(q.contains(r#"s."name" AS "service_name""#), "{}", q);
        assert!(
            q.contains(r#"FROM "public"."environment_variables" e"#),
            "{}",
            q
        );
        assert!(
            q.contains(r#"LEFT JOIN "public"."services" s ON s."id" = e."service_id""#),
            "{}",
            q
        );
        assert!(
            q.ends_with(r#"WHERE e."project_id" = $1 ORDER BY e."key_name", e."environment""#),
            "{}",
            q
        );
    }

    #[test]
    fn test_list_query_sqlite_has_no_schema() {
        let q = build_list_query(&tables("public"), &SqliteDialect);
        assert!(q.contains(r#"FROM "environment_variables" e"#), "{}", q);
        assert!(q.contains(r#"e."project_id" = ?"#), "{}", q);
    }

    #[test]
    fn test_find_query_mysql() {
        let q = build_find_query(&tables("appdb"), &MysqlDialect);
        assert!(
            q.contains("FROM `appdb`.`environment_variables` e"),
            "{}",
            q
        );
        assert!(
            q.ends_with("WHERE e.`project_id` = ? AND e.`key_name` = ? AND e.`environment` = ?"),
            "{}",
            q
        );
    }

    #[test]
    fn test_select_column_order_matches_mapper() {
        let q = build_find_query(&tables("public"), &PostgresDialect);
        let select = q.split(" FROM ").next().unwrap();
        assert_eq!(select.matches(", ").count() + 1, ENTRY_COLUMNS.len());
        let updated_at = select.find(r#""updated_at""#).unwrap();
        let is_secret = select.find(r#""is_secret""#).unwrap();
        assert!(is_secret < updated_at);
    }

    #[test]
    fn test_insert_query_postgres() {
        let q = build_insert_query(&tables("public"), &PostgresDialect);
        assert_eq!(
            q,
            r#"INSERT INTO "public"."environment_variables" ("id", "project_id", "key_name", "environment", "encrypted_value", "service_id", "is_secret", "description", "updated_at") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#
        );
    }

    #[test]
    fn test_update_query_binds_id_last() {
        let q = build_update_query(&tables("public"), &PostgresDialect);
        assert!(q.contains(r#""encrypted_value" = $1"#), "{}", q);
        assert!(q.contains(r#""updated_at" = $5"#), "{}", q);
        assert!(q.ends_with(r#"WHERE "id" = $6"#), "{}", q);

        let q = build_update_query(&tables("appdb"), &MysqlDialect);
        assert!(q.ends_with("WHERE `id` = ?"), "{}", q);
        assert!(!q.contains('$'));
    }

    #[test]
    fn test_delete_query() {
        let q = build_delete_query(&tables("public"), &PostgresDialect);
        assert_eq!(
            q,
            r#"DELETE FROM "public"."environment_variables" WHERE "project_id" = $1 AND "key_name" = $2 AND "environment" = $3"#
        );
    }

    #[test]
    fn test_create_statements_postgres() {
        let stmts = build_create_statements(&tables("cfg"), &PostgresDialect);
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0], r#"CREATE SCHEMA IF NOT EXISTS "cfg""#);
        assert!(stmts[1].starts_with(r#"CREATE TABLE IF NOT EXISTS "cfg"."services""#));
        assert!(
            stmts[2].contains(r#""is_secret" BOOLEAN NOT NULL"#),
            "{}",
            stmts[2]
        );
        assert!(stmts[2].contains(r#"UNIQUE ("project_id", "key_name", "environment")"#));
    }

    #[test]
    fn test_create_statements_sqlite_and_mysql() {
        let sqlite = build_create_statements(&tables("public"), &SqliteDialect);
        assert_eq!(sqlite.len(), 2);
        assert!(sqlite[1].contains(r#""is_secret" INTEGER NOT NULL"#));
        assert!(sqlite[1].contains(r#""id" TEXT PRIMARY KEY"#));

        let mysql = build_create_statements(&tables("appdb"), &MysqlDialect);
        assert_eq!(mysql.len(), 2);
        assert!(mysql[1].contains("`key_name` VARCHAR(255) NOT NULL"));
        assert!(mysql[1].contains("`is_secret` INT NOT NULL"));
    }
}
