use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ENVSYNC";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DbConfig,
    pub cipher: CipherConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Database driver: "postgres" (default), "mysql", "mariadb", or "sqlite".
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    pub dbname: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_entries_table")]
    pub entries_table: String,
    #[serde(default = "default_services_table")]
    pub services_table: String,
}

fn default_driver() -> String {
    "postgres".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_entries_table() -> String {
    "environment_variables".to_string()
}

fn default_services_table() -> String {
    "services".to_string()
}

/// Key material for the value cipher: 64 hex chars or a passphrase.
#[derive(Deserialize, Clone)]
pub struct CipherConfig {
    pub key: String,
}

impl std::fmt::Debug for CipherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherConfig")
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "./output".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuditConfig {
    /// JSON-lines audit file. `None` sends audit entries to the tracing target.
    #[serde(default)]
    pub path: Option<String>,
}

impl DbConfig {
    /// Build a sqlx-compatible connection URL from this config.
    pub fn url(&self) -> String {
        match self.driver.as_str() {
            "mysql" | "mariadb" => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
            "sqlite" => format!("sqlite://{}?mode=rwc", self.dbname),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
        }
    }
}

impl AppConfig {
    /// Load the TOML file at `path`, then overlay `ENVSYNC__SECTION__FIELD`
    /// environment variables.
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, env_source())
    }

    fn load_with(path: &str, env: Environment) -> Result<Self> {
        if !Path::new(path).exists() {
            anyhow::bail!("Config file not found: {}", path);
        }

        Config::builder()
            .add_source(File::new(path, FileFormat::Toml))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read config file: {}", path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", path))
    }

    /// `./envsync.toml` when present, otherwise `<config_dir>/envsync/config.toml`.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from("envsync.toml");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("envsync").join("config.toml"))
            .unwrap_or(local)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR)
}
