//! Configuration loading and database path resolution

use crate::{Error, Result};
use serde::Deserialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the label database location
pub const DATABASE_ENV_VAR: &str = "LFMAT_DATABASE";

/// Labeler configuration, usually read from `config.toml`
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    /// Label database file; see [`LabelerConfig::resolve_database_path`]
    pub database_path: Option<PathBuf>,

    /// Documents processed concurrently during apply/update
    ///
    /// **Default:** 4
    pub workers: usize,

    /// Database connection pool size
    ///
    /// **Default:** 8 (should be at least `workers` + 1)
    pub pool_size: u32,

    /// SQLite busy_timeout applied to every pooled connection
    ///
    /// **Default:** 250 ms
    pub busy_timeout_ms: u64,

    /// Total retry budget for a write that keeps hitting lock contention
    ///
    /// **Default:** 5000 ms
    pub max_lock_wait_ms: u64,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            workers: 4,
            pool_size: 8,
            busy_timeout_ms: 250,
            max_lock_wait_ms: 5000,
        }
    }
}

impl LabelerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LabelerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load an explicit config file, else the platform config file, else defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_file {
            return Self::from_file(path);
        }

        match find_config_file() {
            Some(path) => {
                tracing::debug!("Loading config file: {}", path.display());
                Self::from_file(&path)
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values that cannot drive a labeling run
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }
        if self.max_lock_wait_ms < self.busy_timeout_ms {
            return Err(Error::Config(format!(
                "max_lock_wait_ms ({}) must not be smaller than busy_timeout_ms ({})",
                self.max_lock_wait_ms, self.busy_timeout_ms
            )));
        }
        Ok(())
    }

    /// Database path resolution priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. Environment variable `LFMAT_DATABASE`
    /// 3. `database_path` from the TOML config file
    /// 4. OS-dependent compiled default (fallback)
    pub fn resolve_database_path(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.database_path {
            return path.clone();
        }

        default_database_path()
    }

    /// Create the database pool described by this config
    ///
    /// Per-connection settings: busy_timeout, WAL journal, foreign keys.
    pub async fn create_pool(&self, db_path: &Path) -> Result<SqlitePool> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::debug!(
            "Creating database pool: {} connections, busy_timeout={}ms",
            self.pool_size,
            self.busy_timeout_ms
        );

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(self.pool_size)
            .acquire_timeout(Duration::from_millis(self.max_lock_wait_ms))
            .connect_with(options)
            .await?;

        Ok(pool)
    }
}

/// Platform config file, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("lfmat").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/lfmat/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lfmat"))
        .unwrap_or_else(|| PathBuf::from("./lfmat_data"))
        .join("lfmat.db")
}
