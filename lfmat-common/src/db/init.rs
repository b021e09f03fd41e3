//! Database initialization
//!
//! Creates the label database on first run and brings an existing one up to the
//! current schema. Every statement is idempotent, so opening a database twice is safe.

use crate::{LabelerConfig, Result};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Open (or create) the label database and create tables if needed
pub async fn init_database(db_path: &Path, config: &LabelerConfig) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    let pool = config.create_pool(db_path).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table used by the labeler (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_documents_table(pool).await?;
    create_candidate_classes_table(pool).await?;
    create_candidates_table(pool).await?;

    // LF outputs
    create_key_table(pool, "label_keys").await?;
    create_label_table(pool, "labels").await?;

    // Human annotations, keyed by annotator name
    create_key_table(pool, "gold_label_keys").await?;
    create_label_table(pool, "gold_labels").await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidate_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidate_classes (
            name TEXT PRIMARY KEY,
            vocabulary TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidates_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id INTEGER PRIMARY KEY,
            document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            candidate_class TEXT NOT NULL REFERENCES candidate_classes(name) ON DELETE CASCADE,
            split INTEGER NOT NULL DEFAULT 0,
            mentions TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidates_document ON candidates(document_id, candidate_class)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_candidates_split ON candidates(split)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Key tables hold one row per distinct name
async fn create_key_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )
        "#,
        table
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

/// Label tables hold at most one code per (candidate, key name)
async fn create_label_table(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            candidate_id INTEGER NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
            key_name TEXT NOT NULL,
            value INTEGER NOT NULL,
            PRIMARY KEY (candidate_id, key_name)
        )
        "#,
        table
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_creates_all_tables() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("labels.db");

        let pool = init_database(&db_path, &LabelerConfig::default()).await.unwrap();
        assert!(db_path.exists());

        let tables = table_names(&pool).await;
        for expected in [
            "candidate_classes",
            "candidates",
            "documents",
            "gold_label_keys",
            "gold_labels",
            "label_keys",
            "labels",
            "schema_version",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("labels.db");

        let pool1 = init_database(&db_path, &LabelerConfig::default()).await.unwrap();
        pool1.close().await;

        let pool2 = init_database(&db_path, &LabelerConfig::default()).await.unwrap();
        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool2)
            .await
            .unwrap();
        assert_eq!(versions, 1);
    }
}
