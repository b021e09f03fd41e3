//! Key registry
//!
//! One row per distinct key name. Registration is `INSERT ... ON CONFLICT DO
//! NOTHING`, so concurrent documents registering the same LF name converge to a
//! single key without surfacing a conflict.

use crate::store::AnnotationKind;
use lfmat_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

const KEY_CHUNK: usize = 900;

/// Register every name not already present. No-op unless `train` is set.
///
/// Returns the number of keys actually created.
pub async fn register_keys(
    conn: &mut SqliteConnection,
    kind: AnnotationKind,
    names: &BTreeSet<String>,
    train: bool,
) -> Result<u64> {
    if !train || names.is_empty() {
        return Ok(0);
    }

    let names: Vec<&String> = names.iter().collect();
    let mut created = 0;

    for chunk in names.chunks(KEY_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {} (name) ", kind.key_table()));
        qb.push_values(chunk, |mut row, name| {
            row.push_bind(name.as_str());
        });
        qb.push(" ON CONFLICT(name) DO NOTHING");

        created += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(created)
}

/// Delete the named keys; names with no key are skipped
pub async fn drop_keys(
    conn: &mut SqliteConnection,
    kind: AnnotationKind,
    names: &[String],
) -> Result<u64> {
    let mut deleted = 0;

    for chunk in names.chunks(KEY_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("DELETE FROM {} WHERE name IN (", kind.key_table()));
        let mut separated = qb.separated(", ");
        for name in chunk {
            separated.push_bind(name.as_str());
        }
        separated.push_unseparated(")");

        deleted += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(deleted)
}

/// Delete every key of this kind
pub async fn drop_all_keys(conn: &mut SqliteConnection, kind: AnnotationKind) -> Result<u64> {
    let sql = format!("DELETE FROM {}", kind.key_table());
    let result = sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Registered key names, ordered by name
pub async fn list_keys(pool: &SqlitePool, kind: AnnotationKind) -> Result<Vec<String>> {
    let sql = format!("SELECT name FROM {} ORDER BY name", kind.key_table());
    let names = sqlx::query_scalar(&sql).fetch_all(pool).await?;
    Ok(names)
}
