//! Label store
//!
//! Persistent `(candidate, key name, code)` rows with at most one row per
//! `(candidate, key name)`. Writes are true upserts: one multi-row
//! `INSERT ... ON CONFLICT DO UPDATE` statement per chunk, issued inside the
//! caller's [`WriteScope`](crate::utils::WriteScope) connection.

use lfmat_common::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

/// Rows per upsert statement (3 bind parameters each, below SQLite's 32766 limit)
pub const UPSERT_CHUNK_ROWS: usize = 5_000;

/// Ids per `IN (...)` list
pub(crate) const ID_CHUNK: usize = 900;

/// Which label/key table pair an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnnotationKind {
    /// Labels written by labeling functions, keyed by LF name
    Label,
    /// Human annotations, keyed by annotator name
    GoldLabel,
}

impl AnnotationKind {
    pub fn label_table(&self) -> &'static str {
        match self {
            AnnotationKind::Label => "labels",
            AnnotationKind::GoldLabel => "gold_labels",
        }
    }

    pub fn key_table(&self) -> &'static str {
        match self {
            AnnotationKind::Label => "label_keys",
            AnnotationKind::GoldLabel => "gold_label_keys",
        }
    }
}

/// One encoded label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LabelRecord {
    pub candidate_id: i64,
    pub key_name: String,
    pub value: i32,
}

impl LabelRecord {
    pub fn new(candidate_id: i64, key_name: impl Into<String>, value: i32) -> Self {
        Self {
            candidate_id,
            key_name: key_name.into(),
            value,
        }
    }
}

/// Insert or overwrite every record of the batch
///
/// Returns the number of rows written.
pub async fn upsert_labels(
    conn: &mut SqliteConnection,
    kind: AnnotationKind,
    records: &[LabelRecord],
) -> Result<u64> {
    let mut written = 0;

    for chunk in records.chunks(UPSERT_CHUNK_ROWS) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {} (candidate_id, key_name, value) ",
            kind.label_table()
        ));
        qb.push_values(chunk, |mut row, record| {
            row.push_bind(record.candidate_id)
                .push_bind(record.key_name.as_str())
                .push_bind(record.value);
        });
        qb.push(" ON CONFLICT(candidate_id, key_name) DO UPDATE SET value = excluded.value");

        written += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(written)
}

/// Write gold labels for one annotator and register the annotator as a key
pub async fn upsert_gold_labels(
    conn: &mut SqliteConnection,
    annotator: &str,
    labels: &[(i64, i32)],
) -> Result<u64> {
    let records: Vec<LabelRecord> = labels
        .iter()
        .map(|(candidate_id, value)| LabelRecord::new(*candidate_id, annotator, *value))
        .collect();

    let written = upsert_labels(&mut *conn, AnnotationKind::GoldLabel, &records).await?;

    let annotators = BTreeSet::from([annotator.to_string()]);
    crate::keys::register_keys(&mut *conn, AnnotationKind::GoldLabel, &annotators, true).await?;

    Ok(written)
}

/// Delete labels whose candidate belongs to `split`
pub async fn clear_split(
    conn: &mut SqliteConnection,
    kind: AnnotationKind,
    split: i32,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE candidate_id IN (SELECT id FROM candidates WHERE split = ?)",
        kind.label_table()
    );
    let result = sqlx::query(&sql).bind(split).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Delete labels of every candidate in the given documents
pub async fn clear_documents(
    conn: &mut SqliteConnection,
    kind: AnnotationKind,
    document_ids: &[i64],
) -> Result<u64> {
    let mut deleted = 0;

    for chunk in document_ids.chunks(ID_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "DELETE FROM {} WHERE candidate_id IN (SELECT id FROM candidates WHERE document_id IN (",
            kind.label_table()
        ));
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated("))");

        deleted += qb.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(deleted)
}

/// Delete every label of this kind
pub async fn clear_all_labels(conn: &mut SqliteConnection, kind: AnnotationKind) -> Result<u64> {
    let sql = format!("DELETE FROM {}", kind.label_table());
    let result = sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Count stored labels of this kind
pub async fn count_labels(pool: &SqlitePool, kind: AnnotationKind) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.label_table());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}

/// Every stored label of this kind, ordered by candidate then key name
pub async fn load_all_labels(pool: &SqlitePool, kind: AnnotationKind) -> Result<Vec<LabelRecord>> {
    let sql = format!(
        "SELECT candidate_id, key_name, value FROM {} ORDER BY candidate_id, key_name",
        kind.label_table()
    );
    let rows: Vec<(i64, String, i32)> = sqlx::query_as(&sql).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|(candidate_id, key_name, value)| LabelRecord {
            candidate_id,
            key_name,
            value,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::begin_scope;
    use lfmat_common::db::{
        init_database, insert_candidate, insert_document, register_candidate_class,
    };
    use lfmat_common::{CandidateClass, LabelerConfig};
    use tempfile::TempDir;

    /// Database with 3 candidates: two in split 0 (doc-a), one in split 1 (doc-b)
    async fn setup() -> (TempDir, SqlitePool, Vec<i64>) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("store.db"), &LabelerConfig::default())
            .await
            .unwrap();

        let class = CandidateClass::new("Spouse", ["pos", "neg"]).unwrap();
        register_candidate_class(&pool, &class).await.unwrap();
        let doc_a = insert_document(&pool, "doc-a").await.unwrap();
        let doc_b = insert_document(&pool, "doc-b").await.unwrap();

        let ids = vec![
            insert_candidate(&pool, doc_a.id, &class, 0, &[]).await.unwrap(),
            insert_candidate(&pool, doc_a.id, &class, 0, &[]).await.unwrap(),
            insert_candidate(&pool, doc_b.id, &class, 1, &[]).await.unwrap(),
        ];

        (temp_dir, pool, ids)
    }

    async fn write(pool: &SqlitePool, records: &[LabelRecord]) {
        let mut scope = begin_scope(pool, "test").await.unwrap();
        upsert_labels(scope.conn().unwrap(), AnnotationKind::Label, records)
            .await
            .unwrap();
        scope.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_code() {
        let (_dir, pool, ids) = setup().await;

        write(&pool, &[LabelRecord::new(ids[0], "lf_a", 1)]).await;
        write(
            &pool,
            &[LabelRecord::new(ids[0], "lf_a", -1), LabelRecord::new(ids[1], "lf_a", 0)],
        )
        .await;

        let labels = load_all_labels(&pool, AnnotationKind::Label).await.unwrap();
        assert_eq!(
            labels,
            vec![LabelRecord::new(ids[0], "lf_a", -1), LabelRecord::new(ids[1], "lf_a", 0)]
        );
    }

    #[tokio::test]
    async fn test_upsert_spans_multiple_chunks() {
        let (_dir, pool, ids) = setup().await;

        let records: Vec<LabelRecord> = (0..UPSERT_CHUNK_ROWS + 10)
            .map(|i| LabelRecord::new(ids[i % 3], format!("lf_{:05}", i), 1))
            .collect();
        write(&pool, &records).await;

        assert_eq!(
            count_labels(&pool, AnnotationKind::Label).await.unwrap(),
            records.len() as i64
        );
    }

    #[tokio::test]
    async fn test_clear_split_only_touches_that_split() {
        let (_dir, pool, ids) = setup().await;
        write(
            &pool,
            &[
                LabelRecord::new(ids[0], "lf_a", 1),
                LabelRecord::new(ids[1], "lf_a", -1),
                LabelRecord::new(ids[2], "lf_a", 1),
            ],
        )
        .await;

        let mut scope = begin_scope(&pool, "test").await.unwrap();
        let deleted = clear_split(scope.conn().unwrap(), AnnotationKind::Label, 1).await.unwrap();
        scope.commit().await.unwrap();

        assert_eq!(deleted, 1);
        let remaining = load_all_labels(&pool, AnnotationKind::Label).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|r| r.candidate_id != ids[2]));
    }

    #[tokio::test]
    async fn test_clear_documents_and_clear_all() {
        let (_dir, pool, ids) = setup().await;
        write(
            &pool,
            &[
                LabelRecord::new(ids[0], "lf_a", 1),
                LabelRecord::new(ids[2], "lf_a", 1),
            ],
        )
        .await;
        let doc_b_id: i64 = sqlx::query_scalar("SELECT document_id FROM candidates WHERE id = ?")
            .bind(ids[2])
            .fetch_one(&pool)
            .await
            .unwrap();

        let mut scope = begin_scope(&pool, "test").await.unwrap();
        assert_eq!(
            clear_documents(scope.conn().unwrap(), AnnotationKind::Label, &[doc_b_id])
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            clear_all_labels(scope.conn().unwrap(), AnnotationKind::Label)
                .await
                .unwrap(),
            1
        );
        scope.commit().await.unwrap();

        assert_eq!(count_labels(&pool, AnnotationKind::Label).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gold_labels_register_annotator() {
        let (_dir, pool, ids) = setup().await;

        let mut scope = begin_scope(&pool, "test").await.unwrap();
        upsert_gold_labels(scope.conn().unwrap(), "gold", &[(ids[0], 1), (ids[1], -1)])
            .await
            .unwrap();
        scope.commit().await.unwrap();

        assert_eq!(count_labels(&pool, AnnotationKind::GoldLabel).await.unwrap(), 2);
        assert_eq!(count_labels(&pool, AnnotationKind::Label).await.unwrap(), 0);
        assert_eq!(
            crate::keys::list_keys(&pool, AnnotationKind::GoldLabel).await.unwrap(),
            vec!["gold".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deleting_candidate_cascades_to_labels() {
        let (_dir, pool, ids) = setup().await;
        write(
            &pool,
            &[LabelRecord::new(ids[0], "lf_a", 1), LabelRecord::new(ids[1], "lf_a", 1)],
        )
        .await;

        lfmat_common::db::delete_candidate(&pool, ids[0]).await.unwrap();

        let remaining = load_all_labels(&pool, AnnotationKind::Label).await.unwrap();
        assert_eq!(remaining, vec![LabelRecord::new(ids[1], "lf_a", 1)]);
    }
}
