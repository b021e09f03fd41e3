//! Document and candidate store
//!
//! Read side used by the labeler to enumerate work, plus the write helpers the
//! extraction stage (and tests) use to populate it.

use crate::db::models::{Candidate, CandidateClass, Document, SplitFilter};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

/// Save a candidate class declaration (vocabulary stored as a JSON array)
pub async fn register_candidate_class(pool: &SqlitePool, class: &CandidateClass) -> Result<()> {
    let vocabulary = serde_json::to_string(class.values())?;

    sqlx::query(
        r#"
        INSERT INTO candidate_classes (name, vocabulary) VALUES (?, ?)
        ON CONFLICT(name) DO UPDATE SET vocabulary = excluded.vocabulary
        "#,
    )
    .bind(class.name())
    .bind(&vocabulary)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a previously registered candidate class
pub async fn load_candidate_class(pool: &SqlitePool, name: &str) -> Result<CandidateClass> {
    let vocabulary: Option<String> =
        sqlx::query_scalar("SELECT vocabulary FROM candidate_classes WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    let vocabulary = vocabulary
        .ok_or_else(|| Error::NotFound(format!("candidate class {}", name)))?;
    let values: Vec<String> = serde_json::from_str(&vocabulary)?;

    CandidateClass::new(name, values)
}

/// List every registered candidate class name
pub async fn list_candidate_classes(pool: &SqlitePool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar("SELECT name FROM candidate_classes ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(names)
}

/// Insert a document, or return the existing one with the same name
pub async fn insert_document(pool: &SqlitePool, name: &str) -> Result<Document> {
    sqlx::query("INSERT OR IGNORE INTO documents (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM documents WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;

    Ok(Document {
        id,
        name: name.to_string(),
    })
}

/// Insert a candidate of a registered class and return its id
pub async fn insert_candidate(
    pool: &SqlitePool,
    document_id: i64,
    class: &CandidateClass,
    split: i32,
    mentions: &[String],
) -> Result<i64> {
    let mentions = serde_json::to_string(mentions)?;

    let result = sqlx::query(
        "INSERT INTO candidates (document_id, candidate_class, split, mentions) VALUES (?, ?, ?, ?)",
    )
    .bind(document_id)
    .bind(class.name())
    .bind(split)
    .bind(&mentions)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Delete a candidate; its labels and gold labels cascade
pub async fn delete_candidate(pool: &SqlitePool, candidate_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM candidates WHERE id = ?")
        .bind(candidate_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Documents holding at least one candidate of `classes` in `split`
pub async fn get_documents(
    pool: &SqlitePool,
    classes: &[Arc<CandidateClass>],
    split: SplitFilter,
) -> Result<Vec<Document>> {
    if classes.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT DISTINCT d.id, d.name FROM documents d \
         JOIN candidates c ON c.document_id = d.id \
         WHERE c.candidate_class IN (",
    );
    let mut separated = qb.separated(", ");
    for class in classes {
        separated.push_bind(class.name());
    }
    separated.push_unseparated(")");

    if let Some(split) = split.split() {
        qb.push(" AND c.split = ").push_bind(split);
    }
    qb.push(" ORDER BY d.id");

    let rows = qb.build().fetch_all(pool).await?;

    let documents = rows
        .iter()
        .map(|row| Document {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();

    Ok(documents)
}

/// Candidates of one document, grouped per class in the order of `classes`
pub async fn get_candidates(
    pool: &SqlitePool,
    classes: &[Arc<CandidateClass>],
    document_id: i64,
    split: SplitFilter,
) -> Result<Vec<Vec<Candidate>>> {
    let mut grouped = Vec::with_capacity(classes.len());

    for class in classes {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, document_id, split, mentions FROM candidates WHERE candidate_class = ",
        );
        qb.push_bind(class.name());
        qb.push(" AND document_id = ").push_bind(document_id);
        if let Some(split) = split.split() {
            qb.push(" AND split = ").push_bind(split);
        }
        qb.push(" ORDER BY id");

        let rows = qb.build().fetch_all(pool).await?;
        let candidates = rows
            .iter()
            .map(|row| candidate_from_row(row, class))
            .collect::<Result<Vec<_>>>()?;

        grouped.push(candidates);
    }

    Ok(grouped)
}

/// Every candidate of one class in `split`, ordered by id
pub async fn get_candidates_by_split(
    pool: &SqlitePool,
    class: &Arc<CandidateClass>,
    split: SplitFilter,
) -> Result<Vec<Candidate>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, document_id, split, mentions FROM candidates WHERE candidate_class = ",
    );
    qb.push_bind(class.name());
    if let Some(split) = split.split() {
        qb.push(" AND split = ").push_bind(split);
    }
    qb.push(" ORDER BY id");

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(|row| candidate_from_row(row, class)).collect()
}

/// Count documents in the database
pub async fn count_documents(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Candidate counts per split, ordered by split
pub async fn count_candidates_by_split(pool: &SqlitePool) -> Result<Vec<(i32, i64)>> {
    let rows =
        sqlx::query("SELECT split, COUNT(*) AS n FROM candidates GROUP BY split ORDER BY split")
            .fetch_all(pool)
            .await?;

    Ok(rows.iter().map(|row| (row.get("split"), row.get("n"))).collect())
}

fn candidate_from_row(row: &SqliteRow, class: &Arc<CandidateClass>) -> Result<Candidate> {
    let mentions: String = row.get("mentions");

    Ok(Candidate {
        id: row.get("id"),
        document_id: row.get("document_id"),
        split: row.get("split"),
        mentions: serde_json::from_str(&mentions)?,
        class: Arc::clone(class),
    })
}
