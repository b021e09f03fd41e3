//! Test fixtures: temporary label databases populated with documents and candidates

#![allow(dead_code)]

use lfmat_common::db::{init_database, insert_candidate, insert_document, register_candidate_class};
use lfmat_common::{Candidate, CandidateClass, Document, LabelerConfig, SplitFilter};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// A database in a temp dir; the dir lives as long as the fixture
pub struct TestDb {
    pub dir: TempDir,
    pub pool: SqlitePool,
}

impl TestDb {
    pub async fn new() -> Self {
        Self::with_config(&LabelerConfig::default()).await
    }

    pub async fn with_config(config: &LabelerConfig) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let pool = init_database(&dir.path().join("labels.db"), config)
            .await
            .expect("init database");
        Self { dir, pool }
    }

    pub async fn class(&self, name: &str, values: &[&str]) -> Arc<CandidateClass> {
        let class = CandidateClass::new(name, values.iter().copied()).expect("candidate class");
        register_candidate_class(&self.pool, &class)
            .await
            .expect("register class");
        Arc::new(class)
    }

    pub async fn document(&self, name: &str) -> Document {
        insert_document(&self.pool, name).await.expect("insert document")
    }

    /// Insert a candidate and return it as the labeler will load it
    pub async fn candidate(
        &self,
        document: &Document,
        class: &Arc<CandidateClass>,
        split: i32,
        mentions: &[&str],
    ) -> Candidate {
        let mentions: Vec<String> = mentions.iter().map(|m| m.to_string()).collect();
        let id = insert_candidate(&self.pool, document.id, class, split, &mentions)
            .await
            .expect("insert candidate");
        Candidate {
            id,
            document_id: document.id,
            split,
            mentions,
            class: Arc::clone(class),
        }
    }

    pub async fn candidates(
        &self,
        class: &Arc<CandidateClass>,
        split: SplitFilter,
    ) -> Vec<Candidate> {
        lfmat_common::db::get_candidates_by_split(&self.pool, class, split)
            .await
            .expect("load candidates")
    }

    /// `(candidate_id, key_name, value)` rows of the labels table, sorted
    pub async fn label_rows(&self) -> Vec<(i64, String, i32)> {
        sqlx::query_as(
            "SELECT candidate_id, key_name, value FROM labels ORDER BY candidate_id, key_name",
        )
        .fetch_all(&self.pool)
        .await
        .expect("label rows")
    }

    pub async fn key_names(&self) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM label_keys ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .expect("key names")
    }
}
