//! LF-set manager
//!
//! [`Labeler`] owns the active labeling functions of each candidate class and
//! exposes the public operations: full (re-)application, incremental
//! name-keyed update, label matrix retrieval and label/key maintenance.

use crate::lf::{KeyRef, LabelingFunction};
use crate::matrix::{materialize_all, LabelMatrix};
use crate::orchestrator::DocumentLabeler;
use crate::runner::{run_documents, RunSummary};
use crate::store::AnnotationKind;
use crate::utils::{begin_scope, retry_on_lock};
use crate::{keys, store};
use lfmat_common::db::get_documents;
use lfmat_common::{Candidate, CandidateClass, Document, Error, LabelerConfig, Result, SplitFilter};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info};

/// Options of [`Labeler::apply`]
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Label every candidate (any split) of these documents instead of a split
    pub docs: Option<Vec<Document>>,
    /// Split to label when `docs` is `None` or empty
    pub split: i32,
    /// Register newly observed LF names as keys
    pub train: bool,
    /// Delete prior labels of the targeted candidates first (and all keys when training)
    pub clear: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            docs: None,
            split: 0,
            train: false,
            clear: true,
        }
    }
}

/// Applies labeling functions to candidates and reads back label matrices
pub struct Labeler {
    db: SqlitePool,
    candidate_classes: Arc<Vec<Arc<CandidateClass>>>,
    lfs: Vec<Vec<LabelingFunction>>,
    workers: usize,
    max_lock_wait_ms: u64,
}

impl Labeler {
    pub fn new(db: SqlitePool, candidate_classes: Vec<Arc<CandidateClass>>) -> Self {
        Self::with_config(db, candidate_classes, &LabelerConfig::default())
    }

    /// Take worker count and lock budget from a loaded config
    pub fn with_config(
        db: SqlitePool,
        candidate_classes: Vec<Arc<CandidateClass>>,
        config: &LabelerConfig,
    ) -> Self {
        Self {
            db,
            candidate_classes: Arc::new(candidate_classes),
            lfs: Vec::new(),
            workers: config.workers.max(1),
            max_lock_wait_ms: config.max_lock_wait_ms,
        }
    }

    /// Active LF lists, one per candidate class (empty before the first apply)
    pub fn lfs(&self) -> &[Vec<LabelingFunction>] {
        &self.lfs
    }

    /// Replace the active LFs and label the selected candidates
    ///
    /// `lfs[i]` is the LF list of the i-th candidate class.
    pub async fn apply(
        &mut self,
        lfs: Vec<Vec<LabelingFunction>>,
        options: ApplyOptions,
    ) -> Result<RunSummary> {
        self.check_lf_lists(&lfs)?;
        self.lfs = lfs;

        let ApplyOptions {
            docs,
            split,
            train,
            clear,
        } = options;

        // An empty document list selects by split, same as no list
        let (documents, split_filter) = match docs.filter(|docs| !docs.is_empty()) {
            Some(docs) => (docs, SplitFilter::All),
            None => {
                let split_filter = SplitFilter::Split(split);
                let docs = get_documents(&self.db, &self.candidate_classes, split_filter).await?;
                (docs, split_filter)
            }
        };

        info!(
            documents = documents.len(),
            split = %split_filter,
            train,
            clear,
            lfs = self.lfs.iter().map(Vec::len).sum::<usize>(),
            "Applying labeling functions"
        );

        if clear {
            match split_filter {
                SplitFilter::Split(split) => self.clear(train, split).await?,
                SplitFilter::All => self.clear_documents(&documents, train).await?,
            }
        }

        let task = DocumentLabeler::new(
            self.db.clone(),
            Arc::clone(&self.candidate_classes),
            Arc::new(self.lfs.clone()),
            self.max_lock_wait_ms,
        )?;

        let summary = run_documents(documents, self.workers, |document| {
            let task = task.clone();
            async move { task.apply_document(&document, split_filter, train).await }
        })
        .await?;

        info!(
            documents = summary.documents,
            records = summary.records,
            keys = summary.keys.len(),
            "Labeling functions applied"
        );

        Ok(summary)
    }

    /// Replace active LFs by name (adding new names) and re-label in training mode
    ///
    /// Never clears existing labels or keys.
    pub async fn update(
        &mut self,
        lfs: Vec<Vec<LabelingFunction>>,
        docs: Option<Vec<Document>>,
        split: i32,
    ) -> Result<RunSummary> {
        self.check_lf_lists(&lfs)?;

        let mut merged = if self.lfs.is_empty() {
            vec![Vec::new(); self.candidate_classes.len()]
        } else {
            self.lfs.clone()
        };

        for (active, incoming) in merged.iter_mut().zip(lfs) {
            active.retain(|lf| !incoming.iter().any(|new| new.name() == lf.name()));
            active.extend(incoming);
        }

        self.apply(
            merged,
            ApplyOptions {
                docs,
                split,
                train: true,
                clear: false,
            },
        )
        .await
    }

    /// Delete keys by name or by LF
    ///
    /// Existing labels stay stored; they simply stop appearing as matrix columns.
    pub async fn drop_keys<I, K>(&self, keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyRef>,
    {
        let names = keys
            .into_iter()
            .map(|key| {
                let key = key.into();
                if key.name().trim().is_empty() {
                    Err(Error::Config(format!("Cannot resolve label key {:?}", key)))
                } else {
                    Ok(key.name().to_string())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let deleted = retry_on_lock("drop label keys", self.max_lock_wait_ms, || async {
            let mut scope = begin_scope(&self.db, "labeler::drop_keys").await?;
            let deleted = keys::drop_keys(scope.conn()?, AnnotationKind::Label, &names).await?;
            scope.commit().await?;
            Ok(deleted)
        })
        .await?;

        debug!(requested = names.len(), deleted, "Dropped label keys");
        Ok(deleted)
    }

    /// Delete labels of candidates in `split`; with `train`, delete every key too
    pub async fn clear(&self, train: bool, split: i32) -> Result<()> {
        info!("Clearing Labels (split {})", split);

        retry_on_lock("clear labels", self.max_lock_wait_ms, || async {
            let mut scope = begin_scope(&self.db, "labeler::clear").await?;
            store::clear_split(scope.conn()?, AnnotationKind::Label, split).await?;
            if train {
                debug!("Clearing all label keys");
                keys::drop_all_keys(scope.conn()?, AnnotationKind::Label).await?;
            }
            scope.commit().await
        })
        .await
    }

    /// Delete every label and every key
    pub async fn clear_all(&self) -> Result<()> {
        info!("Clearing ALL Labels and label keys");

        retry_on_lock("clear all labels", self.max_lock_wait_ms, || async {
            let mut scope = begin_scope(&self.db, "labeler::clear_all").await?;
            store::clear_all_labels(scope.conn()?, AnnotationKind::Label).await?;
            keys::drop_all_keys(scope.conn()?, AnnotationKind::Label).await?;
            scope.commit().await
        })
        .await
    }

    /// One label matrix per candidate list, columns = registered label keys
    pub async fn get_label_matrices(
        &self,
        cand_lists: &[Vec<Candidate>],
    ) -> Result<Vec<LabelMatrix>> {
        materialize_all(&self.db, AnnotationKind::Label, cand_lists, None).await
    }

    /// One gold label matrix per candidate list
    ///
    /// With `annotator`, that annotator is the only column; otherwise every
    /// registered annotator is.
    pub async fn get_gold_label_matrices(
        &self,
        cand_lists: &[Vec<Candidate>],
        annotator: Option<&str>,
    ) -> Result<Vec<LabelMatrix>> {
        materialize_all(&self.db, AnnotationKind::GoldLabel, cand_lists, annotator).await
    }

    fn check_lf_lists(&self, lfs: &[Vec<LabelingFunction>]) -> Result<()> {
        if lfs.len() != self.candidate_classes.len() {
            return Err(Error::Config(format!(
                "Please provide LFs for each candidate class ({} lists for {} classes)",
                lfs.len(),
                self.candidate_classes.len()
            )));
        }
        Ok(())
    }

    async fn clear_documents(&self, documents: &[Document], train: bool) -> Result<()> {
        let document_ids: Vec<i64> = documents.iter().map(|d| d.id).collect();
        info!("Clearing Labels ({} documents)", document_ids.len());

        retry_on_lock("clear document labels", self.max_lock_wait_ms, || async {
            let mut scope = begin_scope(&self.db, "labeler::clear_documents").await?;
            store::clear_documents(scope.conn()?, AnnotationKind::Label, &document_ids).await?;
            if train {
                keys::drop_all_keys(scope.conn()?, AnnotationKind::Label).await?;
            }
            scope.commit().await
        })
        .await
    }
}

/// Gold label matrices for one annotator (`"gold"` when `None`)
pub async fn load_gold_labels(
    pool: &SqlitePool,
    cand_lists: &[Vec<Candidate>],
    annotator: Option<&str>,
) -> Result<Vec<LabelMatrix>> {
    materialize_all(
        pool,
        AnnotationKind::GoldLabel,
        cand_lists,
        Some(annotator.unwrap_or("gold")),
    )
    .await
}
