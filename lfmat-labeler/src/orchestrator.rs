//! Document-level orchestrator
//!
//! Labels one document per call:
//! 1. Select: candidates of the document in the requested split
//! 2. Group: one list per declared candidate class
//! 3. Encode: run each class's LFs over its candidates
//! 4. Persist: upsert every record of the document
//! 5. Grow vocabulary: register observed LF names (training only)
//!
//! Nothing is written unless encoding the whole document succeeds. Steps 4 and 5
//! share one write scope, committed once per document.

use crate::applier::apply_one;
use crate::keys::register_keys;
use crate::lf::LabelingFunction;
use crate::store::{upsert_labels, AnnotationKind, LabelRecord};
use crate::utils::{begin_scope, retry_on_lock};
use lfmat_common::db::get_candidates;
use lfmat_common::{Candidate, CandidateClass, Document, Error, Result, SplitFilter};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of labeling one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOutcome {
    pub document_id: i64,
    pub candidates: usize,
    pub records: usize,
    /// Distinct LF names that produced a record
    pub keys: BTreeSet<String>,
}

/// Per-document labeling callback handed to the runner
#[derive(Clone)]
pub struct DocumentLabeler {
    db: SqlitePool,
    classes: Arc<Vec<Arc<CandidateClass>>>,
    lfs: Arc<Vec<Vec<LabelingFunction>>>,
    max_lock_wait_ms: u64,
}

impl DocumentLabeler {
    /// `lfs[i]` is the LF list of `classes[i]`
    pub fn new(
        db: SqlitePool,
        classes: Arc<Vec<Arc<CandidateClass>>>,
        lfs: Arc<Vec<Vec<LabelingFunction>>>,
        max_lock_wait_ms: u64,
    ) -> Result<Self> {
        if lfs.len() != classes.len() {
            return Err(Error::Config(format!(
                "Please provide LFs for each candidate class ({} lists for {} classes)",
                lfs.len(),
                classes.len()
            )));
        }

        Ok(Self {
            db,
            classes,
            lfs,
            max_lock_wait_ms,
        })
    }

    /// Label every selected candidate of `document` and commit the result
    pub async fn apply_document(
        &self,
        document: &Document,
        split: SplitFilter,
        train: bool,
    ) -> Result<DocumentOutcome> {
        tracing::debug!(document = %document.name, split = %split, "Labeling document");

        let cands_list = get_candidates(&self.db, &self.classes, document.id, split).await?;
        let candidates: usize = cands_list.iter().map(Vec::len).sum();

        // LFs are arbitrary user code, keep them off the async workers
        let lfs = Arc::clone(&self.lfs);
        let (records, keys) =
            tokio::task::spawn_blocking(move || encode_document(&cands_list, &lfs))
                .await
                .map_err(|e| Error::Internal(format!("Labeling task failed: {}", e)))??;

        retry_on_lock("label document", self.max_lock_wait_ms, || async {
            let mut scope = begin_scope(&self.db, "orchestrator::apply_document").await?;
            upsert_labels(scope.conn()?, AnnotationKind::Label, &records).await?;
            register_keys(scope.conn()?, AnnotationKind::Label, &keys, train).await?;
            scope.commit().await
        })
        .await?;

        tracing::debug!(
            document = %document.name,
            candidates,
            records = records.len(),
            keys = keys.len(),
            "Document labeled"
        );

        Ok(DocumentOutcome {
            document_id: document.id,
            candidates,
            records: records.len(),
            keys,
        })
    }
}

/// Encode every candidate group with its class's LFs
///
/// `cands_list[i]` is labeled by `lfs[i]`. Returns the records plus the set of
/// LF names that produced them.
pub fn encode_document(
    cands_list: &[Vec<Candidate>],
    lfs: &[Vec<LabelingFunction>],
) -> Result<(Vec<LabelRecord>, BTreeSet<String>)> {
    let mut records = Vec::new();
    let mut keys = BTreeSet::new();

    for (cands, class_lfs) in cands_list.iter().zip(lfs) {
        for candidate in cands {
            for record in apply_one(candidate, class_lfs)? {
                if !keys.contains(&record.key_name) {
                    keys.insert(record.key_name.clone());
                }
                records.push(record);
            }
        }
    }

    Ok((records, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::LfOutput;

    fn candidate(id: i64, class: &Arc<CandidateClass>) -> Candidate {
        Candidate {
            id,
            document_id: 1,
            split: 0,
            mentions: Vec::new(),
            class: Arc::clone(class),
        }
    }

    #[test]
    fn test_encode_document_collects_keys_per_group() {
        let spouse = Arc::new(CandidateClass::new("Spouse", ["pos", "neg"]).unwrap());
        let genre = Arc::new(CandidateClass::new("Genre", ["rock", "jazz", "folk"]).unwrap());

        let cands_list = vec![
            vec![candidate(1, &spouse), candidate(2, &spouse)],
            vec![candidate(3, &genre)],
        ];
        let lfs = vec![
            vec![LabelingFunction::new("lf_pos", |_: &Candidate| "pos")],
            vec![LabelingFunction::new("lf_jazz", |_: &Candidate| "jazz")],
        ];

        let (records, keys) = encode_document(&cands_list, &lfs).unwrap();

        assert_eq!(
            records,
            vec![
                LabelRecord::new(1, "lf_pos", 1),
                LabelRecord::new(2, "lf_pos", 1),
                LabelRecord::new(3, "lf_jazz", 2),
            ]
        );
        assert_eq!(keys, BTreeSet::from(["lf_jazz".to_string(), "lf_pos".to_string()]));
    }

    #[test]
    fn test_encode_document_fails_whole_document() {
        let spouse = Arc::new(CandidateClass::new("Spouse", ["pos", "neg"]).unwrap());
        let cands_list = vec![vec![candidate(1, &spouse), candidate(2, &spouse)]];
        let lfs = vec![vec![LabelingFunction::new("lf_flaky", |c: &Candidate| {
            if c.id == 2 {
                LfOutput::from("???")
            } else {
                LfOutput::from("pos")
            }
        })]];

        assert!(matches!(
            encode_document(&cands_list, &lfs),
            Err(Error::Encoding { .. })
        ));
    }

    #[test]
    fn test_empty_groups_yield_no_keys() {
        let lfs = vec![vec![LabelingFunction::new("lf_pos", |_: &Candidate| "pos")]];
        let (records, keys) = encode_document(&[Vec::new()], &lfs).unwrap();
        assert!(records.is_empty());
        assert!(keys.is_empty());
    }
}
