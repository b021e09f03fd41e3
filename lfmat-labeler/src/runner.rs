//! Parallel document runner
//!
//! Drives a per-document callback over many documents with a bounded number of
//! concurrent workers (`futures::stream::buffer_unordered`). Each document
//! commits independently; a failed document does not stop the others.

use crate::orchestrator::DocumentOutcome;
use futures::stream::{self, StreamExt};
use lfmat_common::{Document, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Aggregate of one apply/update run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub documents: usize,
    pub failed: usize,
    pub candidates: usize,
    pub records: usize,
    pub keys: BTreeSet<String>,
}

/// Run `task` once per document, at most `workers` at a time
///
/// Every document is attempted. If any failed, the first failure is returned
/// (documents that succeeded stay committed).
pub async fn run_documents<F, Fut>(
    documents: Vec<Document>,
    workers: usize,
    task: F,
) -> Result<RunSummary>
where
    F: Fn(Document) -> Fut,
    Fut: Future<Output = Result<DocumentOutcome>>,
{
    let total = documents.len();
    let start_time = Instant::now();
    let processed = AtomicUsize::new(0);

    tracing::info!(documents = total, workers, "Starting document run");

    let results: Vec<(String, Result<DocumentOutcome>)> = stream::iter(documents)
        .map(|document| {
            let name = document.name.clone();
            let work = task(document);
            let processed = &processed;

            async move {
                let result = work.await;

                let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if current % 10 == 0 || current == total {
                    tracing::info!(
                        progress = format!("{}/{}", current, total),
                        "Run progress update"
                    );
                }

                (name, result)
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut summary = RunSummary::default();
    let mut first_error = None;

    for (name, result) in results {
        match result {
            Ok(outcome) => {
                summary.documents += 1;
                summary.candidates += outcome.candidates;
                summary.records += outcome.records;
                summary.keys.extend(outcome.keys);
            }
            Err(e) => {
                tracing::error!(document = %name, error = %e, "Document labeling failed");
                summary.failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    tracing::info!(
        documents = summary.documents,
        failed = summary.failed,
        records = summary.records,
        keys = summary.keys.len(),
        elapsed_ms = start_time.elapsed().as_millis(),
        "Document run completed"
    );

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}
