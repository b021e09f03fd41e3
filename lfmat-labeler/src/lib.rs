//! lfmat-labeler: labeling-function application and label matrices
//!
//! Applies user-supplied labeling functions (LFs) to extracted candidates and
//! keeps a persistent, incrementally updatable label store:
//! - [`encoder`]: LF output → canonical integer code
//! - [`keys`]: registry of LF names forming the matrix column space
//! - [`store`]: batched `(candidate, key, code)` upserts
//! - [`applier`] / [`orchestrator`] / [`runner`]: per-candidate, per-document and
//!   parallel application
//! - [`matrix`]: sparse candidates × keys matrices
//! - [`labeler`]: the [`Labeler`] LF-set manager tying it together

pub mod applier;
pub mod encoder;
pub mod keys;
pub mod labeler;
pub mod lf;
pub mod matrix;
pub mod orchestrator;
pub mod runner;
pub mod store;
pub mod utils;

pub use encoder::{encode, LfOutput, ABSTAIN};
pub use labeler::{load_gold_labels, ApplyOptions, Labeler};
pub use lf::{KeyRef, LabelingFunction};
pub use matrix::{LabelMatrix, SparseMatrix};
pub use runner::RunSummary;
pub use store::{AnnotationKind, LabelRecord};
