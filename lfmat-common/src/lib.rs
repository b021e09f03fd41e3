//! # lfmat Common Library
//!
//! Shared code for the label-matrix tooling including:
//! - Error type shared by every crate
//! - Configuration loading and database path resolution
//! - Database schema initialization
//! - Document, candidate and candidate-class models and queries

pub mod config;
pub mod db;
pub mod error;

pub use config::LabelerConfig;
pub use db::models::{Candidate, CandidateClass, Document, SplitFilter};
pub use error::{Error, Result};
