//! Database models
//!
//! Documents and candidates are produced by the upstream extraction stage. The
//! labeler only reads them; it never mutates a candidate.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A source document grouping candidates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub name: String,
}

/// A declared candidate class: its name plus the ordered value vocabulary that
/// every candidate of the class may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateClass {
    name: String,
    values: Vec<String>,
}

impl CandidateClass {
    /// Declare a candidate class. The vocabulary needs at least two distinct values.
    pub fn new<N, I, V>(name: N, values: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();

        if name.trim().is_empty() {
            return Err(Error::Config("Candidate class name must not be empty".to_string()));
        }
        if values.len() < 2 {
            return Err(Error::Config(format!(
                "Candidate class {} needs at least 2 values, got {:?}",
                name, values
            )));
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(Error::Config(format!(
                    "Candidate class {} lists value {:?} twice",
                    name, value
                )));
            }
        }

        Ok(Self { name, values })
    }

    /// Binary class with the conventional `["true", "false"]` vocabulary
    pub fn binary(name: impl Into<String>) -> Result<Self> {
        Self::new(name, ["true", "false"])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Size of the value vocabulary (2 for binary classes)
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }
}

/// An extracted candidate entity
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: i64,
    pub document_id: i64,
    pub split: i32,
    /// Mention texts recorded by the extraction stage
    pub mentions: Vec<String>,
    pub class: Arc<CandidateClass>,
}

impl Candidate {
    pub fn values(&self) -> &[String] {
        self.class.values()
    }

    pub fn cardinality(&self) -> usize {
        self.class.cardinality()
    }
}

/// Which candidates of a document an operation touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitFilter {
    /// Only candidates tagged with this split (0 = train by convention)
    Split(i32),
    /// Candidates of every split
    All,
}

impl SplitFilter {
    /// The concrete split, or `None` for [`SplitFilter::All`]
    pub fn split(&self) -> Option<i32> {
        match self {
            SplitFilter::Split(split) => Some(*split),
            SplitFilter::All => None,
        }
    }
}

impl std::fmt::Display for SplitFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitFilter::Split(split) => write!(f, "{}", split),
            SplitFilter::All => write!(f, "all"),
        }
    }
}
