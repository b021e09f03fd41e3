//! Labeling functions and key references

use crate::encoder::LfOutput;
use lfmat_common::Candidate;
use std::fmt;
use std::sync::Arc;

type LfFn = dyn Fn(&Candidate) -> LfOutput + Send + Sync;

/// A named labeling function
///
/// The name is the LF's identity: it becomes the label key, and `update`
/// replaces active LFs by name. Cloning is cheap (the function is shared).
#[derive(Clone)]
pub struct LabelingFunction {
    name: String,
    func: Arc<LfFn>,
}

impl LabelingFunction {
    pub fn new<F, O>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Candidate) -> O + Send + Sync + 'static,
        O: Into<LfOutput>,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |candidate: &Candidate| func(candidate).into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the function on one candidate
    pub fn call(&self, candidate: &Candidate) -> LfOutput {
        (self.func)(candidate)
    }
}

impl fmt::Debug for LabelingFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelingFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Reference to a label key: a raw name, or the LF that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRef {
    Name(String),
    Lf(String),
}

impl KeyRef {
    pub fn name(&self) -> &str {
        match self {
            KeyRef::Name(name) | KeyRef::Lf(name) => name,
        }
    }
}

impl From<&str> for KeyRef {
    fn from(name: &str) -> Self {
        KeyRef::Name(name.to_string())
    }
}

impl From<String> for KeyRef {
    fn from(name: String) -> Self {
        KeyRef::Name(name)
    }
}

impl From<&LabelingFunction> for KeyRef {
    fn from(lf: &LabelingFunction) -> Self {
        KeyRef::Lf(lf.name.clone())
    }
}

impl From<LabelingFunction> for KeyRef {
    fn from(lf: LabelingFunction) -> Self {
        KeyRef::Lf(lf.name)
    }
}
