//! Value encoder
//!
//! Converts whatever a labeling function returns into the canonical integer code
//! stored in the label tables:
//!
//! | LF output                     | cardinality 2        | cardinality k > 2 |
//! |-------------------------------|----------------------|-------------------|
//! | [`LfOutput::Abstain`]         | 0                    | 0                 |
//! | [`LfOutput::Code`]`(n)`       | n (pre-encoded)      | n (pre-encoded)   |
//! | vocabulary value at index `i` | +1 if i == 0, else -1 | i + 1            |
//!
//! Binary classes keep the `{-1, 0, 1}` range expected by label aggregation
//! models instead of the general `index + 1` rule.

use lfmat_common::{Error, Result};

/// Code stored for an abstaining LF
pub const ABSTAIN: i32 = 0;

/// Raw output of a labeling function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LfOutput {
    /// No opinion
    Abstain,
    /// Already-encoded integer code, stored unchanged
    Code(i32),
    /// A value from the candidate's vocabulary
    Value(String),
}

impl From<i32> for LfOutput {
    fn from(code: i32) -> Self {
        LfOutput::Code(code)
    }
}

impl From<&str> for LfOutput {
    fn from(value: &str) -> Self {
        LfOutput::Value(value.to_string())
    }
}

impl From<String> for LfOutput {
    fn from(value: String) -> Self {
        LfOutput::Value(value)
    }
}

/// Vocabulary value `"true"` / `"false"`, matching [`CandidateClass::binary`]
///
/// [`CandidateClass::binary`]: lfmat_common::CandidateClass::binary
impl From<bool> for LfOutput {
    fn from(value: bool) -> Self {
        LfOutput::Value(value.to_string())
    }
}

impl<T: Into<LfOutput>> From<Option<T>> for LfOutput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(LfOutput::Abstain)
    }
}

/// Encode one LF output for a candidate with the given vocabulary and cardinality
pub fn encode(raw: &LfOutput, vocabulary: &[String], cardinality: usize) -> Result<i32> {
    match raw {
        LfOutput::Code(code) => Ok(*code),
        LfOutput::Abstain => Ok(ABSTAIN),
        LfOutput::Value(value) => {
            let idx = vocabulary
                .iter()
                .position(|v| v == value)
                .ok_or_else(|| Error::Encoding {
                    value: value.clone(),
                    vocabulary: vocabulary.to_vec(),
                })?;

            if cardinality > 2 {
                i32::try_from(idx + 1).map_err(|_| {
                    Error::InvalidInput(format!("vocabulary index {} out of code range", idx))
                })
            } else if idx == 0 {
                Ok(1)
            } else {
                Ok(-1)
            }
        }
    }
}
