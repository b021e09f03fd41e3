//! Per-candidate-class applier

use crate::encoder::encode;
use crate::lf::LabelingFunction;
use crate::store::LabelRecord;
use lfmat_common::{Candidate, Result};

/// Run every LF on one candidate and encode the results
///
/// Fails on the first LF whose output cannot be encoded.
pub fn apply_one(candidate: &Candidate, lfs: &[LabelingFunction]) -> Result<Vec<LabelRecord>> {
    lfs.iter()
        .map(|lf| {
            let value = encode(&lf.call(candidate), candidate.values(), candidate.cardinality())?;
            Ok(LabelRecord::new(candidate.id, lf.name(), value))
        })
        .collect()
}
