//! Dominant-label selection over a remote confidence vector.

use thiserror::Error;

use crate::sentiment::{LabelScore, SentimentResult};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no label scores to aggregate")]
    Empty,
}

/// Pick the highest-scoring label and normalize it into a [`SentimentResult`].
///
/// Ties keep the first entry seen, so a fixed input ordering always gives the
/// same answer.
pub fn aggregate(scores: &[LabelScore]) -> Result<SentimentResult, AggregationError> {
    let mut best: Option<&LabelScore> = None;
    for candidate in scores {
        match best {
            Some(current) if candidate.score <= current.score => {}
            _ => best = Some(candidate),
        }
    }

    best.cloned()
        .map(SentimentResult::from_dominant)
        .ok_or(AggregationError::Empty)
}
