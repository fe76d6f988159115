//! Shared sentiment types exchanged between the inference engines and callers.

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregationError, aggregate};

/// One candidate class and its confidence, as produced by an inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Normalized classification returned to every caller.
///
/// `label` keeps the case of the engine that produced it (the remote service
/// emits lowercase class names, the local engine uppercase).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: String,
    pub score: f64,
    /// `sign(label) * score`, in `[-1, 1]`.
    pub numeric_sentiment: f64,
}

impl SentimentResult {
    /// Build a result from a dominant label, applying the polarity sign.
    pub fn from_dominant(dominant: LabelScore) -> Self {
        let numeric_sentiment = Polarity::sign_of(&dominant.label) * dominant.score;
        Self {
            label: dominant.label,
            score: dominant.score,
            numeric_sentiment,
        }
    }
}

/// Sentiment polarity of a class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Negative,
    Neutral,
    Positive,
}

impl Polarity {
    /// Parse a class label, ignoring case. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("negative") {
            Some(Self::Negative)
        } else if label.eq_ignore_ascii_case("neutral") {
            Some(Self::Neutral)
        } else if label.eq_ignore_ascii_case("positive") {
            Some(Self::Positive)
        } else {
            None
        }
    }

    pub fn sign(&self) -> f64 {
        match self {
            Self::Negative => -1.0,
            Self::Neutral => 0.0,
            Self::Positive => 1.0,
        }
    }

    /// Sign for an arbitrary label; labels outside the three classes count as neutral.
    pub fn sign_of(label: &str) -> f64 {
        match Self::from_label(label) {
            Some(polarity) => polarity.sign(),
            None => {
                tracing::debug!(label, "unrecognised sentiment label, treating as neutral");
                0.0
            }
        }
    }

}

/// Which engine produced a result. Used for logging only, never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentSource {
    Remote,
    Local,
}

impl SentimentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

/// Raw output of one inference engine, before normalization.
///
/// The remote service returns a full confidence vector; the local engine has
/// already picked its best class.
#[derive(Debug, Clone, PartialEq)]
pub enum Inference {
    Remote(Vec<LabelScore>),
    Local(LabelScore),
}

impl Inference {
    pub fn source(&self) -> SentimentSource {
        match self {
            Self::Remote(_) => SentimentSource::Remote,
            Self::Local(_) => SentimentSource::Local,
        }
    }

    /// Collapse either shape into a [`SentimentResult`].
    pub fn into_result(self) -> Result<SentimentResult, AggregationError> {
        match self {
            Self::Remote(scores) => aggregate(&scores),
            Self::Local(best) => Ok(SentimentResult::from_dominant(best)),
        }
    }
}
