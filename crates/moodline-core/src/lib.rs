pub mod aggregate;
pub mod config;
pub mod sentiment;

pub use aggregate::{AggregationError, aggregate};
pub use config::{DEFAULT_API_BASE, DEFAULT_MODEL, InferenceConfig};
pub use sentiment::{Inference, LabelScore, Polarity, SentimentResult, SentimentSource};
