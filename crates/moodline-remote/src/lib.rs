//! Remote tier: hosted inference API client returning per-label confidence vectors.

pub mod client;

pub use client::{InferenceClient, RemoteClassifier, RemoteError};
