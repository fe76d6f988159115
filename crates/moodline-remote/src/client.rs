//! HTTP client for the hosted text-classification endpoint.

use async_trait::async_trait;
use moodline_core::{InferenceConfig, LabelScore};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP transport failed: {0}")]
    Transport(reqwest::Error),
    #[error("request timed out: {0}")]
    Timeout(reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("empty response payload")]
    EmptyPayload,
    #[error("malformed response payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else {
            Self::Transport(err)
        }
    }
}

/// A remote engine that scores every sentiment class for one input.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, RemoteError>;
}

/// Client for a hosted inference endpoint (`POST <base>/models/<model>`).
///
/// One attempt per call; deciding what to do on failure is left to the caller.
pub struct InferenceClient {
    client: reqwest::Client,
    endpoint: String,
    credential: Option<String>,
    wait_for_model: bool,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

/// Maximum number of body bytes kept in a [`RemoteError::Status`].
const MAX_ERROR_BODY: usize = 512;

impl InferenceClient {
    /// Build a client for the endpoint described by `config`.
    ///
    /// `config.request_timeout` bounds the whole call, including any time the
    /// service spends warming the model up.
    pub fn new(config: &InferenceConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
            credential: config.credential.clone(),
            wait_for_model: config.wait_for_model,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteClassifier for InferenceClient {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, RemoteError> {
        let body = ClassifyRequest {
            inputs: text,
            options: RequestOptions {
                wait_for_model: self.wait_for_model,
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.credential {
            request = request.bearer_auth(token);
        }

        debug!(endpoint = %self.endpoint, chars = text.len(), "requesting remote classification");
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            truncate_on_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = resp.bytes().await?;
        let scores = parse_payload(&payload)?;
        info!(labels = scores.len(), "remote classification complete");
        Ok(scores)
    }
}

/// Parse a `[[{"label": .., "score": ..}, ..]]` body into the scores for the
/// first (only) input.
///
/// An empty inner list is returned as-is; choosing a dominant label is the
/// aggregator's job.
pub fn parse_payload(payload: &[u8]) -> Result<Vec<LabelScore>, RemoteError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(RemoteError::EmptyPayload);
    }

    let batches: Vec<Vec<LabelScore>> = serde_json::from_slice(payload)
        .map_err(|e| RemoteError::Malformed(e.to_string()))?;

    let scores = batches
        .into_iter()
        .next()
        .ok_or(RemoteError::EmptyPayload)?;

    if let Some(bad) = scores
        .iter()
        .find(|s| !s.score.is_finite() || !(0.0..=1.0).contains(&s.score))
    {
        return Err(RemoteError::Malformed(format!(
            "score {} for label {:?} outside [0, 1]",
            bad.score, bad.label
        )));
    }

    Ok(scores)
}

fn truncate_on_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
