//! In-memory stand-ins for the two inference tiers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moodline_ai::{LocalClassifier, LocalError};
use moodline_core::LabelScore;
use moodline_remote::{RemoteClassifier, RemoteError};

type ErrorFactory = Box<dyn Fn() -> RemoteError + Send + Sync>;

pub struct FakeRemote {
    outcome: Result<Vec<LabelScore>, ErrorFactory>,
    calls: AtomicUsize,
}

impl FakeRemote {
    pub fn scores(pairs: &[(&str, f64)]) -> Self {
        Self {
            outcome: Ok(pairs
                .iter()
                .map(|&(label, score)| LabelScore::new(label, score))
                .collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: impl Fn() -> RemoteError + Send + Sync + 'static) -> Self {
        Self {
            outcome: Err(Box::new(err)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteClassifier for FakeRemote {
    async fn classify(&self, _text: &str) -> Result<Vec<LabelScore>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(scores) => Ok(scores.clone()),
            Err(make) => Err(make()),
        }
    }
}

pub struct FakeLocal {
    best: Option<LabelScore>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeLocal {
    pub fn best(label: &str, score: f64) -> Self {
        Self {
            best: Some(LabelScore::new(label, score)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            best: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalClassifier for FakeLocal {
    async fn classify(&self, _text: &str) -> Result<LabelScore, LocalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.best.clone().ok_or_else(|| LocalError::Load {
            model: "fake/model".into(),
            source: anyhow::anyhow!("weights unavailable"),
        })
    }
}
