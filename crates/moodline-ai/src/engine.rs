//! Lazily loaded local sentiment engine.
//!
//! The underlying model is built on first use, kept for the life of the
//! process, and invoked on the blocking pool behind a mutex owned by the
//! adapter.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use moodline_core::LabelScore;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LocalError {
    #[error("failed to load local model {model}: {source}")]
    Load {
        model: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("local inference failed: {0}")]
    Inference(#[source] anyhow::Error),
    #[error("local inference task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A local engine that returns its single best class for one input.
#[async_trait]
pub trait LocalClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<LabelScore, LocalError>;
}

/// A loaded model that scores one text synchronously.
///
/// Implementations need not be safe for concurrent use; [`LocalEngine`]
/// serializes calls.
pub trait SentimentModel: Send + 'static {
    fn predict(&mut self, text: &str) -> anyhow::Result<LabelScore>;
}

type Loader<M> = Arc<dyn Fn() -> anyhow::Result<M> + Send + Sync>;

/// Memoizing adapter around a [`SentimentModel`].
///
/// A failed load is not cached, so the next request tries again. A load that
/// outlives its caller keeps running and still fills the cell.
pub struct LocalEngine<M: SentimentModel> {
    model_id: String,
    loader: Loader<M>,
    model: Arc<OnceCell<Arc<Mutex<M>>>>,
}

impl<M: SentimentModel> LocalEngine<M> {
    /// Create an engine for `model_id`. `loader` runs at most once per
    /// successful load, on the blocking pool.
    pub fn new<F>(model_id: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<M> + Send + Sync + 'static,
    {
        Self {
            model_id: model_id.into(),
            loader: Arc::new(loader),
            model: Arc::new(OnceCell::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Load the model now instead of on the first request.
    pub async fn warm_up(&self) -> Result<(), LocalError> {
        self.handle().await.map(|_| ())
    }

    async fn handle(&self) -> Result<Arc<Mutex<M>>, LocalError> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let cell = Arc::clone(&self.model);
        let loader = Arc::clone(&self.loader);
        let model_id = self.model_id.clone();
        // Detached: dropping the caller's future must not abandon the load.
        tokio::spawn(async move {
            let model = cell
                .get_or_try_init(|| async move {
                    let model = tokio::task::spawn_blocking(move || loader())
                        .await?
                        .map_err(|source| LocalError::Load {
                            model: model_id.clone(),
                            source,
                        })?;
                    info!(model = %model_id, "loaded local sentiment model");
                    Ok::<_, LocalError>(Arc::new(Mutex::new(model)))
                })
                .await?;
            Ok::<_, LocalError>(Arc::clone(model))
        })
        .await?
    }
}

#[async_trait]
impl<M: SentimentModel> LocalClassifier for LocalEngine<M> {
    async fn classify(&self, text: &str) -> Result<LabelScore, LocalError> {
        let model = self.handle().await?;
        let text = text.to_owned();

        let best = tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| anyhow::anyhow!("local model lock poisoned"))?;
            guard.predict(&text)
        })
        .await?
        .map_err(LocalError::Inference)?;

        debug!(model = %self.model_id, label = %best.label, score = best.score, "local classification complete");
        Ok(LabelScore::new(best.label.to_uppercase(), best.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedModel {
        label: &'static str,
        score: f64,
        calls: Arc<AtomicUsize>,
    }

    impl SentimentModel for FixedModel {
        fn predict(&mut self, text: &str) -> anyhow::Result<LabelScore> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::ensure!(!text.is_empty(), "empty text");
            Ok(LabelScore::new(self.label, self.score))
        }
    }

    fn counting_engine(
        label: &'static str,
        score: f64,
    ) -> (LocalEngine<FixedModel>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let (l, c) = (Arc::clone(&loads), Arc::clone(&calls));
        let engine = LocalEngine::new("test/model", move || {
            l.fetch_add(1, Ordering::SeqCst);
            Ok(FixedModel {
                label,
                score,
                calls: Arc::clone(&c),
            })
        });
        (engine, loads, calls)
    }

    #[tokio::test]
    async fn loads_lazily_and_once() {
        let (engine, loads, calls) = counting_engine("positive", 0.97);
        assert!(!engine.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            engine.classify("I love flying!").await.unwrap();
        }

        assert!(engine.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn labels_are_uppercased() {
        let (engine, _, _) = counting_engine("positive", 0.97);
        let best = engine.classify("great").await.unwrap();
        assert_eq!(best, LabelScore::new("POSITIVE", 0.97));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_model() {
        let (engine, loads, calls) = counting_engine("neutral", 0.6);
        let engine = Arc::new(engine);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.classify(&format!("text {i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn load_failure_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = Arc::clone(&attempts);
        let engine = LocalEngine::new("test/flaky", move || {
            if a.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("weights missing");
            }
            Ok(FixedModel {
                label: "negative",
                score: 0.8,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        });

        let err = engine.classify("bad").await.unwrap_err();
        match err {
            LocalError::Load { model, .. } => assert_eq!(model, "test/flaky"),
            other => panic!("expected load error, got {other:?}"),
        }
        assert!(!engine.is_loaded());

        let best = engine.classify("bad").await.unwrap();
        assert_eq!(best.label, "NEGATIVE");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inference_failure_maps_to_local_error() {
        let (engine, _, _) = counting_engine("positive", 0.9);
        let err = engine.classify("").await.unwrap_err();
        assert!(matches!(err, LocalError::Inference(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn abandoned_load_still_completes_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let l = Arc::clone(&loads);
        let engine = LocalEngine::new("test/slow", move || {
            l.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(FixedModel {
                label: "positive",
                score: 0.9,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        });

        for _ in 0..3 {
            let waited = tokio::time::timeout(Duration::from_millis(50), engine.classify("hi")).await;
            assert!(waited.is_err());
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(engine.is_loaded());

        let best = engine.classify("hi").await.unwrap();
        assert_eq!(best, LabelScore::new("POSITIVE", 0.9));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn warm_up_loads_model() {
        let (engine, loads, calls) = counting_engine("positive", 0.9);
        engine.warm_up().await.unwrap();
        assert!(engine.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
