//! Two-tier sentiment resolution: remote service first, local engine on any
//! remote failure, one normalized result either way.

use std::sync::Arc;
use std::time::Duration;

use moodline_ai::{LocalClassifier, LocalError};
use moodline_core::{AggregationError, Inference, SentimentResult, SentimentSource};
use moodline_remote::{RemoteClassifier, RemoteError};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Errors callers can see. Which tier failed is deliberately not exposed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("text is empty")]
    EmptyText,
    #[error("sentiment resolution failed")]
    Unavailable,
}

/// Remote-tier failure; always answered by falling back to the local engine.
#[derive(Error, Debug)]
enum Recoverable {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("remote payload had no labels: {0}")]
    Aggregation(#[from] AggregationError),
}

/// Local-tier failure; ends the resolution.
#[derive(Error, Debug)]
enum Terminal {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("local inference exceeded {0:?}")]
    Timeout(Duration),
}

/// Resolves one text to a [`SentimentResult`].
///
/// Both engines are built once at startup and shared by every request. The
/// remote attempt always precedes the local one; they never race.
#[derive(Clone)]
pub struct Resolver {
    remote: Arc<dyn RemoteClassifier>,
    local: Arc<dyn LocalClassifier>,
    local_timeout: Duration,
}

impl Resolver {
    pub fn new(
        remote: Arc<dyn RemoteClassifier>,
        local: Arc<dyn LocalClassifier>,
        local_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            local,
            local_timeout,
        }
    }

    /// Classify `text`, falling back to the local engine if the remote tier
    /// fails in any way.
    ///
    /// Dropping the returned future abandons the resolution at its next await
    /// point, so a disconnected caller never triggers the local fallback.
    #[instrument(skip_all, fields(chars = text.len()))]
    pub async fn resolve(&self, text: &str) -> Result<SentimentResult, ResolveError> {
        if text.trim().is_empty() {
            return Err(ResolveError::EmptyText);
        }

        let cause = match self.try_remote(text).await {
            Ok(result) => return Ok(result),
            Err(cause) => cause,
        };
        warn!(error = %cause, "remote inference failed, falling back to local model");

        match self.try_local(text).await {
            Ok(result) => Ok(result),
            Err(cause) => {
                error!(error = %cause, "local inference failed, giving up");
                Err(ResolveError::Unavailable)
            }
        }
    }

    async fn try_remote(&self, text: &str) -> Result<SentimentResult, Recoverable> {
        let scores = self.remote.classify(text).await?;
        let inference = Inference::Remote(scores);
        let source = inference.source();
        let result = inference.into_result()?;
        log_resolved(source, &result);
        Ok(result)
    }

    async fn try_local(&self, text: &str) -> Result<SentimentResult, Terminal> {
        let best = tokio::time::timeout(self.local_timeout, self.local.classify(text))
            .await
            .map_err(|_| Terminal::Timeout(self.local_timeout))??;
        // The local engine has already picked its class; only the sign is applied.
        let result = SentimentResult::from_dominant(best);
        log_resolved(SentimentSource::Local, &result);
        Ok(result)
    }
}

fn log_resolved(source: SentimentSource, result: &SentimentResult) {
    info!(
        source = source.as_str(),
        label = %result.label,
        score = result.score,
        "resolved sentiment"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLocal, FakeRemote};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use moodline_ai::{LocalEngine, SentimentModel};
    use moodline_core::{InferenceConfig, LabelScore, Polarity};
    use moodline_remote::InferenceClient;

    fn resolver(remote: &Arc<FakeRemote>, local: &Arc<FakeLocal>) -> Resolver {
        Resolver::new(remote.clone(), local.clone(), Duration::from_secs(5))
    }

    fn assert_invariant(result: &SentimentResult) {
        let expected = Polarity::sign_of(&result.label) * result.score;
        assert!((result.numeric_sentiment - expected).abs() < 1e-12, "{result:?}");
    }

    #[tokio::test]
    async fn remote_success_skips_local() {
        let remote = Arc::new(FakeRemote::scores(&[
            ("negative", 0.2),
            ("neutral", 0.3),
            ("positive", 0.5),
        ]));
        let local = Arc::new(FakeLocal::best("NEGATIVE", 0.9));

        let result = resolver(&remote, &local).resolve("I love flying!").await.unwrap();

        assert_eq!(result.label, "positive");
        assert_eq!(result.score, 0.5);
        assert_eq!(result.numeric_sentiment, 0.5);
        assert_invariant(&result);
        assert_eq!(remote.calls(), 1);
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn empty_payload_falls_back_once() {
        let remote = Arc::new(FakeRemote::failing(|| RemoteError::EmptyPayload));
        let local = Arc::new(FakeLocal::best("POSITIVE", 0.8));

        let result = resolver(&remote, &local).resolve("I love flying!").await.unwrap();

        assert_eq!(result.label, "POSITIVE");
        assert_eq!(result.score, 0.8);
        assert_eq!(result.numeric_sentiment, 0.8);
        assert_invariant(&result);
        assert_eq!(remote.calls(), 1);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_once() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = InferenceConfig {
            api_base: format!("http://{addr}"),
            request_timeout: Duration::from_secs(5),
            ..InferenceConfig::default()
        };
        let remote = Arc::new(InferenceClient::new(&config).unwrap());
        assert!(matches!(
            remote.classify("I love flying!").await,
            Err(RemoteError::Transport(_))
        ));

        let local = Arc::new(FakeLocal::best("POSITIVE", 0.8));
        let resolver = Resolver::new(remote, local.clone(), Duration::from_secs(5));
        let result = resolver.resolve("I love flying!").await.unwrap();

        assert_eq!(result.label, "POSITIVE");
        assert_eq!(result.numeric_sentiment, 0.8);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn slow_first_load_is_kept_after_timeout() {
        struct Fixed;
        impl SentimentModel for Fixed {
            fn predict(&mut self, _text: &str) -> anyhow::Result<LabelScore> {
                Ok(LabelScore::new("negative", 0.7))
            }
        }

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let local = Arc::new(LocalEngine::new("test/slow", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(Fixed)
        }));
        let remote = Arc::new(FakeRemote::failing(|| RemoteError::EmptyPayload));
        let resolver = Resolver::new(remote, local.clone(), Duration::from_millis(200));

        assert_eq!(resolver.resolve("late again").await, Err(ResolveError::Unavailable));
        assert!(!local.is_loaded());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(local.is_loaded());

        let result = resolver.resolve("late again").await.unwrap();
        assert_eq!(result.label, "NEGATIVE");
        assert_eq!(result.numeric_sentiment, -0.7);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_status_falls_back() {
        let remote = Arc::new(FakeRemote::failing(|| RemoteError::Status {
            status: 503,
            body: "loading".into(),
        }));
        let local = Arc::new(FakeLocal::best("NEGATIVE", 0.7));

        let result = resolver(&remote, &local).resolve("late again").await.unwrap();

        assert_eq!(result.label, "NEGATIVE");
        assert_eq!(result.numeric_sentiment, -0.7);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn empty_label_set_falls_back() {
        let remote = Arc::new(FakeRemote::scores(&[]));
        let local = Arc::new(FakeLocal::best("NEUTRAL", 0.6));

        let result = resolver(&remote, &local).resolve("ok").await.unwrap();

        assert_eq!(result.label, "NEUTRAL");
        assert_eq!(result.numeric_sentiment, 0.0);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn double_failure_is_uniform() {
        let remote = Arc::new(FakeRemote::failing(|| {
            RemoteError::Malformed("not a list".into())
        }));
        let local = Arc::new(FakeLocal::failing());

        let err = resolver(&remote, &local).resolve("anything").await.unwrap_err();

        assert_eq!(err, ResolveError::Unavailable);
        assert_eq!(remote.calls(), 1);
        assert_eq!(local.calls(), 1);
    }

    #[tokio::test]
    async fn slow_local_engine_times_out() {
        let remote = Arc::new(FakeRemote::failing(|| RemoteError::EmptyPayload));
        let local = Arc::new(FakeLocal::best("POSITIVE", 0.9).with_delay(Duration::from_secs(2)));
        let resolver = Resolver::new(remote.clone(), local.clone(), Duration::from_millis(50));

        let err = resolver.resolve("anything").await.unwrap_err();
        assert_eq!(err, ResolveError::Unavailable);
    }

    #[tokio::test]
    async fn empty_text_touches_no_engine() {
        let remote = Arc::new(FakeRemote::scores(&[("positive", 1.0)]));
        let local = Arc::new(FakeLocal::best("POSITIVE", 1.0));

        let err = resolver(&remote, &local).resolve("   ").await.unwrap_err();

        assert_eq!(err, ResolveError::EmptyText);
        assert_eq!(remote.calls(), 0);
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn remote_tie_keeps_first_label() {
        let remote = Arc::new(FakeRemote::scores(&[("negative", 0.5), ("positive", 0.5)]));
        let local = Arc::new(FakeLocal::best("POSITIVE", 1.0));

        let result = resolver(&remote, &local).resolve("meh").await.unwrap();
        assert_eq!(result.label, "negative");
        assert_eq!(result.numeric_sentiment, -0.5);
    }

    #[tokio::test]
    async fn invariant_holds_for_both_sources() {
        let cases = [
            (Some(vec![("positive", 0.1), ("negative", 0.9)]), ("POSITIVE", 0.3)),
            (None, ("NEGATIVE", 0.65)),
            (None, ("NEUTRAL", 0.99)),
            (Some(vec![("neutral", 0.4), ("positive", 0.6)]), ("NEGATIVE", 0.1)),
        ];
        for (remote_scores, (local_label, local_score)) in cases {
            let remote = Arc::new(match remote_scores {
                Some(pairs) => FakeRemote::scores(&pairs),
                None => FakeRemote::failing(|| RemoteError::EmptyPayload),
            });
            let local = Arc::new(FakeLocal::best(local_label, local_score));
            let result = resolver(&remote, &local).resolve("text").await.unwrap();
            assert_invariant(&result);
        }
    }
}
