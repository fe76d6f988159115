//! Inference configuration shared by the remote client and the local engine.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Model used for both tiers when nothing else is configured.
pub const DEFAULT_MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";

/// Hosted inference API root; the model id is appended as `/models/<id>`.
pub const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co";

/// Immutable for the process lifetime; read once when the resolver is built.
#[derive(Clone)]
pub struct InferenceConfig {
    /// Remote inference API root, without trailing slash.
    pub api_base: String,
    /// Remote model identifier.
    pub model: String,
    /// Bearer credential for the remote service.
    pub credential: Option<String>,
    /// Local model identifier, resolved under `models_dir`.
    pub fallback_model: String,
    /// Directory holding exported local models.
    pub models_dir: PathBuf,
    /// Ask the remote service to hold the request while the model warms up.
    pub wait_for_model: bool,
    /// Upper bound for one remote call, warm-up included.
    pub request_timeout: Duration,
    /// Upper bound for one local inference, model load included.
    pub local_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            credential: None,
            fallback_model: DEFAULT_MODEL.to_string(),
            models_dir: PathBuf::from("models"),
            wait_for_model: true,
            request_timeout: Duration::from_secs(60),
            local_timeout: Duration::from_secs(120),
        }
    }
}

impl InferenceConfig {
    /// Build a config, substituting [`DEFAULT_MODEL`] for unset model identifiers.
    pub fn with_models(model: Option<String>, fallback_model: Option<String>) -> Self {
        Self {
            model: non_empty(model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            fallback_model: non_empty(fallback_model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..Self::default()
        }
    }

    /// Full URL of the remote model endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}",
            self.api_base.trim_end_matches('/'),
            self.model.trim_matches('/')
        )
    }

    /// Directory of the local fallback model.
    pub fn fallback_model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.fallback_model)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// The credential never reaches logs.
impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("fallback_model", &self.fallback_model)
            .field("models_dir", &self.models_dir)
            .field("wait_for_model", &self.wait_for_model)
            .field("request_timeout", &self.request_timeout)
            .field("local_timeout", &self.local_timeout)
            .finish()
    }
}
