//! Command-line and environment configuration.
//!
//! Every option can be set through the environment (a `.env` file in the
//! working directory is loaded first).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use moodline_ai::{LocalEngine, OnnxSentimentModel};
use moodline_core::{DEFAULT_API_BASE, InferenceConfig};
use moodline_remote::InferenceClient;
use moodline_server::{LoginCredentials, Resolver};

#[derive(Args, Debug)]
pub struct InferenceArgs {
    /// Bearer token for the hosted inference API.
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Remote model identifier (defaults to the fallback model's default).
    #[arg(long, env = "HF_MODEL")]
    pub model: Option<String>,

    /// Local fallback model identifier, resolved under `--models-dir`.
    #[arg(long, env = "FALLBACK_MODEL")]
    pub fallback_model: Option<String>,

    /// Hosted inference API root.
    #[arg(long, env = "HF_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Directory containing exported ONNX models.
    #[arg(long, env = "MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Seconds allowed for one remote call, model warm-up included.
    #[arg(long, env = "REMOTE_TIMEOUT_SECS", default_value_t = 60)]
    pub remote_timeout_secs: u64,

    /// Seconds allowed for one local inference, model load included.
    #[arg(long, env = "LOCAL_TIMEOUT_SECS", default_value_t = 120)]
    pub local_timeout_secs: u64,

    /// Fail fast instead of waiting for a cold remote model.
    #[arg(long)]
    pub no_wait_for_model: bool,
}

impl InferenceArgs {
    pub fn to_config(&self) -> InferenceConfig {
        let mut config =
            InferenceConfig::with_models(self.model.clone(), self.fallback_model.clone());
        config.api_base = self.api_base.clone();
        config.credential = self.hf_token.clone().filter(|t| !t.trim().is_empty());
        config.models_dir = self.models_dir.clone();
        config.wait_for_model = !self.no_wait_for_model;
        config.request_timeout = Duration::from_secs(self.remote_timeout_secs);
        config.local_timeout = Duration::from_secs(self.local_timeout_secs);
        config
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub inference: InferenceArgs,

    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Secret used to sign access tokens.
    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "LOGIN_USERNAME", default_value = "admin")]
    pub login_username: String,

    #[arg(long, env = "LOGIN_PASSWORD", default_value = "secret", hide_env_values = true)]
    pub login_password: String,

    /// Load the local model at startup instead of on first fallback.
    #[arg(long)]
    pub warm_up: bool,
}

impl ServeArgs {
    pub fn credentials(&self) -> LoginCredentials {
        LoginCredentials {
            username: self.login_username.clone(),
            password: self.login_password.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// CSV dataset with a text column and a ground-truth label column.
    #[arg(long)]
    pub data: PathBuf,

    /// Only replay the first N rows.
    #[arg(long, default_value_t = 3000)]
    pub limit: usize,

    /// Base URL of a running service.
    #[arg(long, env = "MOODLINE_URL", default_value = "http://127.0.0.1:5000")]
    pub url: String,

    #[arg(long, env = "LOGIN_USERNAME", default_value = "admin")]
    pub username: String,

    #[arg(long, env = "LOGIN_PASSWORD", default_value = "secret", hide_env_values = true)]
    pub password: String,

    #[arg(long, default_value = "text")]
    pub text_column: String,

    #[arg(long, default_value = "airline_sentiment")]
    pub label_column: String,

    /// Requests kept in flight at once.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

/// Build the resolver and keep a handle on the local engine for warm-up.
pub fn build_resolver(
    config: &InferenceConfig,
) -> anyhow::Result<(Resolver, Arc<LocalEngine<OnnxSentimentModel>>)> {
    let remote = Arc::new(InferenceClient::new(config)?);
    let local = Arc::new(moodline_ai::onnx_engine(config));
    tracing::info!(
        endpoint = %remote.endpoint(),
        fallback_model = %local.model_id(),
        "inference tiers configured"
    );
    let resolver = Resolver::new(remote, local.clone(), config.local_timeout);
    Ok((resolver, local))
}
