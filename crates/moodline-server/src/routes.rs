//! HTTP routes.
//!
//! - `GET /` - welcome string
//! - `POST /login` - exchange the configured credentials for an access token
//! - `POST /sentiment` - classify `{"text": ..}`, bearer token required

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthError, Claims, TokenAuthority};
use crate::resolver::{ResolveError, Resolver};
use moodline_core::SentimentResult;

pub const WELCOME: &str = "Welcome to the Sentiment Analysis Service!";

/// The single account allowed to log in.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl Default for LoginCredentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub resolver: Resolver,
    pub tokens: TokenAuthority,
    pub credentials: LoginCredentials,
}

/// Build the service router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", post(login))
        .route("/sentiment", post(sentiment))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error responses. Bodies follow the shapes existing clients expect:
/// `{"error": ..}` for request problems, `{"msg": ..}` for auth problems.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    MissingJson,
    Unauthorized(String),
    NotFound,
    Internal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))),
            Self::MissingJson => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "msg": "Missing JSON in request" })),
            ),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, Json(json!({ "msg": msg }))),
            Self::NotFound => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            ),
        }
        .into_response()
    }
}

/// Verified bearer-token identity.
pub struct Authenticated(pub Claims);

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        match state.tokens.verify_header(header) {
            Ok(claims) => Ok(Self(claims)),
            Err(err) => {
                info!(reason = %err, "rejected request token");
                Err(err.into())
            }
        }
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Serialize)]
struct SentimentResponse {
    sentiment: SentimentResult,
}

async fn home() -> &'static str {
    WELCOME
}

async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<LoginResponse>, ApiError> {
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::MissingJson)?;

    let expected = &state.credentials;
    if request.username.as_deref() != Some(expected.username.as_str())
        || request.password.as_deref() != Some(expected.password.as_str())
    {
        warn!(username = ?request.username, "failed login");
        return Err(ApiError::Unauthorized("Bad username or password".into()));
    }

    let access_token = state.tokens.issue(&expected.username).map_err(|err| {
        tracing::error!(error = %err, "failed to encode access token");
        ApiError::Internal
    })?;
    info!(username = %expected.username, "issued access token");
    Ok(Json(LoginResponse { access_token }))
}

async fn sentiment(
    Authenticated(claims): Authenticated,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SentimentResponse>, ApiError> {
    info!(user = %claims.sub, "sentiment request");

    if !is_json(&headers) {
        return Err(ApiError::BadRequest("Invalid input, JSON expected"));
    }
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid input, JSON expected"))?;

    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or(ApiError::BadRequest("Text is required for sentiment analysis"))?;

    match state.resolver.resolve(text).await {
        Ok(sentiment) => Ok(Json(SentimentResponse { sentiment })),
        Err(ResolveError::EmptyText) => {
            Err(ApiError::BadRequest("Text is required for sentiment analysis"))
        }
        Err(ResolveError::Unavailable) => Err(ApiError::Internal),
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// `application/json` or any `application/*+json` media type.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}
