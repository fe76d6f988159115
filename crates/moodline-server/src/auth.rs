//! HS256 access tokens.
//!
//! Tokens are standard compact JWTs (`header.claims.signature`, base64url
//! without padding) carrying `sub`, `iat`, `nbf`, `exp`, `jti`, `type` and
//! `fresh` claims.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::hmac;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access tokens live for an hour after issuance.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization Header")]
    MissingHeader,
    #[error("Bad Authorization header. Expected 'Authorization: Bearer <JWT>'")]
    BadScheme,
    #[error("Not enough segments")]
    Malformed,
    #[error("Invalid header string")]
    BadHeader,
    #[error("The specified alg value is not allowed")]
    BadAlgorithm,
    #[error("Signature verification failed")]
    BadSignature,
    #[error("Invalid payload string")]
    BadClaims,
    #[error("Token has expired")]
    Expired,
    #[error("The token is not yet valid (nbf)")]
    NotYetValid,
    #[error("Only access tokens are allowed")]
    WrongType,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub fresh: bool,
}

/// Issues and verifies access tokens with one shared secret.
pub struct TokenAuthority {
    key: hmac::Key,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, ACCESS_TOKEN_TTL)
    }

    pub fn with_ttl(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            ttl,
        }
    }

    /// Issue an access token for `subject`, valid from now.
    pub fn issue(&self, subject: &str) -> serde_json::Result<String> {
        self.issue_at(subject, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(&self, subject: &str, now: i64) -> serde_json::Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            nbf: now,
            exp: now + self.ttl.as_secs() as i64,
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: "access".to_string(),
            fresh: false,
        };
        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };

        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{claims}");
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref())))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(AuthError::Malformed)?;
        let (header, claims) = signing_input
            .split_once('.')
            .filter(|(_, claims)| !claims.contains('.'))
            .ok_or(AuthError::Malformed)?;

        let header: Header = decode_segment(header).ok_or(AuthError::BadHeader)?;
        if header.alg != "HS256" {
            return Err(AuthError::BadAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::BadSignature)?;
        hmac::verify(&self.key, signing_input.as_bytes(), &signature)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = decode_segment(claims).ok_or(AuthError::BadClaims)?;
        if now >= claims.exp {
            return Err(AuthError::Expired);
        }
        if now < claims.nbf {
            return Err(AuthError::NotYetValid);
        }
        if claims.token_type != "access" {
            return Err(AuthError::WrongType);
        }
        Ok(claims)
    }

    /// Pull the bearer token out of an `Authorization` header value and verify it.
    pub fn verify_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::BadScheme)?;
        self.verify(token)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}
