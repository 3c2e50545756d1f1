//! Request-scoped upstream credential
//!
//! The caller's bearer token doubles as the upstream session token. A
//! [`CredentialContext`] is built once per inbound request and handed down by
//! reference to every call that can reach the upstream. Nothing in the
//! gateway stores one: services and executors are shared across requests and
//! must stay free of per-request state.

use crate::core::error::{CredentialError, GatewayResult};
use axum::http::{HeaderMap, header};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::OnceLock;

/// Upstream credential for exactly one logical request
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialContext {
    token: String,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TimingClaims {
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

impl CredentialContext {
    /// Build a context from a raw token.
    ///
    /// JWT-shaped tokens have their `iat`/`exp` claims read without signature
    /// verification. Opaque tokens are accepted with no known expiry.
    pub fn new(token: impl Into<String>) -> Result<Self, CredentialError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(CredentialError::Missing);
        }

        if !looks_like_jwt(&token) {
            return Ok(Self {
                token,
                issued_at: None,
                expires_at: None,
            });
        }

        let claims = decode_timing_claims(&token)?;
        Ok(Self {
            issued_at: claims.iat.and_then(timestamp),
            expires_at: claims.exp.and_then(timestamp),
            token,
        })
    }

    /// Parse an `Authorization` header value (`Bearer <token>`)
    pub fn from_bearer(value: &str) -> Result<Self, CredentialError> {
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or(CredentialError::Missing)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(CredentialError::Missing);
        }
        Self::new(token)
    }

    /// Extract the credential from request headers
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, CredentialError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(CredentialError::Missing)?
            .to_str()
            .map_err(|_| CredentialError::Malformed {
                message: "authorization header is not valid ASCII".to_string(),
            })?;
        Self::from_bearer(value)
    }

    /// Override the expiry, for tokens whose lifetime is known out of band
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Fail fast when the credential cannot be sent upstream at `now`
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> Result<(), CredentialError> {
        if self.token.is_empty() {
            return Err(CredentialError::Missing);
        }
        match self.expires_at {
            Some(expired_at) if expired_at <= now => Err(CredentialError::Expired { expired_at }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialContext")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Run `f` with a credential built from `token`.
///
/// The context lives for the duration of `f` only; callees borrow it.
pub async fn with_credential<F, Fut, T>(token: impl Into<String>, f: F) -> GatewayResult<T>
where
    F: FnOnce(CredentialContext) -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let credential = CredentialContext::new(token)?;
    f(credential).await
}

fn looks_like_jwt(token: &str) -> bool {
    static JWT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = JWT_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$").expect("jwt regex")
    });
    regex.is_match(token)
}

fn decode_timing_claims(token: &str) -> Result<TimingClaims, CredentialError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| CredentialError::Malformed {
        message: e.to_string(),
    })?;

    // Signature belongs to the upstream; only the timing claims are read here.
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TimingClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| CredentialError::Malformed {
            message: e.to_string(),
        })
}

fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}
