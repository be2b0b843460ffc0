use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::api::TokenResponse;

/// Tokens closer than this to expiry are not reused from the cache.
const CACHE_EXPIRY_MARGIN_SECS: i64 = 60;

/// Bearer token plus the instant it stops being valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expires_at - ChronoDuration::seconds(CACHE_EXPIRY_MARGIN_SECS) > now
    }
}

/// Client-credentials parameters for the token endpoint.
pub struct Credentials<'a> {
    pub auth_url: &'a str,
    pub app_key: &'a str,
    pub app_secret: &'a str,
    pub ttl_secs: u64,
}

/// Exchange client credentials for a bearer token.
pub async fn fetch_access_token(
    http: &Client,
    creds: &Credentials<'_>,
) -> Result<AccessToken, AuthError> {
    let ttl = creds.ttl_secs.to_string();
    let form = [("grant_type", "client_credentials"), ("expires_in", ttl.as_str())];

    let response = http
        .post(creds.auth_url)
        .basic_auth(creds.app_key, Some(creds.app_secret))
        .header(ACCEPT, "application/json")
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Status(status));
    }

    let token: TokenResponse = response.json().await?;
    if token.access_token.is_empty() {
        return Err(AuthError::EmptyToken);
    }

    let lifetime = token.expires_in.unwrap_or(creds.ttl_secs);
    Ok(AccessToken {
        access_token: token.access_token,
        expires_at: Utc::now() + ChronoDuration::seconds(lifetime as i64),
    })
}

/// Read a cached token, returning `None` if absent, unreadable, or stale.
pub fn load_cached_token(path: &Path, now: DateTime<Utc>) -> Option<AccessToken> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Token cache unreadable, refetching");
            return None;
        }
    };

    match serde_json::from_slice::<AccessToken>(&raw) {
        Ok(token) if token.is_usable_at(now) => Some(token),
        Ok(_) => {
            tracing::info!(path = %path.display(), "Cached token expired");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Token cache corrupt, refetching");
            None
        }
    }
}

pub fn store_cached_token(path: &Path, token: &AccessToken) -> Result<(), AuthError> {
    let json = serde_json::to_vec_pretty(token)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Resolve the bearer token for this process: cache first, then the token endpoint.
pub async fn obtain_access_token(
    http: &Client,
    creds: &Credentials<'_>,
    cache_path: Option<&Path>,
) -> Result<AccessToken, AuthError> {
    if let Some(path) = cache_path {
        if let Some(token) = load_cached_token(path, Utc::now()) {
            tracing::info!(expires_at = %token.expires_at, "Using cached bearer token");
            return Ok(token);
        }
    }

    tracing::info!("Requesting bearer token via client credentials");
    let token = fetch_access_token(http, creds).await?;

    if let Some(path) = cache_path {
        if let Err(e) = store_cached_token(path, &token) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write token cache");
        }
    }

    Ok(token)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token endpoint returned status {0}")]
    Status(StatusCode),

    #[error("Token endpoint returned an empty access token")]
    EmptyToken,

    #[error("Token cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Token cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
