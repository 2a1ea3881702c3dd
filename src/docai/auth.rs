//! OAuth2 access tokens for Document AI.
//!
//! A service-account key is exchanged for a bearer token through the JWT
//! bearer grant; tokens are cached until shortly before they expire. A
//! pre-issued token can be used instead (e.g. from `gcloud auth print-access-token`).

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::error::DocumentAiError;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Seconds before expiry at which a cached token is considered stale.
const EXPIRY_MARGIN_SECS: u64 = 60;

#[derive(Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccount),
    AccessToken(String),
}

impl Credentials {
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, DocumentAiError> {
        match self {
            Credentials::ServiceAccount(sa) => sa.access_token(client).await,
            Credentials::AccessToken(token) => Ok(token.clone()),
        }
    }
}

#[derive(Clone)]
pub struct ServiceAccount {
    key: ServiceAccountKey,
    token_cache: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: u64,
}

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ServiceAccount {
    /// Read and parse a service-account JSON key file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read service account key: {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("Invalid service account key: {:?}", path))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).context("Failed to parse service account JSON")?;
        Ok(Self {
            key,
            token_cache: Arc::new(Mutex::new(None)),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn token_uri(&self) -> &str {
        self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }

    fn cached(&self, now: u64) -> Option<String> {
        let cache = self.token_cache.lock().ok()?;
        cache
            .as_ref()
            .filter(|c| now < c.expires_at.saturating_sub(EXPIRY_MARGIN_SECS))
            .map(|c| c.access_token.clone())
    }

    /// Mint the signed assertion exchanged at the token endpoint.
    fn assertion(&self, now: u64) -> Result<String, DocumentAiError> {
        let claims = serde_json::json!({
            "iss": self.key.client_email,
            "scope": CLOUD_PLATFORM_SCOPE,
            "aud": self.token_uri(),
            "iat": now,
            "exp": now + 3600,
        });

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| {
                DocumentAiError::AuthenticationFailed(format!(
                    "invalid RSA private key in service account JSON: {}",
                    e
                ))
            })?;

        jsonwebtoken::encode(&header, &claims, &encoding_key).map_err(|e| {
            DocumentAiError::AuthenticationFailed(format!("failed to encode JWT: {}", e))
        })
    }

    /// Get a valid access token, refreshing if expired.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, DocumentAiError> {
        let now = now_secs();
        if let Some(token) = self.cached(now) {
            return Ok(token);
        }

        let jwt = self.assertion(now)?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: u64,
        }

        let resp = client
            .post(self.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| {
                DocumentAiError::ServiceUnavailable(format!("token exchange request failed: {}", e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(if status.is_client_error() {
                DocumentAiError::AuthenticationFailed(format!(
                    "token exchange rejected ({}): {}",
                    status, body
                ))
            } else {
                DocumentAiError::ServiceUnavailable(format!(
                    "token endpoint error ({}): {}",
                    status, body
                ))
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            DocumentAiError::AuthenticationFailed(format!("unreadable token response: {}", e))
        })?;

        debug!(
            "Minted access token for {} (expires in {}s)",
            self.key.client_email, token.expires_in
        );

        if let Ok(mut cache) = self.token_cache.lock() {
            *cache = Some(CachedToken {
                access_token: token.access_token.clone(),
                expires_at: now + token.expires_in,
            });
        }

        Ok(token.access_token)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
