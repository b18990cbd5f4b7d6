//! Access tokens for the storage JSON API

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:2.0:jwt-bearer";
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a service-account JSON key that token exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to read storage credentials: {}",
                e
            )))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to parse storage credentials: {}",
                e
            )))
        })
    }
}

/// Where bearer tokens come from
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Emulators accept unauthenticated requests
    Anonymous,
    /// Signed JWT exchanged at the key's token endpoint
    ServiceAccount(ServiceAccountKey),
    /// Instance metadata server (the ambient identity on cloud hosts)
    MetadataServer,
}

impl TokenSource {
    /// Pick the source the configuration implies
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.emulator().is_some() {
            return Ok(TokenSource::Anonymous);
        }
        match config.credentials_file() {
            Some(path) => Ok(TokenSource::ServiceAccount(ServiceAccountKey::from_file(path)?)),
            None => Ok(TokenSource::MetadataServer),
        }
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Supplies bearer tokens for storage requests, reusing a token until shortly before it expires
pub struct StorageAuth {
    client: Client,
    source: TokenSource,
    cached: Mutex<Option<CachedToken>>,
}

impl StorageAuth {
    pub fn new(client: Client, source: TokenSource) -> Self {
        Self {
            client,
            source,
            cached: Mutex::new(None),
        }
    }

    /// `None` when requests should go out unauthenticated
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        if matches!(self.source, TokenSource::Anonymous) {
            return Ok(None);
        }

        let cached = self.cached.lock().clone();
        if let Some(token) = cached {
            if Instant::now() < token.refresh_at {
                return Ok(Some(token.value));
            }
        }

        let response = match &self.source {
            TokenSource::ServiceAccount(key) => self.exchange_jwt(key).await?,
            TokenSource::MetadataServer => self.metadata_token().await?,
            TokenSource::Anonymous => return Ok(None),
        };

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        *self.cached.lock() = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        debug!(expires_in = response.expires_in, "Obtained storage access token");

        Ok(Some(response.access_token))
    }

    async fn exchange_jwt(&self, key: &ServiceAccountKey) -> Result<TokenResponse> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| auth_failed(format!("system clock error: {}", e)))?
            .as_secs();

        let claims = JwtClaims {
            iss: &key.client_email,
            scope: STORAGE_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| auth_failed(format!("invalid service account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| auth_failed(format!("JWT signing failed: {}", e)))?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| auth_failed(e.to_string()))?;

        read_token(response).await
    }

    async fn metadata_token(&self) -> Result<TokenResponse> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", STORAGE_SCOPE)])
            .send()
            .await
            .map_err(|e| auth_failed(format!("metadata server unreachable: {}", e)))?;

        read_token(response).await
    }
}

async fn read_token(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(auth_failed(format!("token endpoint returned {}: {}", status, body)));
    }
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| auth_failed(format!("invalid token response: {}", e)))
}

fn auth_failed(reason: String) -> AppError {
    AppError::StorageFailed {
        operation: "authentication",
        reason,
    }
}
