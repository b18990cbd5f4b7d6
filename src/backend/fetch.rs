//! Retrieval of image bytes from external URLs

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{AppError, Result};

/// Parse `raw` and require an http or https scheme
pub fn validate_http_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("Image URL is required.".to_string()));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| AppError::InvalidInput(format!("Invalid image URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(AppError::InvalidInput(format!(
            "Invalid image URL: unsupported scheme '{}'",
            scheme
        ))),
    }
}

/// Downloads images from user-supplied or provider-returned URLs
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// GET the URL; anything but `200 OK` is a fetch failure
    pub async fn fetch(&self, raw_url: &str) -> Result<Vec<u8>> {
        let url = validate_http_url(raw_url)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_failed(&url, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(fetch_failed(&url, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(&url, format!("reading body: {}", e)))?;

        debug!(url = %url, size = bytes.len(), "Fetched image");
        Ok(bytes.to_vec())
    }
}

fn fetch_failed(url: &Url, reason: String) -> AppError {
    AppError::UpstreamFetchFailed {
        url: url.to_string(),
        reason,
    }
}
