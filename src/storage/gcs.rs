//! Cloud Storage JSON API client (also speaks to local emulators)

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::response::ObjectUrlBuilder;
use crate::storage::auth::{StorageAuth, TokenSource};
use crate::storage::{is_listable, sort_newest_first, ImageRecord, ObjectStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

/// Object store backed by a Cloud Storage bucket
pub struct GcsObjectStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    urls: ObjectUrlBuilder,
    auth: StorageAuth,
}

impl GcsObjectStore {
    /// Create a store from configuration, resolving credentials up front
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = Url::parse(config.api_endpoint()).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Invalid storage endpoint '{}': {}",
                config.api_endpoint(),
                e
            )))
        })?;

        let source = TokenSource::from_config(config)?;
        info!(
            bucket = %config.bucket,
            endpoint = %endpoint,
            emulated = config.emulator().is_some(),
            "Configured object store"
        );

        Ok(Self {
            auth: StorageAuth::new(client.clone(), source),
            urls: ObjectUrlBuilder::new(config)?,
            client,
            endpoint,
            bucket: config.bucket.clone(),
        })
    }

    fn api_url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn upload_url(&self, name: &str) -> Url {
        let mut url = self.api_url(&["upload", "storage", "v1", "b", &self.bucket, "o"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uploadType", "media").append_pair("name", name);
            if !self.urls.is_emulated() {
                query.append_pair("predefinedAcl", "publicRead");
            }
        }
        url
    }

    fn list_url(&self, prefix: &str, page_token: Option<&str>) -> Url {
        let mut url = self.api_url(&["storage", "v1", "b", &self.bucket, "o"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        url
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.auth.bearer_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn upload(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> Result<String> {
        let size = bytes.len();
        let request = self
            .client
            .post(self.upload_url(name))
            .header(CONTENT_TYPE, content_type)
            .body(bytes);

        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_failed(format!("storage returned {}: {}", status, body)));
        }

        let url = self.urls.object_url(name);
        debug!(name = %name, size, url = %url, "Uploaded object");
        Ok(url)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ImageRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = self.client.get(self.list_url(prefix, page_token.as_deref()));
            let response = self
                .authorized(request)
                .await?
                .send()
                .await
                .map_err(|e| list_failed(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(list_failed(format!("storage returned {}: {}", status, body)));
            }

            let page: ObjectList = response
                .json()
                .await
                .map_err(|e| list_failed(format!("invalid listing: {}", e)))?;

            records.extend(
                page.items
                    .into_iter()
                    .filter(|item| is_listable(&item.name, prefix))
                    .map(|item| ImageRecord {
                        url: self.urls.object_url(&item.name),
                        name: item.name,
                    }),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        sort_newest_first(&mut records);
        debug!(prefix = %prefix, count = records.len(), "Listed objects");
        Ok(records)
    }
}

fn upload_failed(reason: String) -> AppError {
    AppError::StorageFailed {
        operation: "upload",
        reason,
    }
}

fn list_failed(reason: String) -> AppError {
    AppError::StorageFailed {
        operation: "list",
        reason,
    }
}
