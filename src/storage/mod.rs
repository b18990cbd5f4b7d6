//! Object store gateway - uploads, listing and generated-object naming

pub mod auth;
pub mod gcs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;

pub use gcs::GcsObjectStore;

/// A stored image as shown to callers. The URL is derived on every listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct ImageRecord {
    /// Full object name, e.g. `generated/2024-05-01-10-00-00-ab12_proxied-image.png`
    pub name: String,
    pub url: String,
}

/// Blob storage used for generated and proxied images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` to `name` and return the URL callers should use to read it
    async fn upload(&self, bytes: Vec<u8>, name: &str, content_type: &str) -> Result<String>;

    /// List objects under `prefix`, newest first
    async fn list(&self, prefix: &str) -> Result<Vec<ImageRecord>>;
}

/// Build a fresh object name: `<prefix>/<YYYY-MM-DD-HH-MM-SS>-<4 hex>_<suffix>.png`
pub fn generated_object_name(prefix: &str, suffix: &str, now: DateTime<Utc>) -> String {
    let random: [u8; 2] = rand::random();
    format!(
        "{}/{}-{}_{}.png",
        prefix.trim_end_matches('/'),
        now.format("%Y-%m-%d-%H-%M-%S"),
        hex::encode(random),
        suffix
    )
}

/// Sort key for listings: the part of the base name before the first `_`.
/// Names without an underscore yield the empty key.
pub fn timestamp_key(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.split_once('_').map(|(ts, _)| ts).unwrap_or("")
}

/// Keep real objects under `prefix`, dropping directory markers
pub fn is_listable(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix) && !name.ends_with('/')
}

/// Newest first by timestamp key; ties keep listing order
pub fn sort_newest_first(records: &mut [ImageRecord]) {
    records.sort_by(|a, b| timestamp_key(&b.name).cmp(timestamp_key(&a.name)));
}
