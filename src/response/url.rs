//! URL derivation for stored objects

use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use url::Url;

/// Derives caller-facing URLs for objects in the configured bucket.
///
/// With an emulator configured the URL points at the emulator's media
/// download endpoint; otherwise it is the canonical public object URL.
#[derive(Debug, Clone)]
pub struct ObjectUrlBuilder {
    bucket: String,
    base: Url,
    emulated: bool,
}

impl ObjectUrlBuilder {
    /// Create a URL builder from storage configuration
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let (raw, emulated) = match config.emulator() {
            Some(emulator) => (emulator, true),
            None => (config.public_base_url.as_str(), false),
        };

        let base = Url::parse(raw).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Invalid storage URL '{}': {}",
                raw, e
            )))
        })?;

        Ok(Self {
            bucket: config.bucket.clone(),
            base,
            emulated,
        })
    }

    /// Whether URLs point at a local emulator
    pub fn is_emulated(&self) -> bool {
        self.emulated
    }

    /// Generate the URL for an object name
    pub fn object_url(&self, name: &str) -> String {
        let mut url = self.base.clone();
        {
            // Base URLs are http(s), which can always carry path segments.
            let Ok(mut segments) = url.path_segments_mut() else {
                return format!("{}/{}/{}", self.base.as_str().trim_end_matches('/'), self.bucket, name);
            };
            segments.pop_if_empty();
            if self.emulated {
                segments.extend(["storage", "v1", "b", self.bucket.as_str(), "o"]);
            } else {
                segments.push(&self.bucket);
            }
            segments.extend(name.split('/'));
        }

        if self.emulated {
            url.set_query(Some("alt=media"));
        }

        url.into()
    }
}
