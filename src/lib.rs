//! Prompt Image Gateway
//!
//! Turns uploaded prompt files into generated images, optionally checks the
//! text rendered in them with OCR, and copies images into a cloud bucket.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod response;
pub mod storage;

pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Duration;

use backend::{ImageFetcher, ImageGenerator, OpenAiClient, StyleInference, TextCompleter};
use config::Settings;
use ocr::{OcrValidator, TesseractExtractor, TextExtractor};
use storage::{GcsObjectStore, ObjectStore};

/// Application state shared across all handlers; read-only once built
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn ObjectStore>,
    pub fetcher: ImageFetcher,
    pub generator: Arc<dyn ImageGenerator>,
    pub style: StyleInference,
    pub ocr: OcrValidator,
}

impl AppState {
    /// Build every gateway from configuration
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let store = Arc::new(GcsObjectStore::new(&settings.storage)?);
        let provider = Arc::new(OpenAiClient::new(&settings.provider)?);
        let extractor = Arc::new(TesseractExtractor::new(&settings.ocr));

        Self::with_gateways(settings, store, provider.clone(), provider, extractor)
    }

    /// Assemble state around caller-supplied gateways
    pub fn with_gateways(
        settings: Settings,
        store: Arc<dyn ObjectStore>,
        generator: Arc<dyn ImageGenerator>,
        completer: Arc<dyn TextCompleter>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self> {
        let fetcher = ImageFetcher::new(Duration::from_millis(settings.server.fetch_timeout_ms))?;

        Ok(Self {
            settings,
            store,
            fetcher,
            generator,
            style: StyleInference::new(completer.clone()),
            ocr: OcrValidator::new(extractor, completer),
        })
    }
}
