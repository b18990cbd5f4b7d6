//! Request pipelines: list, proxy and generate
//!
//! Every stage runs to completion before the next starts, and nothing is
//! carried over between requests.

use chrono::Utc;
use tracing::{debug, info};

use crate::backend::style::augment_prompt;
use crate::error::{AppError, Result};
use crate::storage::{generated_object_name, ImageRecord};
use crate::AppState;

/// Content type used for every object this service writes
pub const PNG_CONTENT_TYPE: &str = "image/png";
/// Object-name suffix for images copied from a caller-supplied URL
pub const PROXIED_SUFFIX: &str = "proxied-image";
/// Object-name suffix for persisted generation results
pub const GENERATED_SUFFIX: &str = "generated-image";

/// One generation request, built from a single incoming upload
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub reference_image: Option<Vec<u8>>,
    pub ocr_requested: bool,
}

impl GenerationRequest {
    /// Join the prompt fragments and reject an empty result
    pub fn from_fragments<I, S>(
        fragments: I,
        reference_image: Option<Vec<u8>>,
        ocr_requested: bool,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prompt = combine_prompt(fragments);
        if prompt.is_empty() {
            return Err(AppError::InvalidInput("Prompt is empty".to_string()));
        }
        Ok(Self {
            prompt,
            reference_image,
            ocr_requested,
        })
    }
}

/// Each fragment followed by a newline, then trimmed as a whole
pub fn combine_prompt<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut combined = String::new();
    for fragment in fragments {
        combined.push_str(fragment.as_ref());
        combined.push('\n');
    }
    combined.trim().to_string()
}

/// What a generation produced; text fields are set only when OCR ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub image_url: String,
    pub extracted_text: Option<String>,
    pub expected_text: Option<String>,
    pub matched: Option<bool>,
    /// Object-store URL when generated images are persisted
    pub stored_url: Option<String>,
}

/// List generated images, newest first
pub async fn list_generated(state: &AppState) -> Result<Vec<ImageRecord>> {
    state.store.list(&state.settings.storage.generated_prefix).await
}

/// Copy an external image into the store and return its URL
pub async fn proxy_image(state: &AppState, image_url: &str) -> Result<String> {
    let bytes = state.fetcher.fetch(image_url).await?;
    let name = generated_object_name(
        &state.settings.storage.generated_prefix,
        PROXIED_SUFFIX,
        Utc::now(),
    );
    let url = state.store.upload(bytes, &name, PNG_CONTENT_TYPE).await?;
    info!(source = %image_url, name = %name, "Proxied image into storage");
    Ok(url)
}

/// Generate an image for the request, optionally checking its rendered text
pub async fn run_generation(state: &AppState, request: GenerationRequest) -> Result<GenerationResult> {
    let prompt = match &request.reference_image {
        Some(reference) => {
            debug!(reference_bytes = reference.len(), "Reference image supplied, inferring style");
            let descriptor = state.style.infer_style(&request.prompt).await?;
            augment_prompt(&request.prompt, &descriptor)
        }
        None => request.prompt.clone(),
    };

    let image_url = state.generator.generate(&prompt).await?;
    // A malformed provider URL is the provider's fault, not the caller's
    let image = state.fetcher.fetch(&image_url).await.map_err(|e| match e {
        AppError::InvalidInput(reason) => AppError::UpstreamFetchFailed {
            url: image_url.clone(),
            reason,
        },
        other => other,
    })?;

    let mut result = GenerationResult {
        image_url,
        extracted_text: None,
        expected_text: None,
        matched: None,
        stored_url: None,
    };

    if request.ocr_requested {
        let outcome = state.ocr.validate(&image, &request.prompt).await?;
        result.matched = Some(outcome.matched);
        result.extracted_text = Some(outcome.extracted_text);
        result.expected_text = Some(outcome.expected_text);
    }

    if state.settings.storage.persist_generated && result.matched != Some(false) {
        let name = generated_object_name(
            &state.settings.storage.generated_prefix,
            GENERATED_SUFFIX,
            Utc::now(),
        );
        result.stored_url = Some(state.store.upload(image, &name, PNG_CONTENT_TYPE).await?);
        info!(name = %name, "Persisted generated image");
    }

    Ok(result)
}
