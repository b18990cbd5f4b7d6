//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pipeline::GenerationResult;
use crate::storage::ImageRecord;

pub const OCR_SUCCESS_MESSAGE: &str = "Upload and OCR validation successful";
pub const OCR_MISMATCH_MESSAGE: &str =
    "Text in image doesn't match the expected text extracted from prompt";
pub const NO_OCR_MESSAGE: &str = "Upload successful (no OCR validation)";

/// Stored images, newest first
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ImageListResponse {
    pub images: Vec<ImageRecord>,
}

/// Form body for `/api/fetch-and-upload`
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct FetchAndUploadForm {
    /// http(s) URL of the image to copy into storage
    pub image_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct FetchAndUploadResponse {
    /// URL of the stored copy
    pub gcs_url: String,
}

/// Multipart body for `/api/upload` (documentation only; parsed field by field)
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UploadForm {
    /// One or more UTF-8 text files, concatenated in order
    #[schema(value_type = Vec<String>)]
    pub prompt: Vec<Vec<u8>>,

    /// Optional reference image; its presence enables style inference
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,

    /// "true" to validate rendered text with OCR
    #[serde(default)]
    pub ocr: Option<String>,
}

/// Result of `/api/upload`; also the body of an OCR mismatch (400)
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,

    /// Provider URL of the generated image (transient)
    pub image_url: String,

    /// OCR output; empty when OCR was not requested
    pub extracted_text: String,

    /// Text the prompt called for; present only when OCR ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_text: Option<String>,

    /// Stored copy, when generated images are persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcs_url: Option<String>,
}

impl From<GenerationResult> for UploadResponse {
    fn from(result: GenerationResult) -> Self {
        let message = match result.matched {
            Some(true) => OCR_SUCCESS_MESSAGE,
            Some(false) => OCR_MISMATCH_MESSAGE,
            None => NO_OCR_MESSAGE,
        };

        Self {
            message: message.to_string(),
            image_url: result.image_url,
            extracted_text: result.extracted_text.unwrap_or_default(),
            expected_text: result.expected_text,
            gcs_url: result.stored_url,
        }
    }
}

/// Error body
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable description; never includes upstream internals
    pub error: String,
    /// Error kind, e.g. `invalid_input` or `storage_failed`
    pub kind: String,
}

/// Health check response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
