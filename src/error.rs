//! Application error types and their HTTP rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::api::models::{ErrorResponse, UploadResponse, OCR_MISMATCH_MESSAGE};

/// Errors raised while serving a request.
///
/// Upstream variants keep the underlying cause in `reason` for logging; their
/// `Display` output is what callers see and never includes it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Caller supplied something unusable (bad URL scheme, empty prompt, malformed form).
    #[error("{0}")]
    InvalidInput(String),

    /// Retrieving bytes from an external URL failed.
    #[error("Failed to fetch image from {url}")]
    UpstreamFetchFailed { url: String, reason: String },

    /// The image or text provider failed or returned something unusable.
    #[error("{operation} failed at the provider{}", status_suffix(.status))]
    UpstreamGenerationFailed {
        operation: &'static str,
        status: Option<u16>,
        reason: String,
    },

    /// Object store operation failed.
    #[error("Storage {operation} failed")]
    StorageFailed {
        operation: &'static str,
        reason: String,
    },

    /// The OCR engine could not process the image.
    #[error("OCR failed")]
    OcrFailed { reason: String },

    /// Rendered text does not match what the prompt asked for.
    #[error("{}", OCR_MISMATCH_MESSAGE)]
    OcrMismatch {
        image_url: String,
        extracted_text: String,
        expected_text: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::OcrMismatch { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::UpstreamFetchFailed { .. } => "upstream_fetch_failed",
            AppError::UpstreamGenerationFailed { .. } => "upstream_generation_failed",
            AppError::StorageFailed { .. } => "storage_failed",
            AppError::OcrFailed { .. } => "ocr_failed",
            AppError::OcrMismatch { .. } => "ocr_mismatch",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    fn log(&self) {
        match self {
            AppError::UpstreamFetchFailed { url, reason } => {
                warn!(url = %url, reason = %reason, "Image fetch failed");
            }
            AppError::UpstreamGenerationFailed {
                operation,
                status,
                reason,
            } => {
                error!(operation, status = ?status, reason = %reason, "Provider call failed");
            }
            AppError::StorageFailed { operation, reason } => {
                error!(operation, reason = %reason, "Storage call failed");
            }
            AppError::OcrFailed { reason } => {
                error!(reason = %reason, "OCR failed");
            }
            AppError::Config(e) => error!(error = %e, "Configuration error"),
            AppError::Internal(e) => error!(error = %e, "Internal error"),
            AppError::InvalidInput(_) | AppError::OcrMismatch { .. } => {}
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();

        match self {
            AppError::OcrMismatch {
                image_url,
                extracted_text,
                expected_text,
            } => {
                let body = UploadResponse {
                    message: OCR_MISMATCH_MESSAGE.to_string(),
                    image_url,
                    extracted_text,
                    expected_text: Some(expected_text),
                    gcs_url: None,
                };
                (status, Json(body)).into_response()
            }
            other => {
                let body = ErrorResponse {
                    error: other.to_string(),
                    kind: other.kind().to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
