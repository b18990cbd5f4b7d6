//! OCR via the `tesseract` command-line engine

use async_trait::async_trait;
use image::ImageFormat;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{AppError, Result};
use crate::ocr::TextExtractor;

/// Runs `tesseract <image> stdout -l <language>` on a normalized PNG copy of the input
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    command: String,
    language: String,
}

impl TesseractExtractor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            language: config.language.clone(),
        }
    }
}

/// Decode whatever format arrived and re-encode it as PNG in a temp file
fn write_normalized_png(image: &[u8]) -> Result<NamedTempFile> {
    let decoded = image::load_from_memory(image).map_err(|e| AppError::OcrFailed {
        reason: format!("cannot decode image: {}", e),
    })?;

    let file = tempfile::Builder::new()
        .prefix("ocr-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| AppError::OcrFailed {
            reason: format!("cannot create temp file: {}", e),
        })?;

    decoded
        .save_with_format(file.path(), ImageFormat::Png)
        .map_err(|e| AppError::OcrFailed {
            reason: format!("cannot write temp image: {}", e),
        })?;

    Ok(file)
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image: &[u8]) -> Result<String> {
        let bytes = image.to_vec();
        let file = tokio::task::spawn_blocking(move || write_normalized_png(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("OCR preprocessing task failed: {}", e)))??;

        let output = Command::new(&self.command)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| AppError::OcrFailed {
                reason: format!("cannot run {}: {}", self.command, e),
            })?;

        if !output.status.success() {
            return Err(AppError::OcrFailed {
                reason: format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(chars = text.len(), "Tesseract finished");
        Ok(text)
    }
}
