//! OCR validation: compare text rendered in an image with what the prompt asked for

pub mod tesseract;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::backend::traits::{CompletionPrompt, TextCompleter};
use crate::error::Result;

pub use tesseract::TesseractExtractor;

const EXPECTED_SYSTEM: &str =
    "You are an assistant that extracts the expected text content from an image generation prompt.";
const EXPECTED_MAX_TOKENS: u32 = 100;

/// OCR engine
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Raw text recognized in the encoded image
    async fn extract(&self, image: &[u8]) -> Result<String>;
}

/// Outcome of validating one image against its prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOutcome {
    pub extracted_text: String,
    pub expected_text: String,
    pub matched: bool,
}

/// Extracts text from images and checks it against an LLM-derived expectation
#[derive(Clone)]
pub struct OcrValidator {
    extractor: Arc<dyn TextExtractor>,
    completer: Arc<dyn TextCompleter>,
}

impl OcrValidator {
    pub fn new(extractor: Arc<dyn TextExtractor>, completer: Arc<dyn TextCompleter>) -> Self {
        Self {
            extractor,
            completer,
        }
    }

    /// Text the completion provider says should appear in an image for `prompt`
    pub async fn expected_text(&self, prompt: &str) -> Result<String> {
        let user = format!(
            "Given the following prompt, what is the expected text that should appear in the \
             generated image? Reply only with the exact expected text.\n\nPrompt:\n{}",
            prompt
        );
        self.completer
            .complete(CompletionPrompt::deterministic(EXPECTED_SYSTEM, user, EXPECTED_MAX_TOKENS))
            .await
    }

    /// OCR the image, trimmed of surrounding whitespace
    pub async fn extract_text(&self, image: &[u8]) -> Result<String> {
        Ok(self.extractor.extract(image).await?.trim().to_string())
    }

    /// Extract, ask for the expectation, compare
    pub async fn validate(&self, image: &[u8], prompt: &str) -> Result<OcrOutcome> {
        let extracted_text = self.extract_text(image).await?;
        let expected_text = self.expected_text(prompt).await?;
        let matched = matches(&extracted_text, &expected_text);

        debug!(
            extracted = %extracted_text,
            expected = %expected_text,
            matched,
            "OCR validation finished"
        );

        Ok(OcrOutcome {
            extracted_text,
            expected_text,
            matched,
        })
    }
}

/// Case-insensitive containment in either direction.
///
/// Tolerates OCR picking up extra or partial text. Short expectations can
/// match by accident and badly garbled output will not match at all.
pub fn matches(extracted: &str, expected: &str) -> bool {
    let extracted = extracted.trim().to_lowercase();
    let expected = expected.trim().to_lowercase();
    extracted.contains(&expected) || expected.contains(&extracted)
}
