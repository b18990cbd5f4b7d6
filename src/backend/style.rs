//! Style inference for prompts that come with a reference image

use std::sync::Arc;
use tracing::debug;

use crate::backend::traits::{CompletionPrompt, TextCompleter};
use crate::error::Result;

const STYLE_SYSTEM: &str =
    "You are an assistant that summarizes the artistic style of an image based on its prompt.";
const STYLE_MAX_TOKENS: u32 = 50;

/// Derives a short style descriptor from a prompt
#[derive(Clone)]
pub struct StyleInference {
    completer: Arc<dyn TextCompleter>,
}

impl StyleInference {
    pub fn new(completer: Arc<dyn TextCompleter>) -> Self {
        Self { completer }
    }

    /// Ask the completion provider for a few style keywords
    pub async fn infer_style(&self, prompt: &str) -> Result<String> {
        let user = format!(
            "Given the following prompt for an image, describe the artistic style or theme \
             in a few keywords or short phrases. Only reply with the keywords.\n\nPrompt:\n{}",
            prompt
        );
        let descriptor = self
            .completer
            .complete(CompletionPrompt::deterministic(STYLE_SYSTEM, user, STYLE_MAX_TOKENS))
            .await?;
        debug!(descriptor = %descriptor, "Inferred style");
        Ok(descriptor)
    }
}

/// `"<prompt>, in the style of <descriptor>"`
pub fn augment_prompt(prompt: &str, descriptor: &str) -> String {
    format!("{}, in the style of {}", prompt, descriptor)
}
