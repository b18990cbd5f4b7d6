//! Provider traits for image generation and text completion

use async_trait::async_trait;

use crate::error::Result;

/// A single-turn instruction for a text-completion provider
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPrompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionPrompt {
    /// Deterministic prompt (temperature zero) with a bounded reply
    pub fn deterministic(system: impl Into<String>, user: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens,
            temperature: 0.0,
        }
    }
}

/// Image generation provider
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image for `prompt` and return the provider's (transient) URL
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Text completion provider
#[async_trait]
pub trait TextCompleter: Send + Sync {
    /// Return the provider's reply, trimmed
    async fn complete(&self, prompt: CompletionPrompt) -> Result<String>;
}
