//! OpenAI API compatible provider client
//! Covers image generation (`/images/generations`) and chat completion (`/chat/completions`)

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::backend::traits::{CompletionPrompt, ImageGenerator, TextCompleter};
use crate::config::ProviderConfig;
use crate::error::{AppError, Result};

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request (OpenAI compatible)
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

/// Chat choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

/// Assistant message; content may be null on refusals
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Image generation request (OpenAI compatible)
#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    pub response_format: String,
}

/// Image generation response
#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationResponse {
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

/// Client for an OpenAI compatible API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    image_model: String,
    image_size: String,
    text_model: String,
}

impl OpenAiClient {
    /// Create a new client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            image_model: config.image_model.clone(),
            image_size: config.image_size.clone(),
            text_model: config.text_model.clone(),
        })
    }

    /// Get headers with authentication
    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn post_json<B, R>(&self, path: &str, body: &B, operation: &'static str) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamGenerationFailed {
                operation,
                status: None,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamGenerationFailed {
                operation,
                status: Some(status.as_u16()),
                reason: body,
            });
        }

        response.json::<R>().await.map_err(|e| {
            error!(operation, error = %e, "Failed to parse provider response");
            AppError::UpstreamGenerationFailed {
                operation,
                status: Some(status.as_u16()),
                reason: format!("Failed to parse response: {}", e),
            }
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ImageGenerationRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.image_size.clone(),
            response_format: "url".to_string(),
        };

        debug!(model = %request.model, size = %request.size, "Sending image generation request");

        let response: ImageGenerationResponse = self
            .post_json("images/generations", &request, "Image generation")
            .await?;

        let image = response.data.into_iter().next();
        if let Some(revised) = image.as_ref().and_then(|d| d.revised_prompt.as_deref()) {
            debug!(revised_prompt = %revised, "Provider revised the prompt");
        }

        image
            .and_then(|d| d.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::UpstreamGenerationFailed {
                operation: "Image generation",
                status: None,
                reason: "response contained no image URL".to_string(),
            })
    }
}

#[async_trait]
impl TextCompleter for OpenAiClient {
    async fn complete(&self, prompt: CompletionPrompt) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.text_model.clone(),
            messages: vec![
                ChatMessage::new("system", prompt.system),
                ChatMessage::new("user", prompt.user),
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        debug!(model = %request.model, max_tokens = request.max_tokens, "Sending chat completion request");

        let response: ChatCompletionResponse = self
            .post_json("chat/completions", &request, "Text completion")
            .await?;

        debug!(model = %response.model, choices = response.choices.len(), "Chat completion completed");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::UpstreamGenerationFailed {
                operation: "Text completion",
                status: None,
                reason: "response contained no message content".to_string(),
            })
    }
}
