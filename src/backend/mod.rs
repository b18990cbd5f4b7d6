//! Backend module - provider clients and external image retrieval

pub mod fetch;
pub mod openai;
pub mod style;
pub mod traits;

pub use fetch::{validate_http_url, ImageFetcher};
pub use openai::OpenAiClient;
pub use style::StyleInference;
pub use traits::{CompletionPrompt, ImageGenerator, TextCompleter};
