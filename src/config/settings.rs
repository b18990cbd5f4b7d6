//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use url::Url;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body (multipart uploads included)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Timeout for fetching external images, in milliseconds
    #[serde(default = "default_timeout")]
    pub fetch_timeout_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_timeout() -> u64 {
    60000
}

/// Image generation and text completion provider (OpenAI API compatible)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_provider_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    /// Path to a service-account JSON key; ignored unless the file exists
    #[serde(default)]
    pub credentials_path: Option<String>,
    /// Local emulator endpoint; switches URL derivation and disables auth
    #[serde(default)]
    pub emulator_host: Option<String>,
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_generated_prefix")]
    pub generated_prefix: String,
    /// Upload generated images in addition to returning the provider URL
    #[serde(default)]
    pub persist_generated: bool,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_public_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_api_base_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_generated_prefix() -> String {
    "generated".to_string()
}

/// OCR engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    #[serde(default = "default_tesseract_cmd")]
    pub tesseract_cmd: String,
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

fn default_tesseract_cmd() -> String {
    "tesseract".to_string()
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl StorageConfig {
    /// Emulator endpoint without a trailing slash, if one is configured
    pub fn emulator(&self) -> Option<&str> {
        self.emulator_host
            .as_deref()
            .map(|h| h.trim().trim_end_matches('/'))
            .filter(|h| !h.is_empty())
    }

    /// The credentials file, only when the configured path exists on disk
    pub fn credentials_file(&self) -> Option<&Path> {
        let path = self
            .credentials_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())?;
        let path = Path::new(path);
        if path.is_file() {
            Some(path)
        } else {
            None
        }
    }

    /// Base URL for JSON API calls: the emulator when configured, otherwise the real service
    pub fn api_endpoint(&self) -> &str {
        self.emulator()
            .unwrap_or_else(|| self.api_base_url.trim_end_matches('/'))
    }
}

impl Settings {
    /// Load settings from `config/gateway.yaml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/gateway.yaml")
    }

    /// Load settings from a specific configuration file, then apply environment overrides
    ///
    /// Precedence, lowest first: built-in defaults, the file (if it exists),
    /// `IMAGE_GATEWAY__SECTION__KEY` variables, then the well-known
    /// `OPENAI_API_KEY` / `GCS_*` variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_vars(path, std::env::vars().collect())
    }

    /// Same as [`Settings::load_from_path`], reading overrides from `vars`
    /// instead of the process environment
    pub fn load_with_vars<P: AsRef<Path>>(path: P, vars: Map<String, String>) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if path.exists() {
            builder = builder.add_source(File::from(path).format(format));
        }

        builder = builder
            .add_source(
                Environment::with_prefix("IMAGE_GATEWAY")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            )
            .set_override_option("provider.api_key", non_empty_var(&vars, "OPENAI_API_KEY"))?
            .set_override_option("storage.bucket", non_empty_var(&vars, "GCS_BUCKET_NAME"))?
            .set_override_option(
                "storage.credentials_path",
                non_empty_var(&vars, "GCS_CREDENTIALS_JSON"),
            )?
            .set_override_option("storage.emulator_host", non_empty_var(&vars, "GCS_EMULATOR_HOST"))?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Report whether a storage credentials file will be used
    pub fn log_credentials_choice(&self) {
        match (self.storage.credentials_file(), &self.storage.credentials_path) {
            (Some(path), _) => info!(path = %path.display(), "Using storage credentials file"),
            (None, Some(path)) if !path.trim().is_empty() => {
                warn!(path = %path, "Storage credentials file not found, ignoring it")
            }
            _ => info!("No storage credentials file configured"),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(invalid("Storage bucket name cannot be empty"));
        }
        if self.provider.api_key.trim().is_empty() {
            return Err(invalid("Provider API key cannot be empty"));
        }

        for (name, value) in [
            ("provider.base_url", Some(self.provider.base_url.as_str())),
            ("storage.public_base_url", Some(self.storage.public_base_url.as_str())),
            ("storage.api_base_url", Some(self.storage.api_base_url.as_str())),
            ("storage.emulator_host", self.storage.emulator()),
        ] {
            if let Some(value) = value {
                Url::parse(value)
                    .map_err(|e| invalid(&format!("{} is not a valid URL: {}", name, e)))?;
            }
        }

        if self.storage.generated_prefix.trim_matches('/').is_empty() {
            return Err(invalid("Generated image prefix cannot be empty"));
        }

        Ok(())
    }
}

fn non_empty_var(vars: &Map<String, String>, key: &str) -> Option<String> {
    vars.get(key).filter(|v| !v.trim().is_empty()).cloned()
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            storage: StorageConfig::default(),
            ocr: OcrConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            fetch_timeout_ms: default_timeout(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_base_url(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            text_model: default_text_model(),
            timeout_ms: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            credentials_path: None,
            emulator_host: None,
            public_base_url: default_public_base_url(),
            api_base_url: default_api_base_url(),
            generated_prefix: default_generated_prefix(),
            persist_generated: false,
            timeout_ms: default_timeout(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: default_tesseract_cmd(),
            language: default_ocr_language(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
