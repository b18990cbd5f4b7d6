//! Configuration module

pub mod settings;

pub use settings::{
    LoggingConfig, OcrConfig, ProviderConfig, ServerConfig, Settings, StorageConfig,
};
