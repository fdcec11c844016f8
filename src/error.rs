use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Tessera
#[derive(Error, Debug)]
pub enum TesseraError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Requested strategy is not defined
    #[error("Unknown strategy '{name}' (available: {})", available.join(", "))]
    UnknownStrategy { name: String, available: Vec<String> },

    /// Source or model key that does not name a known component
    #[error("Unknown {kind} '{key}'")]
    UnknownComponent { kind: &'static str, key: String },

    /// Request rejected before any work was scheduled
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    /// Corpus snapshot errors
    #[error("Corpus error: {0}")]
    Corpus(#[from] crate::corpus::CorpusError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TesseraError {
    /// Errors caused by the caller's configuration or strategy selection.
    ///
    /// These are fatal for the request and are never retried internally.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigValidation { .. }
                | Self::ConfigNotFound { .. }
                | Self::InvalidConfigValue { .. }
                | Self::UnknownStrategy { .. }
                | Self::UnknownComponent { .. }
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;
