//! Configuration errors
//!
//! Everything that can go wrong before the first request is served: bad
//! config files or environment, invalid method signatures, duplicate paths
//! and schema synthesis failures. All of them abort startup.

use apiserve_domain::SchemaError;
use thiserror::Error;

/// Startup configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Environment override could not be parsed
    #[error("Invalid value {value:?} for environment variable {key}")]
    InvalidEnv {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },

    /// Field value rejected by validation
    #[error("Invalid configuration field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Declared method signature does not fit the calling convention
    #[error("Invalid signature for {method}: {reason}")]
    InvalidSignature {
        /// `Service.Method`
        method: String,
        /// What is wrong with it
        reason: String,
    },

    /// Path already taken by a method or raw handler
    #[error("{path} already registered")]
    DuplicatePath {
        /// Conflicting path
        path: String,
    },

    /// Schema synthesis failure
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// API document could not be encoded
    #[error("Failed to encode API document: {0}")]
    Document(#[from] serde_json::Error),
}
