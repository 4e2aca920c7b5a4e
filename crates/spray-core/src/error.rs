//! Core error types for api-spray.
//!
//! Configuration problems are fatal at startup, before any scanning
//! begins, so they get their own enum that the central error wraps.

use thiserror::Error;

/// Central error type for shared api-spray operations.
#[derive(Error, Debug)]
pub enum SprayError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file passed explicitly but missing
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SprayError`.
pub type Result<T> = std::result::Result<T, SprayError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SprayError::Validation("empty wordlist".to_string());
        assert_eq!(err.to_string(), "validation error: empty wordlist");

        let err = ConfigError::InvalidValue {
            field: "scan.threads".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for scan.threads: must be at least 1"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let spray_err: SprayError = config_err.into();
        assert!(matches!(spray_err, SprayError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let spray_err: SprayError = io_err.into();
        assert!(matches!(spray_err, SprayError::Io(_)));
    }
}
