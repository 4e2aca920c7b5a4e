//! Configuration management for api-spray.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Command line flags are applied on top
//! by the binary.

use crate::error::{ConfigError, ConfigResult};
use crate::types::ScanMode;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/api-spray/config.toml` (or platform
/// equivalent) unless a path is given explicitly. If the default file
/// doesn't exist, default values are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan orchestration settings
    pub scan: ScanSettings,
    /// HTTP probe settings
    pub http: HttpSettings,
    /// Output location settings
    pub output: OutputSettings,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to
    /// defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SPRAY_THREADS`: Override worker count
    /// - `SPRAY_BATCH_SIZE`: Override words per batch
    /// - `SPRAY_TIMEOUT_SECS`: Override HTTP timeout
    /// - `SPRAY_OUT_DIR`: Override output directory
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SPRAY_THREADS") {
            if let Ok(threads) = val.parse() {
                self.scan.threads = threads;
                tracing::debug!("Override scan.threads from env: {}", threads);
            }
        }

        if let Ok(val) = std::env::var("SPRAY_BATCH_SIZE") {
            if let Ok(batch_size) = val.parse() {
                self.scan.batch_size = batch_size;
                tracing::debug!("Override scan.batch_size from env: {}", batch_size);
            }
        }

        if let Ok(val) = std::env::var("SPRAY_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.http.timeout_secs = secs;
                tracing::debug!("Override http.timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("SPRAY_OUT_DIR") {
            tracing::debug!("Override output.out_dir from env: {}", val);
            self.output.out_dir = PathBuf::from(val);
        }
    }

    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        fn invalid(field: &str, reason: &str) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.scan.threads == 0 {
            return Err(invalid("scan.threads", "must be at least 1"));
        }
        if self.scan.batch_size == 0 {
            return Err(invalid("scan.batch_size", "must be at least 1"));
        }
        if self.scan.status_codes.is_empty() {
            return Err(invalid("scan.status_codes", "at least one code is required"));
        }
        if self.scan.false_positive_threshold == 0 {
            return Err(invalid(
                "scan.false_positive_threshold",
                "must be at least 1",
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    /// Save configuration to the given path.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the default configuration file.
    ///
    /// Uses XDG base directories: `~/.config/api-spray/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "api-spray", "api-spray").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Scan orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// How targets and words are combined
    pub mode: ScanMode,
    /// Number of concurrent workers per batch
    pub threads: usize,
    /// Number of words per batch (progress is checkpointed per batch)
    pub batch_size: usize,
    /// HTTP status codes that count as a discovery
    pub status_codes: Vec<u16>,
    /// Repeats of an identical (target, status, length) before it is filtered
    pub false_positive_threshold: u32,
}

impl ScanSettings {
    /// Whether a status code is in the accept-list.
    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            mode: ScanMode::Wildcards,
            threads: 50,
            batch_size: 10,
            status_codes: vec![200],
            false_positive_threshold: 10,
        }
    }
}

/// HTTP probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Additional attempts after a failed connection
    pub retries: u32,
    /// User agent string
    pub user_agent: String,
    /// Follow HTTP redirects
    pub follow_redirects: bool,
    /// Accept invalid TLS certificates
    pub insecure_tls: bool,
    /// Do not retry over plain HTTP when HTTPS fails
    pub disable_http_fallback: bool,
}

impl HttpSettings {
    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            retries: 1,
            user_agent: "Mozilla/5.0 (compatible; api_spray/1.0)".to_string(),
            follow_redirects: true,
            insecure_tls: true,
            disable_http_fallback: false,
        }
    }
}

/// Output location settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for results, log and progress files
    pub out_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scan.mode, ScanMode::Wildcards);
        assert_eq!(config.scan.threads, 50);
        assert_eq!(config.scan.batch_size, 10);
        assert_eq!(config.scan.status_codes, vec![200]);
        assert_eq!(config.scan.false_positive_threshold, 10);
        assert_eq!(config.http.timeout(), Duration::from_secs(10));
        assert!(config.http.follow_redirects);
        assert_eq!(config.output.out_dir, PathBuf::from("results"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.scan.mode = ScanMode::Directories;
        config.scan.status_codes = vec![200, 301, 403];
        config.http.retries = 3;

        config.save_to(&config_path).expect("save config");
        let loaded = AppConfig::load_from(&config_path).expect("load config");

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_missing_path() {
        let tmp = TempDir::new().expect("create temp dir");
        let err = AppConfig::load_from(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[scan]
mode = "subdomains"
threads = 8

[http]
follow_redirects = false
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.scan.mode, ScanMode::Subdomains);
        assert_eq!(config.scan.threads, 8);
        assert!(!config.http.follow_redirects);
        // These should be defaults
        assert_eq!(config.scan.batch_size, 10);
        assert_eq!(config.http.retries, 1);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.scan.threads = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scan.threads"));

        let mut config = AppConfig::default();
        config.scan.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scan.status_codes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SPRAY_THREADS", "7");
        std::env::set_var("SPRAY_OUT_DIR", "/tmp/spray-out");

        let mut config = AppConfig::default();
        config.apply_env();
        assert_eq!(config.scan.threads, 7);
        assert_eq!(config.output.out_dir, PathBuf::from("/tmp/spray-out"));

        std::env::remove_var("SPRAY_THREADS");
        std::env::remove_var("SPRAY_OUT_DIR");
    }

    #[test]
    fn test_accepts() {
        let settings = ScanSettings {
            status_codes: vec![200, 302],
            ..ScanSettings::default()
        };
        assert!(settings.accepts(302));
        assert!(!settings.accepts(404));
    }
}
