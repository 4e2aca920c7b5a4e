//! Spray Core - Foundation crate for the api-spray endpoint scanner.
//!
//! This crate provides the shared types, error handling, configuration
//! management and input loading that the scanner and the command line
//! front end depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared domain types (`ScanMode`, `WorkItem`)
//! - [`input`] - Target and wordlist line loading
//!
//! # Example
//!
//! ```rust
//! use spray_core::{AppConfig, ScanMode};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.scan.mode, ScanMode::Wildcards);
//! assert!(config.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod input;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, HttpSettings, OutputSettings, ScanSettings};
pub use error::{ConfigError, ConfigResult, Result, SprayError};
pub use input::load_lines;
pub use types::{ScanMode, WorkItem};
