//! Shared utilities for flowgraph.
//!
//! This crate provides the ambient configuration-loading and error plumbing
//! reused across the other crates in the workspace.
//!
//! # Modules
//!
//! ## Config (`config`)
//!
//! Layered configuration loading: built-in defaults, an optional config file,
//! then environment variable overrides.
//!
//! ```rust,ignore
//! use utils::config::{get_env, get_env_parse, load_config_file};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AppConfig {
//!     api_key: String,
//!     port: u16,
//! }
//!
//! let api_key = get_env("API_KEY")?;
//! let port = get_env_parse::<u16>("PORT")?;
//! let config: AppConfig = load_config_file("config.yaml")?;
//! ```

pub mod error;

#[cfg(feature = "config")]
pub mod config;

pub use error::{Result, UtilsError};

#[cfg(feature = "config")]
pub use config::{
    get_env, get_env_bool, get_env_bool_or, get_env_or, get_env_parse, get_env_parse_or,
    load_config_file, load_json_config, load_yaml_config, ConfigBuilder, FromEnv, ValidateConfig,
};
