//! Configuration module for orchestrator
//!
//! Provides YAML configuration loading and parsing for the process-wide
//! invocation pipeline settings: model defaults, budget caps, prompt
//! archival, and executor limits. Environment variable expansion and file
//! includes live in [`loader`].

pub mod loader;
pub mod process;

pub use loader::{deep_merge, load_yaml_config, load_yaml_file};
pub use process::{
    DataLayerConfig, LoggingConfig, ProcessConfig, PromptArchiveConfig, VectorStoreConfig,
};
