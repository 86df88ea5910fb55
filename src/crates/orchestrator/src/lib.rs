//! Orchestration engine for flowgraph: process configuration, the
//! Progress Channel fan-out, and the invocation-request entrypoint that
//! drives the Graph Executor.

pub mod config;
pub mod invocation;
pub mod progress_channel;
pub mod version;

use thiserror::Error;

/// Errors surfaced from configuration loading and the invocation pipeline.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Invalid or missing configuration.
    #[error("Orchestrator error: {0}")]
    General(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Get version information.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }
}
