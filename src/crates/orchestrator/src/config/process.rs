//! Process-wide configuration for the invocation pipeline: model defaults,
//! budget caps, prompt archival, and executor limits.
//!
//! Loaded once before any invocation is accepted, with layered precedence:
//! built-in defaults, then an optional YAML file, then environment variable
//! overrides (highest precedence). Reuses the `$include`/`${ENV:default}`
//! YAML loader from [`super::loader`]; env overrides here are a second,
//! explicit pass on top of that, since these are scalar process settings
//! rather than file content to splice.

use super::loader::{deep_merge, load_yaml_file};
use crate::OrchestratorError;
use llm::BudgetCaps;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptArchiveConfig {
    pub enabled: bool,
    pub max_lines: usize,
    pub max_chars: usize,
    pub redact: bool,
}

impl Default for PromptArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_lines: 500,
            max_chars: 20_000,
            redact: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreConfig {
    pub endpoint: String,
    pub index_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataLayerConfig {
    pub endpoint: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

/// The validated process configuration, assembled once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConfig {
    pub default_model_id: String,
    pub request_cost_cap_usd: f64,
    pub token_cap: u32,
    pub emergency_cost_threshold_usd: f64,
    pub prompt_archive: PromptArchiveConfig,
    pub prompt_log_sample_rate: f64,
    pub step_cap: usize,
    pub wall_clock_budget_ms: u64,
    pub vector_store: VectorStoreConfig,
    pub data_layer: DataLayerConfig,
    pub logging: LoggingConfig,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            default_model_id: "claude-3-5-sonnet".to_string(),
            request_cost_cap_usd: 1.0,
            token_cap: 200_000,
            emergency_cost_threshold_usd: 5.0,
            prompt_archive: PromptArchiveConfig::default(),
            prompt_log_sample_rate: 0.1,
            step_cap: langgraph_core::executor::DEFAULT_STEP_CAP,
            wall_clock_budget_ms: 30_000,
            vector_store: VectorStoreConfig::default(),
            data_layer: DataLayerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// `(env var, setter)` pairs checked after the file layer, in order. Kept as
/// a flat list rather than per-field env! macros so the precedence order is
/// visible in one place.
impl ProcessConfig {
    /// Load defaults, optionally deep-merge a YAML file over them, then
    /// apply environment variable overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, OrchestratorError> {
        let mut merged = serde_yaml::to_value(Self::default())
            .map_err(|e| OrchestratorError::General(format!("failed to seed defaults: {e}")))?;

        if let Some(path) = path {
            if path.exists() {
                let file_value = load_yaml_file(path)?;
                deep_merge(&mut merged, &file_value);
            }
        }

        let mut config: Self = serde_yaml::from_value(merged).map_err(|e| {
            OrchestratorError::General(format!("failed to parse process configuration: {e}"))
        })?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("PROCESS_DEFAULT_MODEL_ID") {
            self.default_model_id = v;
        }
        if let Some(v) = parsed_env("PROCESS_REQUEST_COST_CAP_USD") {
            self.request_cost_cap_usd = v;
        }
        if let Some(v) = parsed_env("PROCESS_TOKEN_CAP") {
            self.token_cap = v;
        }
        if let Some(v) = parsed_env("PROCESS_EMERGENCY_COST_THRESHOLD_USD") {
            self.emergency_cost_threshold_usd = v;
        }
        if let Some(v) = parsed_env("PROCESS_PROMPT_LOG_SAMPLE_RATE") {
            self.prompt_log_sample_rate = v;
        }
        if let Some(v) = parsed_env("PROCESS_STEP_CAP") {
            self.step_cap = v;
        }
        if let Some(v) = parsed_env("PROCESS_WALL_CLOCK_BUDGET_MS") {
            self.wall_clock_budget_ms = v;
        }
        if let Ok(v) = env::var("PROCESS_VECTOR_STORE_ENDPOINT") {
            self.vector_store.endpoint = v;
        }
        if let Ok(v) = env::var("PROCESS_VECTOR_STORE_INDEX_NAME") {
            self.vector_store.index_name = v;
        }
        if let Ok(v) = env::var("PROCESS_VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = Some(v);
        }
        if let Ok(v) = env::var("PROCESS_DATA_LAYER_ENDPOINT") {
            self.data_layer.endpoint = v;
        }
        if let Ok(v) = env::var("PROCESS_DATA_LAYER_REGION") {
            self.data_layer.region = v;
        }
        if let Ok(v) = env::var("PROCESS_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = env::var("PROCESS_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    fn validate(&self) -> Result<(), OrchestratorError> {
        if self.default_model_id.trim().is_empty() {
            return Err(OrchestratorError::General(
                "defaultModelId must not be empty".to_string(),
            ));
        }
        if self.request_cost_cap_usd <= 0.0 {
            return Err(OrchestratorError::General(
                "requestCostCapUSD must be positive".to_string(),
            ));
        }
        if self.emergency_cost_threshold_usd < self.request_cost_cap_usd {
            return Err(OrchestratorError::General(
                "emergencyCostThresholdUSD must be at or above requestCostCapUSD".to_string(),
            ));
        }
        if self.token_cap == 0 {
            return Err(OrchestratorError::General(
                "tokenCap must be positive".to_string(),
            ));
        }
        if self.step_cap == 0 {
            return Err(OrchestratorError::General(
                "stepCap must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prompt_log_sample_rate) {
            return Err(OrchestratorError::General(
                "promptLogSampleRate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn budget_caps(&self) -> BudgetCaps {
        BudgetCaps {
            request_cost_cap_usd: self.request_cost_cap_usd,
            token_cap: self.token_cap,
            emergency_cost_threshold_usd: self.emergency_cost_threshold_usd,
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ProcessConfig::default().validate().unwrap();
    }

    #[test]
    fn load_with_no_file_returns_validated_defaults() {
        let config = ProcessConfig::load(None).unwrap();
        assert_eq!(config.default_model_id, "claude-3-5-sonnet");
        assert_eq!(config.step_cap, langgraph_core::executor::DEFAULT_STEP_CAP);
    }

    #[test]
    fn env_override_takes_precedence_over_defaults() {
        env::set_var("PROCESS_DEFAULT_MODEL_ID", "gpt-4o");
        env::set_var("PROCESS_TOKEN_CAP", "50000");
        let config = ProcessConfig::load(None).unwrap();
        assert_eq!(config.default_model_id, "gpt-4o");
        assert_eq!(config.token_cap, 50_000);
        env::remove_var("PROCESS_DEFAULT_MODEL_ID");
        env::remove_var("PROCESS_TOKEN_CAP");
    }

    #[test]
    fn rejects_non_positive_request_cost_cap() {
        let mut config = ProcessConfig::default();
        config.request_cost_cap_usd = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_emergency_threshold_below_request_cap() {
        let mut config = ProcessConfig::default();
        config.emergency_cost_threshold_usd = 0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_layer_overrides_defaults_and_env_overrides_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "defaultModelId: from-file\nstepCap: 10\nvectorStore:\n  endpoint: http://vectors.local\n  indexName: docs\ndataLayer:\n  endpoint: http://data.local\n  region: us-east-1\n"
        )
        .unwrap();

        env::set_var("PROCESS_STEP_CAP", "20");
        let config = ProcessConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.default_model_id, "from-file");
        assert_eq!(config.step_cap, 20, "env overrides the file layer");
        assert_eq!(config.vector_store.index_name, "docs");
        env::remove_var("PROCESS_STEP_CAP");
    }
}
