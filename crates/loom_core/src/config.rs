//! Engine configuration
//!
//! Loaded from TOML by embedding callers; every knob has a default so an
//! empty config is valid.

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};
use crate::model::ModelFallback;

fn default_max_entity_concurrency() -> usize {
    8
}

fn default_batch_size() -> usize {
    10
}

fn default_model_cache_ttl_secs() -> u64 {
    300
}

/// Tuning and policy knobs for the migration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cap on concurrent remote entity operations within one phase.
    /// Independent of batch size, so a wide batch cannot fan out an
    /// unbounded number of remote calls.
    #[serde(default = "default_max_entity_concurrency")]
    pub max_entity_concurrency: usize,

    /// Page width for batch migration when the caller does not pass one
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// TTL for cached model-handle resolutions
    #[serde(default = "default_model_cache_ttl_secs")]
    pub model_cache_ttl_secs: u64,

    /// Policy for unresolvable model handles
    #[serde(default)]
    pub model_fallback: ModelFallback,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_entity_concurrency: default_max_entity_concurrency(),
            default_batch_size: default_batch_size(),
            model_cache_ttl_secs: default_model_cache_ttl_secs(),
            model_fallback: ModelFallback::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| MigrationError::Config {
            message: e.to_string(),
        })
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| MigrationError::Config {
            message: format!("{}: {e}", path.as_ref().display()),
        })?;
        Self::from_toml_str(&raw)
    }
}
