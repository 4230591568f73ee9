//! LLM configuration resolution
//!
//! Model handles declared on agent templates are resolved to concrete
//! [`LlmConfig`]s through a collaborator service. Resolution is wrapped in
//! a TTL cache that is owned and injected explicitly, never a module-level
//! singleton.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::LlmConfig;
use crate::error::{MigrationError, Result};

/// Resolves model handles to concrete LLM configurations.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    /// Resolve a handle; `None` when the handle is unknown.
    async fn resolve(&self, handle: &str) -> Result<Option<LlmConfig>>;

    /// All configurations currently available, for the fallback policy.
    async fn available(&self) -> Result<Vec<LlmConfig>>;
}

/// What to do when a template's model handle does not resolve.
///
/// This is an explicit, caller-supplied policy. Production callers keep
/// the default `Strict`; `FirstAvailable` exists only to keep local
/// development unblocked when model catalogs drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelFallback {
    #[default]
    Strict,
    FirstAvailable,
}

#[derive(Clone)]
struct CacheEntry {
    config: LlmConfig,
    fetched_at: DateTime<Utc>,
}

/// TTL cache over a [`ModelResolver`].
///
/// Negative results are not cached: an unknown handle is re-checked on
/// every resolution so a freshly registered model is picked up without
/// waiting out a TTL.
pub struct CachedModelResolver {
    inner: Arc<dyn ModelResolver>,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl CachedModelResolver {
    pub fn new(inner: Arc<dyn ModelResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Resolve a handle under the given fallback policy.
    ///
    /// `Strict` turns an unknown handle into
    /// [`MigrationError::ModelNotFound`]; `FirstAvailable` substitutes an
    /// arbitrary available config and logs the substitution.
    pub async fn resolve_or_fallback(
        &self,
        handle: &str,
        fallback: ModelFallback,
    ) -> Result<LlmConfig> {
        if let Some(config) = self.lookup(handle).await? {
            return Ok(config);
        }
        match fallback {
            ModelFallback::Strict => Err(MigrationError::ModelNotFound {
                handle: handle.to_string(),
            }),
            ModelFallback::FirstAvailable => {
                let available = self.inner.available().await?;
                let substitute =
                    available
                        .into_iter()
                        .next()
                        .ok_or_else(|| MigrationError::ModelNotFound {
                            handle: handle.to_string(),
                        })?;
                warn!(
                    handle,
                    substitute = %substitute.model,
                    "model handle not found, substituting first available model"
                );
                Ok(substitute)
            }
        }
    }

    async fn lookup(&self, handle: &str) -> Result<Option<LlmConfig>> {
        if let Some(entry) = self.entries.get(handle) {
            if Utc::now() - entry.fetched_at < self.ttl {
                return Ok(Some(entry.config.clone()));
            }
        }
        let resolved = self.inner.resolve(handle).await?;
        if let Some(config) = &resolved {
            debug!(handle, "caching resolved model config");
            self.entries.insert(
                handle.to_string(),
                CacheEntry {
                    config: config.clone(),
                    fetched_at: Utc::now(),
                },
            );
        } else {
            self.entries.remove(handle);
        }
        Ok(resolved)
    }

    /// Drop all cached entries.
    pub fn invalidate(&self) {
        self.entries.clear();
    }
}
