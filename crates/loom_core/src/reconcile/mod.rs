//! The migration engine
//!
//! Reconciles a deployment's live entity set against a target template
//! version: diff, then block / agent / group phases strictly in that
//! order (each phase consumes identifiers the previous one produced),
//! wrapped in the deployment status transition. Within a phase,
//! independent entity operations run concurrently under a bounded
//! fan-out.

mod agents;
mod batch;
mod blocks;
mod groups;

pub use batch::{BatchMigrationReport, BatchMigrationRequest, DeploymentFailure};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::EntityApi;
use crate::config::EngineConfig;
use crate::deployment::{DeploymentEntities, ProvenanceTags};
use crate::diff::diff;
use crate::error::{MigrationError, Result};
use crate::id::{ActorId, DeploymentId, OrganizationId, TemplateEntityId, TemplateId};
use crate::model::{CachedModelResolver, ModelResolver};
use crate::store::{DeploymentOutcome, MigrationStore};

/// Options for a single-deployment migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRequest {
    pub deployment_id: DeploymentId,
    /// The template version to migrate onto
    pub template_id: TemplateId,
    pub organization_id: OrganizationId,
    /// Remote-system identity the migration acts as
    pub actor_id: ActorId,
    /// Template family override; defaults to the target template's own
    /// base template id
    pub base_template_id: Option<TemplateId>,
    /// Skip overwriting block values on update
    #[serde(default)]
    pub preserve_core_memories: bool,
    /// Merge template tool-variable defaults instead of replacing
    #[serde(default)]
    pub preserve_tool_variables: bool,
    /// Migration-level memory variables substituted into block values
    #[serde(default)]
    pub memory_variables: HashMap<String, String>,
}

/// Per-migration state threaded through the reconciler phases.
pub(crate) struct MigrationContext {
    pub deployment_id: DeploymentId,
    pub template_id: TemplateId,
    pub base_template_id: Option<TemplateId>,
    pub actor_id: ActorId,
    pub preserve_core_memories: bool,
    pub preserve_tool_variables: bool,
    pub memory_variables: HashMap<String, String>,
}

impl MigrationContext {
    pub(crate) fn provenance(&self, entity_id: TemplateEntityId) -> ProvenanceTags {
        ProvenanceTags {
            deployment_id: self.deployment_id.clone(),
            template_id: self.template_id.clone(),
            base_template_id: self.base_template_id.clone(),
            entity_id,
        }
    }
}

/// Template-to-deployment migration engine.
///
/// Holds the remote entity API, the relational store, and the cached
/// model resolver as injected collaborators. Cheap to share behind an
/// `Arc`; all state is per-call.
pub struct MigrationEngine {
    pub(crate) api: Arc<dyn EntityApi>,
    pub(crate) store: Arc<dyn MigrationStore>,
    pub(crate) models: CachedModelResolver,
    pub(crate) config: EngineConfig,
}

impl MigrationEngine {
    pub fn new(
        api: Arc<dyn EntityApi>,
        store: Arc<dyn MigrationStore>,
        models: Arc<dyn ModelResolver>,
        config: EngineConfig,
    ) -> Self {
        let ttl = Duration::seconds(config.model_cache_ttl_secs as i64);
        Self {
            api,
            store,
            models: CachedModelResolver::new(models, ttl),
            config,
        }
    }

    /// Migrate one deployment onto the requested template version.
    ///
    /// Claims the deployment (moving it to `migrating`), runs the
    /// reconciliation phases, and always resolves the status to `ready`
    /// or `failed` before returning. Errors from any phase propagate to
    /// the caller after the failed status (with a human-readable reason)
    /// has been persisted.
    pub async fn migrate_deployment_entities(
        &self,
        request: MigrationRequest,
    ) -> Result<DeploymentEntities> {
        let deployment_id = request.deployment_id.clone();
        self.store
            .deployment(&deployment_id)
            .await?
            .ok_or_else(|| MigrationError::DeploymentNotFound {
                deployment_id: deployment_id.clone(),
            })?;

        if !self.store.claim_deployment(&deployment_id).await? {
            return Err(MigrationError::DeploymentBusy { deployment_id });
        }

        info!(
            deployment = %deployment_id,
            template = %request.template_id,
            "starting deployment migration"
        );

        match self.run_phases(&request).await {
            Ok(entities) => {
                if let Err(finish_err) = self
                    .store
                    .finish_deployment(
                        &deployment_id,
                        DeploymentOutcome::Ready {
                            template_id: request.template_id.clone(),
                        },
                    )
                    .await
                {
                    // The deployment must not stay in `migrating`: that is
                    // the claim lease, and leaving it set turns every
                    // future attempt into DeploymentBusy. Fall back to the
                    // failed terminal state.
                    error!(
                        deployment = %deployment_id,
                        error = %finish_err,
                        "failed to persist ready status, marking deployment failed"
                    );
                    if let Err(fallback_err) = self
                        .store
                        .finish_deployment(
                            &deployment_id,
                            DeploymentOutcome::Failed {
                                message: finish_err.to_string(),
                            },
                        )
                        .await
                    {
                        error!(
                            deployment = %deployment_id,
                            error = %fallback_err,
                            "failed to persist terminal failed status"
                        );
                    }
                    return Err(finish_err.into());
                }
                info!(
                    deployment = %deployment_id,
                    agents = entities.agents.len(),
                    blocks = entities.blocks.len(),
                    has_group = entities.group.is_some(),
                    "deployment migration complete"
                );
                Ok(entities)
            }
            Err(cause) => {
                let message = cause.status_message();
                warn!(deployment = %deployment_id, %message, "deployment migration failed");
                if let Err(finish_err) = self
                    .store
                    .finish_deployment(&deployment_id, DeploymentOutcome::Failed { message })
                    .await
                {
                    // The original failure matters more than the status
                    // write; surface both in the log.
                    error!(
                        deployment = %deployment_id,
                        error = %finish_err,
                        "failed to persist terminal failed status"
                    );
                }
                Err(cause)
            }
        }
    }

    async fn run_phases(&self, request: &MigrationRequest) -> Result<DeploymentEntities> {
        let template = self
            .store
            .template(&request.template_id)
            .await?
            .ok_or_else(|| MigrationError::TemplateNotFound {
                template_id: request.template_id.clone(),
            })?;

        let agent_templates = self.store.agent_templates(&template.id).await?;
        let block_templates = self.store.block_templates(&template.id).await?;
        let associations = self.store.block_associations(&template.id).await?;

        let cx = MigrationContext {
            deployment_id: request.deployment_id.clone(),
            template_id: request.template_id.clone(),
            base_template_id: request
                .base_template_id
                .clone()
                .or_else(|| Some(template.base_template_id.clone())),
            actor_id: request.actor_id.clone(),
            preserve_core_memories: request.preserve_core_memories,
            preserve_tool_variables: request.preserve_tool_variables,
            memory_variables: request.memory_variables.clone(),
        };

        let listed = self
            .api
            .list_deployment_entities(&cx.actor_id, &cx.deployment_id)
            .await?;
        let live = DeploymentEntities::from_listing(listed);
        if live.is_empty() {
            return Err(MigrationError::DeploymentEntitiesNotFound {
                deployment_id: cx.deployment_id.clone(),
            });
        }

        let block_refs: Vec<_> = live.blocks.iter().map(Into::into).collect();
        let desired_blocks: Vec<_> = block_templates.iter().map(|t| t.entity_id.clone()).collect();
        let block_diff = diff(&block_refs, &desired_blocks);

        let agent_refs: Vec<_> = live.agents.iter().map(Into::into).collect();
        let desired_agents: Vec<_> = agent_templates.iter().map(|t| t.entity_id.clone()).collect();
        let agent_diff = diff(&agent_refs, &desired_agents);

        let block_map = self
            .reconcile_blocks(&cx, &block_diff, &block_templates)
            .await?;
        self.reconcile_agents(&cx, &agent_diff, &agent_templates, &associations, &block_map)
            .await?;

        // Agent reconciliation regenerated live ids; the group phase and
        // the returned entity set both need the fresh view.
        let refreshed = self
            .api
            .list_deployment_entities(&cx.actor_id, &cx.deployment_id)
            .await?;
        let refreshed = DeploymentEntities::from_listing(refreshed);

        if let Some(group) = &live.group {
            self.reconcile_group(&cx, &template, group, &refreshed.agents)
                .await?;
        }

        Ok(refreshed)
    }
}

/// Gather fan-out results without short-circuiting: every operation runs
/// to completion, then the first error (if any) is returned.
pub(crate) fn settle<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut ok = Vec::with_capacity(results.len());
    let mut first_err = None;
    for result in results {
        match result {
            Ok(value) => ok.push(value),
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(ok),
    }
}
