//! Agent reconciliation phase

use std::collections::HashMap;

use futures::{stream, StreamExt};
use tracing::{debug, warn};

use super::{settle, MigrationContext, MigrationEngine};
use crate::api::{CreateAgentRequest, LlmConfig, UpdateAgentRequest};
use crate::deployment::EntityKind;
use crate::diff::EntityDiff;
use crate::error::{MigrationError, Result};
use crate::id::{LiveEntityId, TemplateEntityId};
use crate::names;
use crate::store::DeployedAgentRecord;
use crate::template::{AgentOverrides, AgentTemplate, BlockAssociation};
use crate::vars;

impl MigrationEngine {
    /// Apply the agent portion of the diff.
    pub(crate) async fn reconcile_agents(
        &self,
        cx: &MigrationContext,
        diff: &EntityDiff,
        templates: &[AgentTemplate],
        associations: &[BlockAssociation],
        block_map: &HashMap<TemplateEntityId, LiveEntityId>,
    ) -> Result<()> {
        let by_entity: HashMap<&TemplateEntityId, &AgentTemplate> =
            templates.iter().map(|t| (&t.entity_id, t)).collect();
        let mut blocks_of: HashMap<&TemplateEntityId, Vec<&TemplateEntityId>> = HashMap::new();
        for assoc in associations {
            blocks_of
                .entry(&assoc.agent_entity_id)
                .or_default()
                .push(&assoc.block_entity_id);
        }
        let fanout = self.config.max_entity_concurrency;

        let deleted: Vec<Result<()>> = stream::iter(&diff.to_delete)
            .map(|entity| async move {
                debug!(agent = %entity.live_id, entity = %entity.entity_id, "deleting removed agent");
                self.api.delete_agent(&cx.actor_id, &entity.live_id).await?;
                Ok(())
            })
            .buffer_unordered(fanout)
            .collect()
            .await;
        settle(deleted)?;

        let created: Vec<Result<()>> = stream::iter(&diff.to_add)
            .map(|entity_id| {
                let by_entity = &by_entity;
                let blocks_of = &blocks_of;
                async move {
                    let template =
                        *by_entity
                            .get(entity_id)
                            .ok_or_else(|| MigrationError::TemplateEntityMissing {
                                template_id: cx.template_id.clone(),
                                kind: EntityKind::Agent,
                                entity_id: entity_id.clone(),
                            })?;
                    self.create_agent(cx, template, blocks_of, block_map).await
                }
            })
            .buffer_unordered(fanout)
            .collect()
            .await;
        settle(created)?;

        let updated: Vec<Result<()>> = stream::iter(&diff.to_update)
            .map(|entity| {
                let by_entity = &by_entity;
                let blocks_of = &blocks_of;
                async move {
                    let template = *by_entity.get(&entity.entity_id).ok_or_else(|| {
                        MigrationError::TemplateEntityMissing {
                            template_id: cx.template_id.clone(),
                            kind: EntityKind::Agent,
                            entity_id: entity.entity_id.clone(),
                        }
                    })?;
                    self.update_agent(cx, &entity.live_id, template, blocks_of, block_map)
                        .await
                }
            })
            .buffer_unordered(fanout)
            .collect()
            .await;
        settle(updated)?;

        Ok(())
    }

    async fn create_agent(
        &self,
        cx: &MigrationContext,
        template: &AgentTemplate,
        blocks_of: &HashMap<&TemplateEntityId, Vec<&TemplateEntityId>>,
        block_map: &HashMap<TemplateEntityId, LiveEntityId>,
    ) -> Result<()> {
        let mut llm_config = self
            .models
            .resolve_or_fallback(&template.model, self.config.model_fallback)
            .await?;
        apply_overrides(&mut llm_config, &template.overrides);

        let block_ids = resolve_block_ids(&template.entity_id, blocks_of, block_map);
        let name = names::friendly_name();

        let detail = self
            .api
            .create_agent(
                &cx.actor_id,
                CreateAgentRequest {
                    name: name.clone(),
                    system_prompt: template.system_prompt.clone(),
                    llm_config,
                    tool_ids: template.tool_ids.clone(),
                    tool_rules: template.tool_rules.clone(),
                    source_ids: template.source_ids.clone(),
                    identity_ids: template.identity_ids.clone(),
                    tags: template.tags.clone(),
                    block_ids,
                    tool_exec_environment_variables: template.tool_variables.clone(),
                    include_base_tools: false,
                    include_default_source: false,
                    per_file_view_window_char_limit: template
                        .overrides
                        .per_file_view_window_char_limit,
                    max_files_open: template.overrides.max_files_open,
                    provenance: cx.provenance(template.entity_id.clone()),
                },
            )
            .await?;
        debug!(agent = %detail.id, entity = %template.entity_id, %name, "created agent");

        let record = DeployedAgentRecord {
            deployment_id: cx.deployment_id.clone(),
            entity_id: template.entity_id.clone(),
            agent_id: detail.id.clone(),
            name,
            template_id: cx.template_id.clone(),
            base_template_id: cx.base_template_id.clone(),
        };
        // The remote create and the local record are two separate systems
        // with no shared transaction. If the local write fails the live
        // agent is orphaned; log the id so it can be found and reaped.
        if let Err(store_err) = self
            .store
            .record_deployed_agent(&record, &cx.memory_variables)
            .await
        {
            warn!(
                agent = %detail.id,
                deployment = %cx.deployment_id,
                "remote agent created but local record failed; live agent is orphaned"
            );
            return Err(MigrationError::OrphanedEntity {
                live_id: detail.id,
                cause: Box::new(store_err.into()),
            });
        }
        Ok(())
    }

    async fn update_agent(
        &self,
        cx: &MigrationContext,
        live_id: &LiveEntityId,
        template: &AgentTemplate,
        blocks_of: &HashMap<&TemplateEntityId, Vec<&TemplateEntityId>>,
        block_map: &HashMap<TemplateEntityId, LiveEntityId>,
    ) -> Result<()> {
        let detail = self.api.retrieve_agent(&cx.actor_id, live_id).await?;

        let tool_variables = vars::apply_tool_variables(
            &detail.tool_exec_environment_variables,
            &template.tool_variables,
            cx.preserve_tool_variables,
        );

        // Start from the live config; only re-resolve when the template
        // moved to a different handle.
        let mut llm_config = if detail.llm_config.model != template.model {
            self.models
                .resolve_or_fallback(&template.model, self.config.model_fallback)
                .await?
        } else {
            detail.llm_config.clone()
        };
        apply_overrides(&mut llm_config, &template.overrides);

        let block_ids = resolve_block_ids(&template.entity_id, blocks_of, block_map);

        self.api
            .update_agent(
                &cx.actor_id,
                live_id,
                UpdateAgentRequest {
                    block_ids: (!block_ids.is_empty()).then_some(block_ids),
                    tool_ids: Some(template.tool_ids.clone()),
                    tool_rules: Some(template.tool_rules.clone()),
                    tool_exec_environment_variables: Some(tool_variables),
                    llm_config: Some(llm_config),
                    per_file_view_window_char_limit: template
                        .overrides
                        .per_file_view_window_char_limit,
                    max_files_open: template.overrides.max_files_open,
                    template_id: Some(cx.template_id.clone()),
                    base_template_id: cx.base_template_id.clone(),
                },
            )
            .await?;
        debug!(agent = %live_id, entity = %template.entity_id, "updated agent");
        Ok(())
    }
}

/// Overlay template-declared overrides onto a resolved or live config.
/// A `None` override keeps the incoming value.
fn apply_overrides(config: &mut LlmConfig, overrides: &AgentOverrides) {
    if let Some(v) = overrides.context_window {
        config.context_window = v;
    }
    if overrides.max_tokens.is_some() {
        config.max_tokens = overrides.max_tokens;
    }
    if overrides.max_reasoning_tokens.is_some() {
        config.max_reasoning_tokens = overrides.max_reasoning_tokens;
    }
    if overrides.temperature.is_some() {
        config.temperature = overrides.temperature;
    }
    if overrides.enable_reasoner.is_some() {
        config.enable_reasoner = overrides.enable_reasoner;
    }
    if overrides.put_inner_thoughts_in_kwargs.is_some() {
        config.put_inner_thoughts_in_kwargs = overrides.put_inner_thoughts_in_kwargs;
    }
    if let Some(v) = &overrides.verbosity {
        config.verbosity = Some(v.clone());
    }
    if let Some(v) = &overrides.reasoning_effort {
        config.reasoning_effort = Some(v.clone());
    }
}

/// Map an agent's associated block entity ids through the live block map.
/// An association pointing at a block the template does not declare is a
/// template-authoring gap, not a migration failure; skip it loudly.
fn resolve_block_ids(
    agent_entity_id: &TemplateEntityId,
    blocks_of: &HashMap<&TemplateEntityId, Vec<&TemplateEntityId>>,
    block_map: &HashMap<TemplateEntityId, LiveEntityId>,
) -> Vec<LiveEntityId> {
    let Some(block_entities) = blocks_of.get(agent_entity_id) else {
        return Vec::new();
    };
    let mut ids = Vec::with_capacity(block_entities.len());
    for block_entity in block_entities {
        match block_map.get(*block_entity) {
            Some(live_id) => ids.push(live_id.clone()),
            None => warn!(
                agent_entity = %agent_entity_id,
                block_entity = %block_entity,
                "association references a block the template does not declare; skipping"
            ),
        }
    }
    ids
}
