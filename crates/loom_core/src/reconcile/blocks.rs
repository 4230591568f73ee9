//! Block reconciliation phase

use std::collections::HashMap;

use futures::{stream, StreamExt};
use tracing::debug;

use super::{settle, MigrationContext, MigrationEngine};
use crate::api::{CreateBlockRequest, UpdateBlockRequest};
use crate::deployment::EntityKind;
use crate::diff::EntityDiff;
use crate::error::{MigrationError, Result};
use crate::id::{LiveEntityId, TemplateEntityId};
use crate::template::BlockTemplate;
use crate::vars;

impl MigrationEngine {
    /// Apply the block portion of the diff.
    ///
    /// Returns the `entity_id -> live block id` map covering both
    /// surviving and freshly created blocks; the agent phase resolves
    /// block associations through it.
    pub(crate) async fn reconcile_blocks(
        &self,
        cx: &MigrationContext,
        diff: &EntityDiff,
        templates: &[BlockTemplate],
    ) -> Result<HashMap<TemplateEntityId, LiveEntityId>> {
        let by_entity: HashMap<&TemplateEntityId, &BlockTemplate> =
            templates.iter().map(|t| (&t.entity_id, t)).collect();
        let fanout = self.config.max_entity_concurrency;

        // Deletions run in parallel and all settle before the first
        // failure (if any) aborts the migration.
        let deleted: Vec<Result<()>> = stream::iter(&diff.to_delete)
            .map(|entity| async move {
                debug!(block = %entity.live_id, entity = %entity.entity_id, "deleting removed block");
                self.api.delete_block(&cx.actor_id, &entity.live_id).await?;
                Ok(())
            })
            .buffer_unordered(fanout)
            .collect()
            .await;
        settle(deleted)?;

        // New blocks only see the migration-level variables; there is no
        // agent context yet.
        let created: Vec<Result<(TemplateEntityId, LiveEntityId)>> = stream::iter(&diff.to_add)
            .map(|entity_id| {
                let by_entity = &by_entity;
                async move {
                    let template =
                        *by_entity
                            .get(entity_id)
                            .ok_or_else(|| MigrationError::TemplateEntityMissing {
                                template_id: cx.template_id.clone(),
                                kind: EntityKind::Block,
                                entity_id: entity_id.clone(),
                            })?;
                    let value = vars::render(&template.value, &cx.memory_variables);
                    let live_id = self
                        .api
                        .create_block(
                            &cx.actor_id,
                            CreateBlockRequest {
                                label: template.label.clone(),
                                value,
                                limit: template.limit,
                                description: template.description.clone(),
                                read_only: template.read_only,
                                preserve_on_migration: template.preserve_on_migration,
                                provenance: cx.provenance(entity_id.clone()),
                            },
                        )
                        .await?;
                    debug!(block = %live_id, entity = %entity_id, "created block");
                    Ok((entity_id.clone(), live_id))
                }
            })
            .buffer_unordered(fanout)
            .collect()
            .await;

        let mut block_map: HashMap<TemplateEntityId, LiveEntityId> = diff
            .to_update
            .iter()
            .map(|r| (r.entity_id.clone(), r.live_id.clone()))
            .collect();
        for (entity_id, live_id) in settle(created)? {
            block_map.insert(entity_id, live_id);
        }

        // Updates go through the agent-scoped endpoint, once per agent
        // currently holding the block.
        let updated: Vec<Result<()>> = stream::iter(&diff.to_update)
            .map(|entity| {
                let by_entity = &by_entity;
                async move {
                    let template = *by_entity.get(&entity.entity_id).ok_or_else(|| {
                        MigrationError::TemplateEntityMissing {
                            template_id: cx.template_id.clone(),
                            kind: EntityKind::Block,
                            entity_id: entity.entity_id.clone(),
                        }
                    })?;
                    let holders = self
                        .api
                        .agents_holding_block(&cx.actor_id, &entity.live_id)
                        .await?;
                    for agent_id in holders {
                        let agent_vars = self.store.agent_variables(&agent_id).await?;
                        // Migration-level values win over the agent's own.
                        let merged = vars::overlay(&agent_vars, &cx.memory_variables);
                        let value = (!cx.preserve_core_memories)
                            .then(|| vars::render(&template.value, &merged));
                        self.api
                            .update_agent_block(
                                &cx.actor_id,
                                &agent_id,
                                &entity.live_id,
                                UpdateBlockRequest {
                                    value,
                                    limit: Some(template.limit),
                                    description: template.description.clone(),
                                    read_only: Some(template.read_only),
                                    preserve_on_migration: Some(template.preserve_on_migration),
                                },
                            )
                            .await?;
                    }
                    Ok(())
                }
            })
            .buffer_unordered(fanout)
            .collect()
            .await;
        settle(updated)?;

        Ok(block_map)
    }
}
