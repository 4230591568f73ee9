//! Group reconciliation phase
//!
//! Runs only when the deployment carries a coordination group, and always
//! last: the manager config references live agent ids that the agent
//! phase just produced. Manager type is immutable across versions; a
//! mismatch aborts before any group write.

use tracing::debug;

use super::{MigrationContext, MigrationEngine};
use crate::api::{ManagerConfig, UpdateGroupRequest};
use crate::deployment::DeploymentEntity;
use crate::error::{MigrationError, Result};
use crate::id::LiveEntityId;
use crate::template::{GroupConfig, ManagerType, Template};

const DEFAULT_MAX_TURNS: u32 = 15;
const DEFAULT_TERMINATION_TOKEN: &str = "stop";
const DEFAULT_SLEEPTIME_FREQUENCY: u32 = 15;
const DEFAULT_MESSAGE_BUFFER_LENGTH: u32 = 15;

impl MigrationEngine {
    pub(crate) async fn reconcile_group(
        &self,
        cx: &MigrationContext,
        template: &Template,
        group: &DeploymentEntity,
        current_agents: &[DeploymentEntity],
    ) -> Result<()> {
        let live = self.api.retrieve_group(&cx.actor_id, &group.live_id).await?;

        let Some(manager_type) = template.manager_type else {
            return Err(MigrationError::ManagerTypeMismatch {
                live: live.manager_type,
                template: None,
            });
        };
        if manager_type != live.manager_type {
            return Err(MigrationError::ManagerTypeMismatch {
                live: live.manager_type,
                template: Some(manager_type),
            });
        }

        let group_config = template.group_config.clone().unwrap_or_default();
        let manager_config = build_manager_config(manager_type, &group_config, current_agents)?;
        let agent_ids: Vec<LiveEntityId> =
            current_agents.iter().map(|a| a.live_id.clone()).collect();

        debug!(
            group = %group.live_id,
            manager_type = ?manager_type,
            members = agent_ids.len(),
            "updating group membership and manager config"
        );
        self.api
            .update_group(
                &cx.actor_id,
                &group.live_id,
                UpdateGroupRequest {
                    manager_config,
                    agent_ids,
                },
            )
            .await?;
        Ok(())
    }
}

/// Build the manager config for the group's (already validated) type,
/// resolving the manager entity id against the post-reconciliation agents.
fn build_manager_config(
    manager_type: ManagerType,
    config: &GroupConfig,
    current_agents: &[DeploymentEntity],
) -> Result<ManagerConfig> {
    let resolve_manager = || -> Result<LiveEntityId> {
        let entity_id = config.manager_entity_id.as_ref().ok_or_else(|| {
            MigrationError::ManagerAgentUnresolved {
                entity_id: "(not declared)".to_string(),
            }
        })?;
        current_agents
            .iter()
            .find(|a| &a.entity_id == entity_id)
            .map(|a| a.live_id.clone())
            .ok_or_else(|| MigrationError::ManagerAgentUnresolved {
                entity_id: entity_id.as_str().to_string(),
            })
    };

    let config = match manager_type {
        ManagerType::RoundRobin => ManagerConfig::RoundRobin {
            max_turns: config.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
        },
        ManagerType::Supervisor => ManagerConfig::Supervisor {
            manager_agent_id: resolve_manager()?,
        },
        ManagerType::Dynamic => ManagerConfig::Dynamic {
            manager_agent_id: resolve_manager()?,
            termination_token: config
                .termination_token
                .clone()
                .unwrap_or_else(|| DEFAULT_TERMINATION_TOKEN.to_string()),
            max_turns: config.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
        },
        ManagerType::Sleeptime => ManagerConfig::Sleeptime {
            manager_agent_id: resolve_manager()?,
            sleeptime_agent_frequency: config
                .sleeptime_agent_frequency
                .unwrap_or(DEFAULT_SLEEPTIME_FREQUENCY),
        },
        ManagerType::VoiceSleeptime => ManagerConfig::VoiceSleeptime {
            manager_agent_id: resolve_manager()?,
            max_message_buffer_length: config
                .max_message_buffer_length
                .unwrap_or(DEFAULT_MESSAGE_BUFFER_LENGTH),
            min_message_buffer_length: config
                .min_message_buffer_length
                .unwrap_or(DEFAULT_MESSAGE_BUFFER_LENGTH),
        },
    };
    Ok(config)
}
