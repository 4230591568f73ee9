//! Remote entity-management capability
//!
//! The engine drives a remote system that owns the live agents, memory
//! blocks, and groups. The wire format is not this crate's concern;
//! implementations map these calls onto whatever transport they use.
//! The remote side has no multi-entity transaction primitive, which is why
//! the engine's failure model tolerates partial completion.

use std::collections::HashMap;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::deployment::{DeploymentEntity, ProvenanceTags};
use crate::error::ApiError;
use crate::id::{ActorId, DeploymentId, LiveEntityId, TemplateId};
use crate::template::ManagerType;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Concrete LLM configuration for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LlmConfig {
    /// The handle this config resolves from (e.g. "openai/gpt-5")
    pub model: String,
    pub provider: String,
    pub context_window: u32,
    pub max_tokens: Option<u32>,
    pub max_reasoning_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub enable_reasoner: Option<bool>,
    pub put_inner_thoughts_in_kwargs: Option<bool>,
    pub verbosity: Option<String>,
    pub reasoning_effort: Option<String>,
}

/// Live agent detail, as much of it as the reconcilers need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDetail {
    pub id: LiveEntityId,
    pub name: String,
    pub llm_config: LlmConfig,
    pub tool_exec_environment_variables: HashMap<String, String>,
}

/// Live group detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDetail {
    pub id: LiveEntityId,
    pub manager_type: ManagerType,
    pub agent_ids: Vec<LiveEntityId>,
}

/// Manager configuration pushed on group update, shaped per manager type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "manager_type", rename_all = "snake_case")]
pub enum ManagerConfig {
    RoundRobin {
        max_turns: u32,
    },
    Supervisor {
        manager_agent_id: LiveEntityId,
    },
    Dynamic {
        manager_agent_id: LiveEntityId,
        termination_token: String,
        max_turns: u32,
    },
    Sleeptime {
        manager_agent_id: LiveEntityId,
        sleeptime_agent_frequency: u32,
    },
    VoiceSleeptime {
        manager_agent_id: LiveEntityId,
        max_message_buffer_length: u32,
        min_message_buffer_length: u32,
    },
}

impl ManagerConfig {
    pub fn manager_type(&self) -> ManagerType {
        match self {
            ManagerConfig::RoundRobin { .. } => ManagerType::RoundRobin,
            ManagerConfig::Supervisor { .. } => ManagerType::Supervisor,
            ManagerConfig::Dynamic { .. } => ManagerType::Dynamic,
            ManagerConfig::Sleeptime { .. } => ManagerType::Sleeptime,
            ManagerConfig::VoiceSleeptime { .. } => ManagerType::VoiceSleeptime,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub system_prompt: String,
    pub llm_config: LlmConfig,
    pub tool_ids: Vec<String>,
    pub tool_rules: Vec<serde_json::Value>,
    pub source_ids: Vec<String>,
    pub identity_ids: Vec<String>,
    pub tags: Vec<String>,
    pub block_ids: Vec<LiveEntityId>,
    pub tool_exec_environment_variables: HashMap<String, String>,
    /// The template is the sole source of truth for tool membership
    pub include_base_tools: bool,
    /// Likewise for source membership
    pub include_default_source: bool,
    pub per_file_view_window_char_limit: Option<u32>,
    pub max_files_open: Option<u32>,
    pub provenance: ProvenanceTags,
}

/// Partial agent update. `None` fields are omitted from the remote call
/// and leave the live value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAgentRequest {
    pub block_ids: Option<Vec<LiveEntityId>>,
    pub tool_ids: Option<Vec<String>>,
    pub tool_rules: Option<Vec<serde_json::Value>>,
    pub tool_exec_environment_variables: Option<HashMap<String, String>>,
    pub llm_config: Option<LlmConfig>,
    pub per_file_view_window_char_limit: Option<u32>,
    pub max_files_open: Option<u32>,
    pub template_id: Option<TemplateId>,
    pub base_template_id: Option<TemplateId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockRequest {
    pub label: String,
    pub value: String,
    pub limit: u32,
    pub description: Option<String>,
    pub read_only: bool,
    pub preserve_on_migration: bool,
    pub provenance: ProvenanceTags,
}

/// Agent-scoped block update. A `None` value means "do not touch the
/// block's value" (the preserve-core-memories path); the remaining fields
/// are always pushed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBlockRequest {
    pub value: Option<String>,
    pub limit: Option<u32>,
    pub description: Option<String>,
    pub read_only: Option<bool>,
    pub preserve_on_migration: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateGroupRequest {
    pub manager_config: ManagerConfig,
    pub agent_ids: Vec<LiveEntityId>,
}

/// Entity-management API of the remote agent system.
///
/// All calls act on behalf of `actor`, the remote-system identity the
/// migration runs as.
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// Live `(kind, live_id, entity_id)` tuples for a deployment.
    async fn list_deployment_entities(
        &self,
        actor: &ActorId,
        deployment_id: &DeploymentId,
    ) -> ApiResult<Vec<DeploymentEntity>>;

    async fn create_agent(
        &self,
        actor: &ActorId,
        request: CreateAgentRequest,
    ) -> ApiResult<AgentDetail>;

    async fn retrieve_agent(&self, actor: &ActorId, id: &LiveEntityId) -> ApiResult<AgentDetail>;

    async fn update_agent(
        &self,
        actor: &ActorId,
        id: &LiveEntityId,
        request: UpdateAgentRequest,
    ) -> ApiResult<()>;

    async fn delete_agent(&self, actor: &ActorId, id: &LiveEntityId) -> ApiResult<()>;

    async fn create_block(
        &self,
        actor: &ActorId,
        request: CreateBlockRequest,
    ) -> ApiResult<LiveEntityId>;

    /// Update a block through the agent-scoped endpoint. Blocks shared by
    /// several agents are updated once per holding agent.
    async fn update_agent_block(
        &self,
        actor: &ActorId,
        agent_id: &LiveEntityId,
        block_id: &LiveEntityId,
        request: UpdateBlockRequest,
    ) -> ApiResult<()>;

    async fn delete_block(&self, actor: &ActorId, id: &LiveEntityId) -> ApiResult<()>;

    /// Agents currently holding a block (a block may be shared).
    async fn agents_holding_block(
        &self,
        actor: &ActorId,
        block_id: &LiveEntityId,
    ) -> ApiResult<Vec<LiveEntityId>>;

    async fn retrieve_group(&self, actor: &ActorId, id: &LiveEntityId) -> ApiResult<GroupDetail>;

    async fn update_group(
        &self,
        actor: &ActorId,
        id: &LiveEntityId,
        request: UpdateGroupRequest,
    ) -> ApiResult<()>;
}
