//! Versioned template schema
//!
//! A template declares the desired shape of a deployment: the agents and
//! memory blocks it should contain, keyed by stable entity ids, plus at
//! most one coordination group. Only the `"current"` version is mutable;
//! numbered versions are immutable snapshots.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::id::{OrganizationId, TemplateEntityId, TemplateId};

/// A template version. `"current"` denotes the mutable draft; everything
/// else is an immutable numbered snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateVersion {
    Current,
    Numbered(u32),
}

impl TemplateVersion {
    pub fn is_current(&self) -> bool {
        matches!(self, TemplateVersion::Current)
    }
}

impl fmt::Display for TemplateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateVersion::Current => write!(f, "current"),
            TemplateVersion::Numbered(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for TemplateVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "current" {
            return Ok(TemplateVersion::Current);
        }
        s.parse::<u32>()
            .map(TemplateVersion::Numbered)
            .map_err(|_| format!("invalid template version: {s}"))
    }
}

/// Multi-agent coordination strategy for a template's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ManagerType {
    RoundRobin,
    Supervisor,
    Dynamic,
    Sleeptime,
    VoiceSleeptime,
}

/// Group tuning knobs declared on the template.
///
/// Every field is optional; the group reconciler applies the documented
/// defaults when building the manager config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GroupConfig {
    /// Stable entity id of the managing agent (required for every manager
    /// type except round-robin)
    pub manager_entity_id: Option<TemplateEntityId>,
    /// Token that terminates a dynamic group's turn loop
    pub termination_token: Option<String>,
    /// Turn cap for round-robin and dynamic groups
    pub max_turns: Option<u32>,
    /// Message buffer bounds for voice-sleeptime groups
    pub max_message_buffer_length: Option<u32>,
    pub min_message_buffer_length: Option<u32>,
    /// How often the sleeptime manager wakes, in messages
    pub sleeptime_agent_frequency: Option<u32>,
}

/// A versioned deployment schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Template {
    pub id: TemplateId,
    /// The template family this version belongs to
    pub base_template_id: TemplateId,
    pub version: TemplateVersion,
    pub organization_id: OrganizationId,
    pub project_id: String,
    /// Coordination topology, if this template deploys a group
    pub manager_type: Option<ManagerType>,
    pub group_config: Option<GroupConfig>,
}

/// Per-field overrides an agent template applies on top of the resolved
/// base LLM configuration. `None` keeps the resolved (create) or live
/// (update) value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgentOverrides {
    pub context_window: Option<u32>,
    pub max_tokens: Option<u32>,
    pub max_reasoning_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub enable_reasoner: Option<bool>,
    pub put_inner_thoughts_in_kwargs: Option<bool>,
    pub verbosity: Option<String>,
    pub reasoning_effort: Option<String>,
    pub per_file_view_window_char_limit: Option<u32>,
    pub max_files_open: Option<u32>,
}

/// Declarative agent member of a template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentTemplate {
    /// Stable across template versions; the diff join key
    pub entity_id: TemplateEntityId,
    pub system_prompt: String,
    /// Model handle resolved through the model resolver at migration time
    pub model: String,
    pub tool_ids: Vec<String>,
    pub tool_rules: Vec<serde_json::Value>,
    pub source_ids: Vec<String>,
    pub identity_ids: Vec<String>,
    pub tags: Vec<String>,
    /// Default tool execution variables; merge semantics depend on the
    /// preserve-tool-variables flag
    pub tool_variables: HashMap<String, String>,
    pub overrides: AgentOverrides,
}

/// Declarative memory-block member of a template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BlockTemplate {
    /// Stable across template versions; the diff join key
    pub entity_id: TemplateEntityId,
    pub label: String,
    /// May contain `{{variable}}` placeholders
    pub value: String,
    pub limit: u32,
    pub description: Option<String>,
    pub read_only: bool,
    pub preserve_on_migration: bool,
}

/// Agent-to-block association declared by a template, keyed by the same
/// stable entity ids as the members themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BlockAssociation {
    pub agent_entity_id: TemplateEntityId,
    pub block_entity_id: TemplateEntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_round_trips_through_strings() {
        assert_eq!(
            "current".parse::<TemplateVersion>().unwrap(),
            TemplateVersion::Current
        );
        assert_eq!(
            "7".parse::<TemplateVersion>().unwrap(),
            TemplateVersion::Numbered(7)
        );
        assert_eq!(TemplateVersion::Numbered(7).to_string(), "7");
        assert!("draft".parse::<TemplateVersion>().is_err());
    }

    #[test]
    fn manager_type_serializes_snake_case() {
        let json = serde_json::to_string(&ManagerType::VoiceSleeptime).unwrap();
        assert_eq!(json, "\"voice_sleeptime\"");
    }
}
