//! Template-related row types.

use std::collections::HashMap;

use sqlx::types::Json;
use sqlx::FromRow;

use loom_core::{
    AgentOverrides, AgentTemplate, BlockAssociation, BlockTemplate, GroupConfig, ManagerType,
    OrganizationId, Template, TemplateEntityId, TemplateId, TemplateVersion,
};

use crate::error::{DbError, DbResult};

pub fn manager_type_to_str(manager_type: ManagerType) -> &'static str {
    match manager_type {
        ManagerType::RoundRobin => "round_robin",
        ManagerType::Supervisor => "supervisor",
        ManagerType::Dynamic => "dynamic",
        ManagerType::Sleeptime => "sleeptime",
        ManagerType::VoiceSleeptime => "voice_sleeptime",
    }
}

pub fn manager_type_from_str(raw: &str) -> DbResult<ManagerType> {
    match raw {
        "round_robin" => Ok(ManagerType::RoundRobin),
        "supervisor" => Ok(ManagerType::Supervisor),
        "dynamic" => Ok(ManagerType::Dynamic),
        "sleeptime" => Ok(ManagerType::Sleeptime),
        "voice_sleeptime" => Ok(ManagerType::VoiceSleeptime),
        other => Err(DbError::invalid_data(format!(
            "unknown manager type: {other}"
        ))),
    }
}

/// A template row.
#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: String,
    pub base_template_id: String,
    /// 'current' or a version number
    pub version: String,
    pub organization_id: String,
    pub project_id: String,
    pub manager_type: Option<String>,
    pub group_config: Option<Json<GroupConfig>>,
}

impl TemplateRow {
    pub fn into_template(self) -> DbResult<Template> {
        let version: TemplateVersion = self
            .version
            .parse()
            .map_err(|e: String| DbError::invalid_data(e))?;
        let manager_type = self
            .manager_type
            .as_deref()
            .map(manager_type_from_str)
            .transpose()?;
        Ok(Template {
            id: TemplateId::new(self.id),
            base_template_id: TemplateId::new(self.base_template_id),
            version,
            organization_id: OrganizationId::new(self.organization_id),
            project_id: self.project_id,
            manager_type,
            group_config: self.group_config.map(|c| c.0),
        })
    }

    pub fn from_template(template: &Template) -> Self {
        Self {
            id: template.id.as_str().to_string(),
            base_template_id: template.base_template_id.as_str().to_string(),
            version: template.version.to_string(),
            organization_id: template.organization_id.as_str().to_string(),
            project_id: template.project_id.clone(),
            manager_type: template.manager_type.map(|t| manager_type_to_str(t).to_string()),
            group_config: template.group_config.clone().map(Json),
        }
    }
}

/// An agent-template row. List and map columns are JSON TEXT.
#[derive(Debug, Clone, FromRow)]
pub struct AgentTemplateRow {
    pub entity_id: String,
    pub system_prompt: String,
    pub model: String,
    pub tool_ids: Json<Vec<String>>,
    pub tool_rules: Json<Vec<serde_json::Value>>,
    pub source_ids: Json<Vec<String>>,
    pub identity_ids: Json<Vec<String>>,
    pub tags: Json<Vec<String>>,
    pub tool_variables: Json<HashMap<String, String>>,
    pub overrides: Json<AgentOverrides>,
}

impl AgentTemplateRow {
    pub fn into_agent_template(self) -> AgentTemplate {
        AgentTemplate {
            entity_id: TemplateEntityId::new(self.entity_id),
            system_prompt: self.system_prompt,
            model: self.model,
            tool_ids: self.tool_ids.0,
            tool_rules: self.tool_rules.0,
            source_ids: self.source_ids.0,
            identity_ids: self.identity_ids.0,
            tags: self.tags.0,
            tool_variables: self.tool_variables.0,
            overrides: self.overrides.0,
        }
    }

    pub fn from_agent_template(template: &AgentTemplate) -> Self {
        Self {
            entity_id: template.entity_id.as_str().to_string(),
            system_prompt: template.system_prompt.clone(),
            model: template.model.clone(),
            tool_ids: Json(template.tool_ids.clone()),
            tool_rules: Json(template.tool_rules.clone()),
            source_ids: Json(template.source_ids.clone()),
            identity_ids: Json(template.identity_ids.clone()),
            tags: Json(template.tags.clone()),
            tool_variables: Json(template.tool_variables.clone()),
            overrides: Json(template.overrides.clone()),
        }
    }
}

/// A block-template row.
#[derive(Debug, Clone, FromRow)]
pub struct BlockTemplateRow {
    pub entity_id: String,
    pub label: String,
    pub value: String,
    pub char_limit: i64,
    pub description: Option<String>,
    pub read_only: bool,
    pub preserve_on_migration: bool,
}

impl BlockTemplateRow {
    pub fn into_block_template(self) -> BlockTemplate {
        BlockTemplate {
            entity_id: TemplateEntityId::new(self.entity_id),
            label: self.label,
            value: self.value,
            limit: self.char_limit as u32,
            description: self.description,
            read_only: self.read_only,
            preserve_on_migration: self.preserve_on_migration,
        }
    }

    pub fn from_block_template(template: &BlockTemplate) -> Self {
        Self {
            entity_id: template.entity_id.as_str().to_string(),
            label: template.label.clone(),
            value: template.value.clone(),
            char_limit: template.limit as i64,
            description: template.description.clone(),
            read_only: template.read_only,
            preserve_on_migration: template.preserve_on_migration,
        }
    }
}

/// An agent-to-block association row.
#[derive(Debug, Clone, FromRow)]
pub struct AssociationRow {
    pub agent_entity_id: String,
    pub block_entity_id: String,
}

impl AssociationRow {
    pub fn into_association(self) -> BlockAssociation {
        BlockAssociation {
            agent_entity_id: TemplateEntityId::new(self.agent_entity_id),
            block_entity_id: TemplateEntityId::new(self.block_entity_id),
        }
    }
}
