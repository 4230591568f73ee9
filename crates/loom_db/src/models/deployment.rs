//! Deployment-related row types.

use sqlx::FromRow;

use loom_core::{
    DeployedAgentRecord, Deployment, DeploymentId, DeploymentStatus, LiveEntityId, OrganizationId,
    TemplateEntityId, TemplateId,
};

use crate::error::{DbError, DbResult};

pub fn status_to_str(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Ready => "ready",
        DeploymentStatus::Migrating => "migrating",
        DeploymentStatus::Failed => "failed",
    }
}

pub fn status_from_str(raw: &str) -> DbResult<DeploymentStatus> {
    match raw {
        "ready" => Ok(DeploymentStatus::Ready),
        "migrating" => Ok(DeploymentStatus::Migrating),
        "failed" => Ok(DeploymentStatus::Failed),
        other => Err(DbError::invalid_data(format!(
            "unknown deployment status: {other}"
        ))),
    }
}

/// A deployment row.
#[derive(Debug, Clone, FromRow)]
pub struct DeploymentRow {
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    pub template_id: String,
    pub base_template_id: Option<String>,
    pub status: String,
    pub status_message: Option<String>,
}

impl DeploymentRow {
    pub fn into_deployment(self) -> DbResult<Deployment> {
        Ok(Deployment {
            id: DeploymentId::new(self.id),
            organization_id: OrganizationId::new(self.organization_id),
            project_id: self.project_id,
            template_id: TemplateId::new(self.template_id),
            base_template_id: self.base_template_id.map(TemplateId::new),
            status: status_from_str(&self.status)?,
            status_message: self.status_message,
        })
    }

    pub fn from_deployment(deployment: &Deployment) -> Self {
        Self {
            id: deployment.id.as_str().to_string(),
            organization_id: deployment.organization_id.as_str().to_string(),
            project_id: deployment.project_id.clone(),
            template_id: deployment.template_id.as_str().to_string(),
            base_template_id: deployment
                .base_template_id
                .as_ref()
                .map(|t| t.as_str().to_string()),
            status: status_to_str(deployment.status).to_string(),
            status_message: deployment.status_message.clone(),
        }
    }
}

/// A deployed-agent row.
#[derive(Debug, Clone, FromRow)]
pub struct DeployedAgentRow {
    pub agent_id: String,
    pub deployment_id: String,
    pub entity_id: String,
    pub name: String,
    pub template_id: String,
    pub base_template_id: Option<String>,
}

impl DeployedAgentRow {
    pub fn into_record(self) -> DeployedAgentRecord {
        DeployedAgentRecord {
            deployment_id: DeploymentId::new(self.deployment_id),
            entity_id: TemplateEntityId::new(self.entity_id),
            agent_id: LiveEntityId::new(self.agent_id),
            name: self.name,
            template_id: TemplateId::new(self.template_id),
            base_template_id: self.base_template_id.map(TemplateId::new),
        }
    }
}
