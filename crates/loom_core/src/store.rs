//! Persistence capability consumed by the migration engine
//!
//! The relational store owns templates, entity templates, deployments, and
//! deployed-agent variables. The engine only depends on this trait; the
//! SQLite binding lives in the `loom-db` crate.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deployment::Deployment;
use crate::error::StoreError;
use crate::id::{DeploymentId, LiveEntityId, OrganizationId, TemplateEntityId, TemplateId};
use crate::template::{AgentTemplate, BlockAssociation, BlockTemplate, Template};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Terminal outcome written when a migration resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeploymentOutcome {
    /// Migration succeeded; the deployment now points at `template_id`
    Ready { template_id: TemplateId },
    /// Migration failed; `message` is the operator-facing reason
    Failed { message: String },
}

/// Local record for an agent created during migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedAgentRecord {
    pub deployment_id: DeploymentId,
    pub entity_id: TemplateEntityId,
    pub agent_id: LiveEntityId,
    pub name: String,
    pub template_id: TemplateId,
    pub base_template_id: Option<TemplateId>,
}

#[async_trait]
pub trait MigrationStore: Send + Sync {
    async fn template(&self, id: &TemplateId) -> StoreResult<Option<Template>>;

    /// The mutable `"current"` draft of a template family, if one exists.
    async fn current_template_version(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
    ) -> StoreResult<Option<Template>>;

    async fn agent_templates(&self, template_id: &TemplateId) -> StoreResult<Vec<AgentTemplate>>;

    async fn block_templates(&self, template_id: &TemplateId) -> StoreResult<Vec<BlockTemplate>>;

    async fn block_associations(
        &self,
        template_id: &TemplateId,
    ) -> StoreResult<Vec<BlockAssociation>>;

    async fn deployment(&self, id: &DeploymentId) -> StoreResult<Option<Deployment>>;

    /// Atomically claim a deployment for migration by moving it to
    /// `migrating` if and only if it is not already there. Returns whether
    /// this caller won the claim. The claim is the per-deployment lease
    /// that serializes concurrent migrations.
    async fn claim_deployment(&self, id: &DeploymentId) -> StoreResult<bool>;

    /// Write the terminal status. Must never leave the deployment in
    /// `migrating`.
    async fn finish_deployment(
        &self,
        id: &DeploymentId,
        outcome: DeploymentOutcome,
    ) -> StoreResult<()>;

    async fn count_deployments(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
    ) -> StoreResult<u64>;

    async fn deployments_page(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<Deployment>>;

    /// Stored variables for a deployed agent; empty map when none exist.
    async fn agent_variables(
        &self,
        agent_id: &LiveEntityId,
    ) -> StoreResult<HashMap<String, String>>;

    async fn put_agent_variables(
        &self,
        agent_id: &LiveEntityId,
        variables: &HashMap<String, String>,
    ) -> StoreResult<()>;

    /// Record a freshly created agent and seed its variables in one local
    /// transaction.
    async fn record_deployed_agent(
        &self,
        record: &DeployedAgentRecord,
        seed_variables: &HashMap<String, String>,
    ) -> StoreResult<()>;
}
