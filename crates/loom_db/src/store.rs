//! SQLite-backed implementation of the engine's store trait.

use std::collections::HashMap;

use async_trait::async_trait;

use loom_core::{
    AgentTemplate, BlockAssociation, BlockTemplate, DeployedAgentRecord, Deployment, DeploymentId,
    DeploymentOutcome, LiveEntityId, MigrationStore, OrganizationId, StoreError, StoreResult,
    Template, TemplateId,
};

use crate::connection::MigrationDb;
use crate::error::DbError;
use crate::models::{DeployedAgentRow, DeploymentRow, TemplateRow};
use crate::queries;

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity_type, id } => StoreError::not_found(entity_type, id),
            DbError::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::backend(other.to_string()),
        }
    }
}

/// The SQLite store. Cheap to clone; wraps a connection pool.
#[derive(Debug, Clone)]
pub struct SqliteMigrationStore {
    db: MigrationDb,
}

impl SqliteMigrationStore {
    pub fn new(db: MigrationDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &MigrationDb {
        &self.db
    }

    // Seeding helpers, used by tests and by whatever ingests templates.

    pub async fn put_template(&self, template: &Template) -> StoreResult<()> {
        let row = TemplateRow::from_template(template);
        queries::templates::insert_template(self.db.pool(), &row).await?;
        Ok(())
    }

    pub async fn put_agent_template(
        &self,
        template_id: &TemplateId,
        agent: &AgentTemplate,
    ) -> StoreResult<()> {
        let row = crate::models::AgentTemplateRow::from_agent_template(agent);
        queries::templates::insert_agent_template(self.db.pool(), template_id.as_str(), &row)
            .await?;
        Ok(())
    }

    pub async fn put_block_template(
        &self,
        template_id: &TemplateId,
        block: &BlockTemplate,
    ) -> StoreResult<()> {
        let row = crate::models::BlockTemplateRow::from_block_template(block);
        queries::templates::insert_block_template(self.db.pool(), template_id.as_str(), &row)
            .await?;
        Ok(())
    }

    pub async fn put_block_association(
        &self,
        template_id: &TemplateId,
        association: &BlockAssociation,
    ) -> StoreResult<()> {
        queries::templates::insert_association(
            self.db.pool(),
            template_id.as_str(),
            association.agent_entity_id.as_str(),
            association.block_entity_id.as_str(),
        )
        .await?;
        Ok(())
    }

    pub async fn put_deployment(&self, deployment: &Deployment) -> StoreResult<()> {
        let row = DeploymentRow::from_deployment(deployment);
        queries::deployments::insert_deployment(self.db.pool(), &row).await?;
        Ok(())
    }

    /// The local record for an agent created by a migration, if one exists.
    pub async fn deployed_agent(
        &self,
        agent_id: &LiveEntityId,
    ) -> StoreResult<Option<DeployedAgentRecord>> {
        let row = queries::variables::get_deployed_agent(self.db.pool(), agent_id.as_str()).await?;
        Ok(row.map(|r| r.into_record()))
    }
}

#[async_trait]
impl MigrationStore for SqliteMigrationStore {
    async fn template(&self, id: &TemplateId) -> StoreResult<Option<Template>> {
        let row = queries::templates::get_template(self.db.pool(), id.as_str()).await?;
        row.map(|r| r.into_template().map_err(StoreError::from))
            .transpose()
    }

    async fn current_template_version(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
    ) -> StoreResult<Option<Template>> {
        let row = queries::templates::get_current_version(
            self.db.pool(),
            base_template_id.as_str(),
            organization_id.as_str(),
        )
        .await?;
        row.map(|r| r.into_template().map_err(StoreError::from))
            .transpose()
    }

    async fn agent_templates(&self, template_id: &TemplateId) -> StoreResult<Vec<AgentTemplate>> {
        let rows =
            queries::templates::list_agent_templates(self.db.pool(), template_id.as_str()).await?;
        Ok(rows.into_iter().map(|r| r.into_agent_template()).collect())
    }

    async fn block_templates(&self, template_id: &TemplateId) -> StoreResult<Vec<BlockTemplate>> {
        let rows =
            queries::templates::list_block_templates(self.db.pool(), template_id.as_str()).await?;
        Ok(rows.into_iter().map(|r| r.into_block_template()).collect())
    }

    async fn block_associations(
        &self,
        template_id: &TemplateId,
    ) -> StoreResult<Vec<BlockAssociation>> {
        let rows =
            queries::templates::list_associations(self.db.pool(), template_id.as_str()).await?;
        Ok(rows.into_iter().map(|r| r.into_association()).collect())
    }

    async fn deployment(&self, id: &DeploymentId) -> StoreResult<Option<Deployment>> {
        let row = queries::deployments::get_deployment(self.db.pool(), id.as_str()).await?;
        row.map(|r| r.into_deployment().map_err(StoreError::from))
            .transpose()
    }

    async fn claim_deployment(&self, id: &DeploymentId) -> StoreResult<bool> {
        let claimed = queries::deployments::claim_deployment(self.db.pool(), id.as_str()).await?;
        Ok(claimed)
    }

    async fn finish_deployment(
        &self,
        id: &DeploymentId,
        outcome: DeploymentOutcome,
    ) -> StoreResult<()> {
        match outcome {
            DeploymentOutcome::Ready { template_id } => {
                queries::deployments::mark_ready(self.db.pool(), id.as_str(), template_id.as_str())
                    .await?
            }
            DeploymentOutcome::Failed { message } => {
                queries::deployments::mark_failed(self.db.pool(), id.as_str(), &message).await?
            }
        }
        Ok(())
    }

    async fn count_deployments(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
    ) -> StoreResult<u64> {
        let count = queries::deployments::count_deployments(
            self.db.pool(),
            base_template_id.as_str(),
            organization_id.as_str(),
        )
        .await?;
        Ok(count)
    }

    async fn deployments_page(
        &self,
        base_template_id: &TemplateId,
        organization_id: &OrganizationId,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<Deployment>> {
        let rows = queries::deployments::list_deployments_page(
            self.db.pool(),
            base_template_id.as_str(),
            organization_id.as_str(),
            offset,
            limit,
        )
        .await?;
        rows.into_iter()
            .map(|r| r.into_deployment().map_err(StoreError::from))
            .collect()
    }

    async fn agent_variables(
        &self,
        agent_id: &LiveEntityId,
    ) -> StoreResult<HashMap<String, String>> {
        let vars = queries::variables::get_agent_variables(self.db.pool(), agent_id.as_str())
            .await?;
        Ok(vars)
    }

    async fn put_agent_variables(
        &self,
        agent_id: &LiveEntityId,
        variables: &HashMap<String, String>,
    ) -> StoreResult<()> {
        queries::variables::replace_agent_variables(self.db.pool(), agent_id.as_str(), variables)
            .await?;
        Ok(())
    }

    async fn record_deployed_agent(
        &self,
        record: &DeployedAgentRecord,
        seed_variables: &HashMap<String, String>,
    ) -> StoreResult<()> {
        let row = DeployedAgentRow {
            agent_id: record.agent_id.as_str().to_string(),
            deployment_id: record.deployment_id.as_str().to_string(),
            entity_id: record.entity_id.as_str().to_string(),
            name: record.name.clone(),
            template_id: record.template_id.as_str().to_string(),
            base_template_id: record
                .base_template_id
                .as_ref()
                .map(|t| t.as_str().to_string()),
        };
        queries::variables::insert_deployed_agent(self.db.pool(), &row, seed_variables).await?;
        Ok(())
    }
}
