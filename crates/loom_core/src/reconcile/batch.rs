//! Batch migration orchestrator
//!
//! Drives single-deployment migration across every deployment of a
//! template family's `"current"` version, in fixed-width pages with
//! per-deployment failure isolation.

use std::collections::HashMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{MigrationEngine, MigrationRequest};
use crate::error::{MigrationError, Result};
use crate::id::{ActorId, DeploymentId, OrganizationId, TemplateId};

/// Options for a template-family-wide migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMigrationRequest {
    pub base_template_id: TemplateId,
    pub organization_id: OrganizationId,
    pub actor_id: ActorId,
    #[serde(default)]
    pub preserve_core_memories: bool,
    #[serde(default)]
    pub preserve_tool_variables: bool,
    #[serde(default)]
    pub memory_variables: HashMap<String, String>,
    /// Page width; falls back to the engine config default (10)
    pub batch_size: Option<usize>,
}

/// One deployment's failure inside a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentFailure {
    pub deployment_id: DeploymentId,
    pub message: String,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchMigrationReport {
    pub total_deployments: u64,
    pub successful_migrations: u64,
    pub failed_migrations: u64,
    pub errors: Vec<DeploymentFailure>,
}

impl MigrationEngine {
    /// Migrate every deployment of `base_template_id` onto the family's
    /// current version.
    ///
    /// The only hard failure is the initial current-version lookup.
    /// Individual deployment failures (including lost claims) are
    /// captured per item and never cancel siblings; the offset advances
    /// by the full batch width regardless of in-page failures.
    pub async fn migrate_all_by_base_template(
        &self,
        request: &BatchMigrationRequest,
    ) -> Result<BatchMigrationReport> {
        let current = self
            .store
            .current_template_version(&request.base_template_id, &request.organization_id)
            .await?
            .ok_or_else(|| MigrationError::CurrentVersionNotFound {
                base_template_id: request.base_template_id.clone(),
            })?;

        let batch_size = request
            .batch_size
            .unwrap_or(self.config.default_batch_size)
            .max(1) as u64;

        // Point-in-time snapshot: deployments created during the run are
        // not picked up; ones deleted mid-run surface as per-item errors.
        let total = self
            .store
            .count_deployments(&request.base_template_id, &request.organization_id)
            .await?;

        info!(
            base_template = %request.base_template_id,
            current_version = %current.id,
            total,
            batch_size,
            "starting batch migration"
        );

        let mut report = BatchMigrationReport {
            total_deployments: total,
            ..Default::default()
        };

        let mut offset = 0u64;
        while offset < total {
            let page = self
                .store
                .deployments_page(
                    &request.base_template_id,
                    &request.organization_id,
                    offset,
                    batch_size,
                )
                .await?;

            let outcomes = join_all(page.iter().map(|deployment| {
                let migration = MigrationRequest {
                    deployment_id: deployment.id.clone(),
                    template_id: current.id.clone(),
                    organization_id: request.organization_id.clone(),
                    actor_id: request.actor_id.clone(),
                    base_template_id: Some(request.base_template_id.clone()),
                    preserve_core_memories: request.preserve_core_memories,
                    preserve_tool_variables: request.preserve_tool_variables,
                    memory_variables: request.memory_variables.clone(),
                };
                let deployment_id = deployment.id.clone();
                async move {
                    (
                        deployment_id,
                        self.migrate_deployment_entities(migration).await,
                    )
                }
            }))
            .await;

            for (deployment_id, outcome) in outcomes {
                match outcome {
                    Ok(_) => report.successful_migrations += 1,
                    Err(error) => {
                        report.failed_migrations += 1;
                        report.errors.push(DeploymentFailure {
                            deployment_id,
                            message: error.status_message(),
                        });
                    }
                }
            }

            offset += batch_size;
        }

        info!(
            base_template = %request.base_template_id,
            succeeded = report.successful_migrations,
            failed = report.failed_migrations,
            "batch migration finished"
        );
        Ok(report)
    }
}
