use miette::Diagnostic;
use thiserror::Error;

use crate::deployment::EntityKind;
use crate::id::{DeploymentId, LiveEntityId, TemplateEntityId, TemplateId};
use crate::template::ManagerType;

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Errors surfaced by the remote entity-management capability.
///
/// The engine never inspects wire details; collaborators map whatever their
/// transport produces into one of these.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{kind:?} not found in remote system: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("remote call rejected: {message}")]
    Rejected { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },
}

impl ApiError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    #[error("storage backend error: {message}")]
    Backend { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum MigrationError {
    #[error("Template not found: {template_id}")]
    #[diagnostic(
        code(loom_core::template_not_found),
        help("The template version this migration targets does not exist in the store")
    )]
    TemplateNotFound { template_id: TemplateId },

    #[error("No current version exists for base template {base_template_id}")]
    #[diagnostic(
        code(loom_core::current_version_not_found),
        help("Batch migration targets the mutable \"current\" draft; create one before migrating")
    )]
    CurrentVersionNotFound { base_template_id: TemplateId },

    #[error("Deployment not found: {deployment_id}")]
    #[diagnostic(code(loom_core::deployment_not_found))]
    DeploymentNotFound { deployment_id: DeploymentId },

    #[error("Deployment {deployment_id} has no live entities")]
    #[diagnostic(
        code(loom_core::deployment_entities_not_found),
        help("A deployment with zero live entities was never materialized; deploy it first")
    )]
    DeploymentEntitiesNotFound { deployment_id: DeploymentId },

    #[error("Deployment {deployment_id} is already migrating")]
    #[diagnostic(
        code(loom_core::deployment_busy),
        help("Another caller holds the migration claim; retry once it resolves to ready or failed")
    )]
    DeploymentBusy { deployment_id: DeploymentId },

    #[error("Model handle not found: {handle}")]
    #[diagnostic(
        code(loom_core::model_not_found),
        help(
            "No LLM configuration resolves for this handle. Use ModelFallback::FirstAvailable only in local development."
        )
    )]
    ModelNotFound { handle: String },

    #[error("Group manager type changed from {live:?} to {template:?}")]
    #[diagnostic(
        code(loom_core::manager_type_mismatch),
        help("Migrations cannot change a group's coordination topology; snapshot a new template family instead")
    )]
    ManagerTypeMismatch {
        live: ManagerType,
        template: Option<ManagerType>,
    },

    #[error("Manager agent {entity_id} not present among the deployment's agents")]
    #[diagnostic(
        code(loom_core::manager_agent_unresolved),
        help("The group configuration must name a manager entity id that the target template version deploys")
    )]
    ManagerAgentUnresolved { entity_id: String },

    #[error("Template {template_id} declares no {kind:?} for entity {entity_id}")]
    #[diagnostic(
        code(loom_core::template_entity_missing),
        help("The entity-template rows and the diff disagree; the store snapshot is inconsistent")
    )]
    TemplateEntityMissing {
        template_id: TemplateId,
        kind: EntityKind,
        entity_id: TemplateEntityId,
    },

    #[error("Orphaned live entity {live_id}: {cause}")]
    #[diagnostic(
        code(loom_core::orphaned_entity),
        help("The remote create succeeded but the paired local write failed; the live entity is not tracked")
    )]
    OrphanedEntity {
        live_id: LiveEntityId,
        #[source]
        cause: Box<MigrationError>,
    },

    #[error("Remote entity API error")]
    #[diagnostic(code(loom_core::api_error))]
    Api(#[from] ApiError),

    #[error("Store error")]
    #[diagnostic(code(loom_core::store_error))]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    #[diagnostic(code(loom_core::config_error))]
    Config { message: String },
}

impl MigrationError {
    /// Human-readable message recorded on a failed deployment.
    ///
    /// Source-chain detail is flattened so an operator reading the
    /// deployment row sees the underlying cause, not just the top frame.
    pub fn status_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        if message.trim().is_empty() {
            "migration failed".to_string()
        } else {
            message
        }
    }
}
