//! Loom Core - Template-to-Deployment Migration Engine
//!
//! This crate reconciles live deployments (agents, memory blocks, and
//! coordination groups materialized in a remote agent system) against
//! newer versions of the template they were created from: it diffs the
//! two entity graphs on stable template-scoped ids, applies the minimal
//! create/update/delete set through the remote entity API, tracks each
//! deployment's status machine, and scales across template families in
//! batches with per-deployment failure isolation.
//!
//! The remote entity API, the relational store, and model-handle
//! resolution are injected collaborators ([`EntityApi`],
//! [`MigrationStore`], [`ModelResolver`]); this crate supplies the
//! reconciliation logic only. See the `loom-db` crate for the SQLite
//! store binding.

pub mod api;
pub mod config;
pub mod deployment;
pub mod diff;
pub mod error;
pub mod id;
pub mod model;
pub mod names;
pub mod reconcile;
pub mod store;
pub mod template;
pub mod vars;

pub use api::{
    AgentDetail, CreateAgentRequest, CreateBlockRequest, EntityApi, GroupDetail, LlmConfig,
    ManagerConfig, UpdateAgentRequest, UpdateBlockRequest, UpdateGroupRequest,
};
pub use config::EngineConfig;
pub use deployment::{
    Deployment, DeploymentEntities, DeploymentEntity, DeploymentStatus, EntityKind, ProvenanceTags,
};
pub use diff::{diff, EntityDiff, EntityRef};
pub use error::{ApiError, MigrationError, Result, StoreError};
pub use id::{
    ActorId, DeploymentId, IdType, LiveEntityId, OrganizationId, TemplateEntityId, TemplateId,
};
pub use model::{CachedModelResolver, ModelFallback, ModelResolver};
pub use reconcile::{
    BatchMigrationReport, BatchMigrationRequest, DeploymentFailure, MigrationEngine,
    MigrationRequest,
};
pub use store::{DeployedAgentRecord, DeploymentOutcome, MigrationStore, StoreResult};
pub use template::{
    AgentOverrides, AgentTemplate, BlockAssociation, BlockTemplate, GroupConfig, ManagerType,
    Template, TemplateVersion,
};
