//! Deployments and their live entities

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::id::{DeploymentId, LiveEntityId, OrganizationId, TemplateEntityId, TemplateId};

/// Lifecycle status of a deployment.
///
/// Only the migration engine writes `Migrating` and `Failed`; `Migrating`
/// doubles as the migration claim (checked-and-set atomically by the
/// store), so a deployment observed in this state is owned by a running
/// migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Ready,
    Migrating,
    Failed,
}

/// One materialized instantiation of a template.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Deployment {
    pub id: DeploymentId,
    pub organization_id: OrganizationId,
    pub project_id: String,
    /// The template version this deployment currently points at
    pub template_id: TemplateId,
    pub base_template_id: Option<TemplateId>,
    pub status: DeploymentStatus,
    /// Human-readable failure reason, set on terminal failure
    pub status_message: Option<String>,
}

/// Kind of a live (or template-declared) entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Agent,
    Block,
    Group,
}

/// A live entity belonging to a deployment, as reported by the remote
/// system's "list deployment entities" query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentEntity {
    pub kind: EntityKind,
    /// The remote system's id for this entity
    pub live_id: LiveEntityId,
    /// The stable template-scoped key this entity was created from
    pub entity_id: TemplateEntityId,
}

/// Live entity set of a deployment after a successful migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentEntities {
    pub agents: Vec<DeploymentEntity>,
    pub blocks: Vec<DeploymentEntity>,
    pub group: Option<DeploymentEntity>,
}

impl DeploymentEntities {
    /// Partition a flat entity listing by kind. At most one group is kept;
    /// the remote system enforces the one-group-per-deployment invariant.
    pub fn from_listing(entities: Vec<DeploymentEntity>) -> Self {
        let mut out = Self::default();
        for entity in entities {
            match entity.kind {
                EntityKind::Agent => out.agents.push(entity),
                EntityKind::Block => out.blocks.push(entity),
                EntityKind::Group => out.group = Some(entity),
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.blocks.is_empty() && self.group.is_none()
    }
}

/// Provenance tags stamped on every entity the engine creates or updates,
/// so future migrations can re-derive the diff join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProvenanceTags {
    pub deployment_id: DeploymentId,
    pub template_id: TemplateId,
    pub base_template_id: Option<TemplateId>,
    pub entity_id: TemplateEntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(kind: EntityKind, live: &str, stable: &str) -> DeploymentEntity {
        DeploymentEntity {
            kind,
            live_id: LiveEntityId::new(live),
            entity_id: TemplateEntityId::new(stable),
        }
    }

    #[test]
    fn listing_partitions_by_kind() {
        let listed = vec![
            entity(EntityKind::Agent, "a1", "e1"),
            entity(EntityKind::Block, "b1", "e2"),
            entity(EntityKind::Group, "g1", "e3"),
            entity(EntityKind::Block, "b2", "e4"),
        ];
        let parts = DeploymentEntities::from_listing(listed);
        assert_eq!(parts.agents.len(), 1);
        assert_eq!(parts.blocks.len(), 2);
        assert_eq!(parts.group.unwrap().live_id, LiveEntityId::new("g1"));
    }
}
