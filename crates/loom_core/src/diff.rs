//! Entity diff calculator
//!
//! Pure set arithmetic over two views of a deployment: the live entities
//! the remote system reports, and the entities the target template version
//! declares. The join key is the stable [`TemplateEntityId`]; the remote
//! system's own ids never participate in the join.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::deployment::DeploymentEntity;
use crate::id::{LiveEntityId, TemplateEntityId};

/// A live entity's identity pair, as the diff sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_id: TemplateEntityId,
    pub live_id: LiveEntityId,
}

impl From<&DeploymentEntity> for EntityRef {
    fn from(entity: &DeploymentEntity) -> Self {
        EntityRef {
            entity_id: entity.entity_id.clone(),
            live_id: entity.live_id.clone(),
        }
    }
}

/// Disjoint action buckets for one entity kind.
///
/// Entities present in both views always land in `to_update`; the engine
/// does not attempt field-level change detection, because updates are
/// idempotent on the remote side and cheap relative to a mis-skipped one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityDiff {
    /// Live but no longer declared: delete from the remote system
    pub to_delete: Vec<EntityRef>,
    /// Declared but not live: create
    pub to_add: Vec<TemplateEntityId>,
    /// Present on both sides: push the template's current shape
    pub to_update: Vec<EntityRef>,
}

impl EntityDiff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty() && self.to_update.is_empty()
    }
}

/// Compute the add/update/delete sets for one entity kind.
pub fn diff(existing: &[EntityRef], desired: &[TemplateEntityId]) -> EntityDiff {
    let desired_ids: HashSet<&TemplateEntityId> = desired.iter().collect();
    let existing_ids: HashSet<&TemplateEntityId> = existing.iter().map(|e| &e.entity_id).collect();

    let mut out = EntityDiff::default();
    for entity in existing {
        if desired_ids.contains(&entity.entity_id) {
            out.to_update.push(entity.clone());
        } else {
            out.to_delete.push(entity.clone());
        }
    }
    for entity_id in desired {
        if !existing_ids.contains(entity_id) {
            out.to_add.push(entity_id.clone());
        }
    }
    out
}
