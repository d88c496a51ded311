//! Snapshots of the entities taking part in a damage event.

use glam::DVec3;
use quarry_common::EntityId;
use serde::{Deserialize, Serialize};

/// State of the damaged entity as the host reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    /// Damaged entity.
    pub entity: EntityId,
    /// Current health, `None` for entities without a health pool.
    pub health: Option<f64>,
    /// Maximum health.
    pub max_health: Option<f64>,
    /// Position of the entity.
    pub position: Option<DVec3>,
}

impl TargetSnapshot {
    /// Living target with the given health.
    #[must_use]
    pub fn living(entity: EntityId, health: f64, max_health: f64) -> Self {
        Self {
            entity,
            health: Some(health),
            max_health: Some(max_health),
            position: None,
        }
    }

    /// Target without a health pool (item frames, boats, ...).
    #[must_use]
    pub fn inanimate(entity: EntityId) -> Self {
        Self {
            entity,
            health: None,
            max_health: None,
            position: None,
        }
    }

    /// Set position (builder pattern).
    #[must_use]
    pub fn with_position(mut self, position: DVec3) -> Self {
        self.position = Some(position);
        self
    }

    /// Health as a fraction of max health.
    #[must_use]
    pub fn health_fraction(&self) -> Option<f64> {
        match (self.health, self.max_health) {
            (Some(health), Some(max)) if max > 0.0 => Some((health / max).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

/// Role an entity plays in a damage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotRole {
    /// The damaged entity.
    Target,
    /// The entity that directly dealt the damage.
    Source,
    /// The entity behind the direct source.
    IndirectSource,
}

/// Frozen view of an entity, captured when the Pre phase resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity.
    pub entity: EntityId,
    /// Role in the event.
    pub role: SnapshotRole,
    /// Health at capture time, when known.
    pub health: Option<f64>,
    /// Position at capture time, when known.
    pub position: Option<DVec3>,
}
