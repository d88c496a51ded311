//! Damage sources: what dealt the damage and how it behaves.

use glam::DVec3;
use quarry_common::{EntityId, EventError, EventResult};
use serde::{Deserialize, Serialize};

/// How a damage type scales with world difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageScaling {
    /// Never scaled.
    Never,
    /// Scaled only when the attacker is a living non-player entity.
    WhenCausedByLivingNonPlayer,
    /// Always scaled.
    Always,
}

/// Type of damage being dealt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    /// Unspecified damage.
    Generic,
    /// Melee attack by a player.
    PlayerAttack,
    /// Melee attack by a mob.
    MobAttack,
    /// Projectile hit.
    Arrow,
    /// Explosion.
    Explosion,
    /// Falling.
    Fall,
    /// Hit by a falling block.
    FallingBlock,
    /// Standing in or burning from fire.
    Fire,
    /// Lava contact.
    Lava,
    /// Running out of air.
    Drowning,
    /// Powder snow freezing.
    Freeze,
    /// Instant damage potions and similar.
    Magic,
    /// Wither effect.
    Wither,
    /// Hunger.
    Starvation,
    /// Falling below the world.
    OutOfWorld,
    /// Plugin-defined type.
    Custom(String),
}

impl DamageType {
    /// Check if armor is ignored.
    #[must_use]
    pub fn bypasses_armor(&self) -> bool {
        matches!(
            self,
            Self::Fall
                | Self::Drowning
                | Self::Freeze
                | Self::Magic
                | Self::Wither
                | Self::Starvation
                | Self::OutOfWorld
        )
    }

    /// Check if potion effects such as resistance are ignored.
    #[must_use]
    pub fn bypasses_effects(&self) -> bool {
        matches!(self, Self::Starvation | Self::OutOfWorld)
    }

    /// Check if protective enchantments are ignored.
    #[must_use]
    pub fn bypasses_enchantments(&self) -> bool {
        matches!(self, Self::OutOfWorld)
    }

    /// Check if this is explosion damage.
    #[must_use]
    pub fn is_explosion(&self) -> bool {
        matches!(self, Self::Explosion)
    }

    /// Check if this is fire damage.
    #[must_use]
    pub fn is_fire(&self) -> bool {
        matches!(self, Self::Fire | Self::Lava)
    }

    /// Difficulty scaling rule.
    #[must_use]
    pub fn scaling(&self) -> DamageScaling {
        match self {
            Self::Explosion => DamageScaling::Always,
            Self::Generic | Self::Starvation | Self::OutOfWorld | Self::Custom(_) => {
                DamageScaling::Never
            },
            _ => DamageScaling::WhenCausedByLivingNonPlayer,
        }
    }

    /// Hunger exhaustion caused by taking this damage.
    #[must_use]
    pub fn exhaustion(&self) -> f64 {
        match self {
            Self::PlayerAttack | Self::MobAttack | Self::Arrow | Self::Explosion => 0.1,
            Self::Fire | Self::Lava | Self::FallingBlock | Self::Generic => 0.1,
            _ => 0.0,
        }
    }
}

/// What dealt the damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageSource {
    damage_type: DamageType,
    source: Option<EntityId>,
    indirect_source: Option<EntityId>,
    position: Option<DVec3>,
    affects_creative: bool,
}

impl DamageSource {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> DamageSourceBuilder {
        DamageSourceBuilder::default()
    }

    fn environment(damage_type: DamageType) -> Self {
        Self {
            damage_type,
            source: None,
            indirect_source: None,
            position: None,
            affects_creative: false,
        }
    }

    /// Unspecified damage.
    #[must_use]
    pub fn generic() -> Self {
        Self::environment(DamageType::Generic)
    }

    /// Drowning.
    #[must_use]
    pub fn drowning() -> Self {
        Self::environment(DamageType::Drowning)
    }

    /// Falling.
    #[must_use]
    pub fn falling() -> Self {
        Self::environment(DamageType::Fall)
    }

    /// Burning.
    #[must_use]
    pub fn fire_tick() -> Self {
        Self::environment(DamageType::Fire)
    }

    /// Magic.
    #[must_use]
    pub fn magic() -> Self {
        Self::environment(DamageType::Magic)
    }

    /// Starvation.
    #[must_use]
    pub fn starvation() -> Self {
        Self::environment(DamageType::Starvation)
    }

    /// Falling out of the world. Affects creative players.
    #[must_use]
    pub fn void_source() -> Self {
        Self {
            affects_creative: true,
            ..Self::environment(DamageType::OutOfWorld)
        }
    }

    /// Wither effect.
    #[must_use]
    pub fn wither() -> Self {
        Self::environment(DamageType::Wither)
    }

    /// Type of damage.
    #[must_use]
    pub fn damage_type(&self) -> &DamageType {
        &self.damage_type
    }

    /// Entity that directly dealt the damage.
    #[must_use]
    pub fn source(&self) -> Option<EntityId> {
        self.source
    }

    /// Entity behind the direct source, e.g. the shooter of an arrow.
    #[must_use]
    pub fn indirect_source(&self) -> Option<EntityId> {
        self.indirect_source
    }

    /// Where the damage originated.
    #[must_use]
    pub fn position(&self) -> Option<DVec3> {
        self.position
    }

    /// Check if creative players are affected.
    #[must_use]
    pub fn does_affect_creative(&self) -> bool {
        self.affects_creative
    }

    /// Check if effects and enchantments are both ignored.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.damage_type.bypasses_effects() && self.damage_type.bypasses_enchantments()
    }

    /// Check if armor is ignored.
    #[must_use]
    pub fn is_bypassing_armor(&self) -> bool {
        self.damage_type.bypasses_armor()
    }

    /// Check if difficulty may scale the damage.
    #[must_use]
    pub fn is_scaled_by_difficulty(&self) -> bool {
        self.damage_type.scaling() != DamageScaling::Never
    }

    /// Check if this is an explosion.
    #[must_use]
    pub fn is_explosive(&self) -> bool {
        self.damage_type.is_explosion()
    }

    /// Check if this is magic.
    #[must_use]
    pub fn is_magic(&self) -> bool {
        self.damage_type == DamageType::Magic
    }

    /// Check if this is fire.
    #[must_use]
    pub fn is_fire(&self) -> bool {
        self.damage_type.is_fire()
    }

    /// Hunger exhaustion caused by this damage.
    #[must_use]
    pub fn exhaustion(&self) -> f64 {
        self.damage_type.exhaustion()
    }
}

/// Builder for [`DamageSource`].
#[derive(Debug, Clone, Default)]
pub struct DamageSourceBuilder {
    damage_type: Option<DamageType>,
    source: Option<EntityId>,
    indirect_source: Option<EntityId>,
    position: Option<DVec3>,
    affects_creative: bool,
}

impl DamageSourceBuilder {
    /// Set the damage type.
    #[must_use]
    pub fn damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = Some(damage_type);
        self
    }

    /// Set the direct source entity.
    #[must_use]
    pub fn entity(mut self, entity: EntityId) -> Self {
        self.source = Some(entity);
        self
    }

    /// Set the indirect source entity.
    #[must_use]
    pub fn indirect_entity(mut self, entity: EntityId) -> Self {
        self.indirect_source = Some(entity);
        self
    }

    /// Set the origin position.
    #[must_use]
    pub fn position(mut self, position: DVec3) -> Self {
        self.position = Some(position);
        self
    }

    /// Let the damage affect creative players.
    #[must_use]
    pub fn affects_creative(mut self) -> Self {
        self.affects_creative = true;
        self
    }

    /// Build the source.
    pub fn build(self) -> EventResult<DamageSource> {
        let damage_type = self.damage_type.ok_or(EventError::MissingField {
            builder: "DamageSourceBuilder",
            field: "damage_type",
        })?;
        Ok(DamageSource {
            damage_type,
            source: self.source,
            indirect_source: self.indirect_source,
            position: self.position,
            affects_creative: self.affects_creative,
        })
    }
}
