//! Damage steps: named phases of a damage calculation.

use std::fmt;
use std::str::FromStr;

use quarry_common::{EventError, EventResult, ModifierId};
use serde::{Deserialize, Serialize};

use crate::modifier::{parse_key, DamageModifier, NAMESPACE};

/// Named phase of the calculation that modifiers are grouped under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageStepType {
    /// Absorption effect on the target.
    Absorption,
    /// Worn armor.
    Armor,
    /// Enchantments on worn armor.
    ArmorEnchantment,
    /// Attack cooldown applied to the base damage.
    BaseCooldown,
    /// Critical hit.
    CriticalHit,
    /// Resistance-like potion effects.
    DefensivePotionEffect,
    /// World difficulty scaling.
    Difficulty,
    /// Attack cooldown applied to enchantment damage.
    EnchantmentCooldown,
    /// Extra damage from freezing sources.
    FreezingBonus,
    /// Helmet against falling blocks.
    HardHat,
    /// Magic.
    Magic,
    /// Potion effects weakening the attacker.
    NegativePotionEffect,
    /// Potion effects strengthening the attacker.
    OffensivePotionEffect,
    /// Blocking with a shield.
    Shield,
    /// Sweeping attack.
    Sweeping,
    /// Bonus damage from the weapon used.
    WeaponBonus,
    /// Enchantments on the held weapon.
    WeaponEnchantment,
    /// Plugin-defined step, identified by its full key.
    Custom(String),
}

impl DamageStepType {
    /// All built-in step types.
    pub const BUILT_IN: [Self; 17] = [
        Self::Absorption,
        Self::Armor,
        Self::ArmorEnchantment,
        Self::BaseCooldown,
        Self::CriticalHit,
        Self::DefensivePotionEffect,
        Self::Difficulty,
        Self::EnchantmentCooldown,
        Self::FreezingBonus,
        Self::HardHat,
        Self::Magic,
        Self::NegativePotionEffect,
        Self::OffensivePotionEffect,
        Self::Shield,
        Self::Sweeping,
        Self::WeaponBonus,
        Self::WeaponEnchantment,
    ];

    /// Creates a plugin-defined step type.
    #[must_use]
    pub fn custom(key: impl Into<String>) -> Self {
        Self::Custom(key.into())
    }

    /// Short name of the step, without namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Absorption => "absorption",
            Self::Armor => "armor",
            Self::ArmorEnchantment => "armor_enchantment",
            Self::BaseCooldown => "base_cooldown",
            Self::CriticalHit => "critical_hit",
            Self::DefensivePotionEffect => "defensive_potion_effect",
            Self::Difficulty => "difficulty",
            Self::EnchantmentCooldown => "enchantment_cooldown",
            Self::FreezingBonus => "freezing_bonus",
            Self::HardHat => "hard_hat",
            Self::Magic => "magic",
            Self::NegativePotionEffect => "negative_potion_effect",
            Self::OffensivePotionEffect => "offensive_potion_effect",
            Self::Shield => "shield",
            Self::Sweeping => "sweeping",
            Self::WeaponBonus => "weapon_bonus",
            Self::WeaponEnchantment => "weapon_enchantment",
            Self::Custom(key) => key,
        }
    }

    /// Namespaced registry key, e.g. `quarry:armor`.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Custom(key) => key.clone(),
            other => format!("{NAMESPACE}:{}", other.name()),
        }
    }

    /// Check if this step reduces incoming damage rather than shaping an attack.
    #[must_use]
    pub fn is_defensive(&self) -> bool {
        matches!(
            self,
            Self::Absorption
                | Self::Armor
                | Self::ArmorEnchantment
                | Self::DefensivePotionEffect
                | Self::HardHat
                | Self::Shield
        )
    }
}

impl fmt::Display for DamageStepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for DamageStepType {
    type Err = EventError;

    fn from_str(key: &str) -> EventResult<Self> {
        parse_key(key, "damage step type", Self::BUILT_IN, Self::name, Self::Custom)
    }
}

/// The value a single modifier produced during a reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedModifier {
    /// Modifier that ran.
    pub modifier: DamageModifier,
    /// Running damage before the modifier.
    pub input: f64,
    /// Running damage after the modifier.
    pub output: f64,
}

impl AppliedModifier {
    /// Change this modifier made to the running damage.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.output - self.input
    }
}

/// A captured phase of a finished reduction. Read-only once captured.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageStep {
    step_type: DamageStepType,
    input: f64,
    output: f64,
    modifiers: Vec<AppliedModifier>,
}

impl DamageStep {
    pub(crate) fn new(step_type: DamageStepType, input: f64) -> Self {
        Self {
            step_type,
            input,
            output: input,
            modifiers: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, applied: AppliedModifier) {
        self.output = applied.output;
        self.modifiers.push(applied);
    }

    /// Step type.
    #[must_use]
    pub fn step_type(&self) -> &DamageStepType {
        &self.step_type
    }

    /// Damage entering the step.
    #[must_use]
    pub fn damage_before(&self) -> f64 {
        self.input
    }

    /// Damage leaving the step.
    #[must_use]
    pub fn damage_after(&self) -> f64 {
        self.output
    }

    /// Modifiers applied in this step, in application order.
    #[must_use]
    pub fn modifiers(&self) -> &[AppliedModifier] {
        &self.modifiers
    }

    /// Identities of the modifiers in this step.
    pub fn modifier_ids(&self) -> impl Iterator<Item = ModifierId> + '_ {
        self.modifiers.iter().map(|applied| applied.modifier.id())
    }
}
