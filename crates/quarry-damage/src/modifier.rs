//! Damage modifiers and the functions attached to them.
//!
//! This module provides:
//! - The closed set of modifier types (armor, critical hit, absorption, ...)
//! - Modifier groups and contributing sources
//! - `DamageModifier`, an identity token built through `DamageModifierBuilder`
//! - `DamageFunction`, a modifier paired with its `f64 -> f64` transform

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use quarry_common::{EntityId, EventError, EventResult, ModifierId};
use serde::{Deserialize, Serialize};

use crate::step::DamageStepType;

/// Namespace used for the built-in registry keys.
pub const NAMESPACE: &str = "quarry";

/// Parse a `namespace:name` registry key.
///
/// Keys in [`NAMESPACE`] must name one of `built_in`. Keys in any other
/// namespace with a non-empty name go through `custom` unchanged.
pub(crate) fn parse_key<T>(
    key: &str,
    registry: &'static str,
    built_in: impl IntoIterator<Item = T>,
    name: impl Fn(&T) -> &str,
    custom: impl FnOnce(String) -> T,
) -> EventResult<T> {
    let unknown = || EventError::UnknownKey {
        registry,
        key: key.to_string(),
    };
    let (namespace, short) = key.split_once(':').ok_or_else(unknown)?;
    if namespace != NAMESPACE {
        if short.is_empty() {
            return Err(unknown());
        }
        return Ok(custom(key.to_string()));
    }
    built_in
        .into_iter()
        .find(|t| name(t) == short)
        .ok_or_else(unknown)
}

// ============================================================================
// Modifier Types
// ============================================================================

/// Classification of a damage modifier.
///
/// The type is metadata for ordering and inspection; the reducer never reads
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageModifierType {
    /// Absorbs damage based on the absorption effect of the target.
    Absorption,
    /// Reduces damage based on the worn armor.
    Armor,
    /// Reduces damage based on enchantments on worn armor.
    ArmorEnchantment,
    /// Reduces attack damage while the attack cooldown is not complete.
    AttackCooldown,
    /// Increases damage for a critical hit.
    CriticalHit,
    /// Reduces incoming damage through a resistance-like potion effect.
    DefensivePotionEffect,
    /// Scales damage with the world difficulty.
    Difficulty,
    /// Reduces falling-block damage when a helmet is worn.
    HardHat,
    /// Modifies damage based on magic.
    Magic,
    /// Reduces outgoing damage through a potion effect on the attacker.
    NegativePotionEffect,
    /// Increases outgoing damage through a potion effect on the attacker.
    OffensivePotionEffect,
    /// Reduces damage because a shield was raised.
    Shield,
    /// Applied for a sweeping attack.
    Sweeping,
    /// Modifies damage through enchantments on the held weapon.
    WeaponEnchantment,
    /// Plugin-defined type, identified by its full key.
    Custom(String),
}

impl DamageModifierType {
    /// All built-in modifier types.
    pub const BUILT_IN: [Self; 14] = [
        Self::Absorption,
        Self::Armor,
        Self::ArmorEnchantment,
        Self::AttackCooldown,
        Self::CriticalHit,
        Self::DefensivePotionEffect,
        Self::Difficulty,
        Self::HardHat,
        Self::Magic,
        Self::NegativePotionEffect,
        Self::OffensivePotionEffect,
        Self::Shield,
        Self::Sweeping,
        Self::WeaponEnchantment,
    ];

    /// Creates a plugin-defined modifier type.
    #[must_use]
    pub fn custom(key: impl Into<String>) -> Self {
        Self::Custom(key.into())
    }

    /// Short name of the type, without namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Absorption => "absorption",
            Self::Armor => "armor",
            Self::ArmorEnchantment => "armor_enchantment",
            Self::AttackCooldown => "attack_cooldown",
            Self::CriticalHit => "critical_hit",
            Self::DefensivePotionEffect => "defensive_potion_effect",
            Self::Difficulty => "difficulty",
            Self::HardHat => "hard_hat",
            Self::Magic => "magic",
            Self::NegativePotionEffect => "negative_potion_effect",
            Self::OffensivePotionEffect => "offensive_potion_effect",
            Self::Shield => "shield",
            Self::Sweeping => "sweeping",
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

    /// Check if this is a plugin-defined type.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Step a modifier of this type belongs to unless told otherwise.
    #[must_use]
    pub fn default_step(&self) -> DamageStepType {
        match self {
            Self::Absorption => DamageStepType::Absorption,
            Self::Armor => DamageStepType::Armor,
            Self::ArmorEnchantment => DamageStepType::ArmorEnchantment,
            Self::AttackCooldown => DamageStepType::BaseCooldown,
            Self::CriticalHit => DamageStepType::CriticalHit,
            Self::DefensivePotionEffect => DamageStepType::DefensivePotionEffect,
            Self::Difficulty => DamageStepType::Difficulty,
            Self::HardHat => DamageStepType::HardHat,
            Self::Magic => DamageStepType::Magic,
            Self::NegativePotionEffect => DamageStepType::NegativePotionEffect,
            Self::OffensivePotionEffect => DamageStepType::OffensivePotionEffect,
            Self::Shield => DamageStepType::Shield,
            Self::Sweeping => DamageStepType::Sweeping,
            Self::WeaponEnchantment => DamageStepType::WeaponEnchantment,
            Self::Custom(key) => DamageStepType::Custom(key.clone()),
        }
    }
}

impl fmt::Display for DamageModifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for DamageModifierType {
    type Err = EventError;

    /// Parses a namespaced key. Keys in the built-in namespace must name a
    /// built-in type; keys in any other namespace become `Custom`.
    fn from_str(key: &str) -> EventResult<Self> {
        parse_key(key, "damage modifier type", Self::BUILT_IN, Self::name, Self::Custom)
    }
}

// ============================================================================
// Groups and Sources
// ============================================================================

/// Group a modifier contributes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModifierGroup {
    /// Main attack damage of an attack event.
    AttackDamage,
    /// Enchantment damage of an attack event.
    AttackEnchantment,
    /// Reduction applied to incoming damage.
    #[default]
    DamageReduction,
    /// Plugin-defined group.
    Custom(String),
}

impl ModifierGroup {
    /// Registry key of the group.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::AttackDamage => "minecraft:attack_damage",
            Self::AttackEnchantment => "minecraft:attack_enchantment",
            Self::DamageReduction => "minecraft:damage_reduction",
            Self::Custom(key) => key,
        }
    }
}

/// World difficulty, as a modifier source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// No hostile damage.
    Peaceful,
    /// Easy.
    Easy,
    /// Normal.
    Normal,
    /// Hard.
    Hard,
}

/// Immutable snapshot of an item that contributed a modifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Item type key.
    pub item_type: String,
    /// Stack size.
    pub quantity: u32,
    /// Enchantments as `(key, level)`.
    pub enchantments: Vec<(String, u8)>,
}

impl ItemSnapshot {
    /// Creates a snapshot of a single item without enchantments.
    #[must_use]
    pub fn new(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            quantity: 1,
            enchantments: Vec::new(),
        }
    }

    /// Add an enchantment (builder pattern).
    #[must_use]
    pub fn with_enchantment(mut self, key: impl Into<String>, level: u8) -> Self {
        self.enchantments.push((key.into(), level));
        self
    }

    /// Level of an enchantment, 0 when absent.
    #[must_use]
    pub fn enchantment_level(&self, key: &str) -> u8 {
        self.enchantments
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, level)| *level)
    }
}

/// The "reason" a modifier exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierSource {
    /// An item, e.g. a piece of armor or an enchanted weapon.
    Item(ItemSnapshot),
    /// The world difficulty.
    Difficulty(Difficulty),
    /// A potion effect with its amplifier.
    PotionEffect {
        /// Effect key.
        effect: String,
        /// Effect amplifier.
        amplifier: u8,
    },
    /// Another entity.
    Entity(EntityId),
    /// A block, by block type key (cactus, magma, ...).
    Block(String),
    /// Free-form plugin context.
    Custom(String),
}

// ============================================================================
// Damage Modifier
// ============================================================================

/// Identity token describing why a damage adjustment exists.
///
/// Equality and hashing use the identity only. Clones share the identity of
/// the original.
#[derive(Debug, Clone)]
pub struct DamageModifier {
    id: ModifierId,
    modifier_type: DamageModifierType,
    step: DamageStepType,
    group: ModifierGroup,
    source: Option<ModifierSource>,
}

impl DamageModifier {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> DamageModifierBuilder {
        DamageModifierBuilder::default()
    }

    /// Creates a modifier of the given type with its default step and group.
    #[must_use]
    pub fn of(modifier_type: DamageModifierType) -> Self {
        Self {
            id: ModifierId::next(),
            step: modifier_type.default_step(),
            modifier_type,
            group: ModifierGroup::default(),
            source: None,
        }
    }

    /// Identity of this modifier.
    #[must_use]
    pub fn id(&self) -> ModifierId {
        self.id
    }

    /// Classification of this modifier.
    #[must_use]
    pub fn modifier_type(&self) -> &DamageModifierType {
        &self.modifier_type
    }

    /// Step this modifier is grouped under.
    #[must_use]
    pub fn step(&self) -> &DamageStepType {
        &self.step
    }

    /// Group this modifier contributes to.
    #[must_use]
    pub fn group(&self) -> &ModifierGroup {
        &self.group
    }

    /// Contributing source, if any.
    #[must_use]
    pub fn source(&self) -> Option<&ModifierSource> {
        self.source.as_ref()
    }

    /// Contributing item, if the source is an item.
    #[must_use]
    pub fn contributing_item(&self) -> Option<&ItemSnapshot> {
        match &self.source {
            Some(ModifierSource::Item(item)) => Some(item),
            _ => None,
        }
    }
}

impl PartialEq for DamageModifier {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DamageModifier {}

impl Hash for DamageModifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for DamageModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DamageModifier[{} {}]", self.id, self.modifier_type)
    }
}

/// Builder for [`DamageModifier`].
#[derive(Debug, Clone, Default)]
pub struct DamageModifierBuilder {
    modifier_type: Option<DamageModifierType>,
    step: Option<DamageStepType>,
    group: Option<ModifierGroup>,
    source: Option<ModifierSource>,
}

impl DamageModifierBuilder {
    /// Set the modifier type.
    #[must_use]
    pub fn modifier_type(mut self, modifier_type: DamageModifierType) -> Self {
        self.modifier_type = Some(modifier_type);
        self
    }

    /// Override the step the modifier is grouped under.
    #[must_use]
    pub fn step(mut self, step: DamageStepType) -> Self {
        self.step = Some(step);
        self
    }

    /// Set the group.
    #[must_use]
    pub fn group(mut self, group: ModifierGroup) -> Self {
        self.group = Some(group);
        self
    }

    /// Use the attack damage group.
    #[must_use]
    pub fn attack_damage_group(self) -> Self {
        self.group(ModifierGroup::AttackDamage)
    }

    /// Use the attack enchantment group.
    #[must_use]
    pub fn attack_enchantment_group(self) -> Self {
        self.group(ModifierGroup::AttackEnchantment)
    }

    /// Use the damage reduction group.
    #[must_use]
    pub fn damage_reduction_group(self) -> Self {
        self.group(ModifierGroup::DamageReduction)
    }

    /// Set the contributing source.
    #[must_use]
    pub fn source(mut self, source: ModifierSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set a contributing item.
    #[must_use]
    pub fn item(self, item: ItemSnapshot) -> Self {
        self.source(ModifierSource::Item(item))
    }

    /// Copy every field of an existing modifier. The built modifier still
    /// gets a fresh identity.
    #[must_use]
    pub fn from_modifier(mut self, modifier: &DamageModifier) -> Self {
        self.modifier_type = Some(modifier.modifier_type.clone());
        self.step = Some(modifier.step.clone());
        self.group = Some(modifier.group.clone());
        self.source = modifier.source.clone();
        self
    }

    /// Clear all fields.
    #[must_use]
    pub fn reset(self) -> Self {
        Self::default()
    }

    /// Build the modifier.
    pub fn build(self) -> EventResult<DamageModifier> {
        let modifier_type = self.modifier_type.ok_or(EventError::MissingField {
            builder: "DamageModifierBuilder",
            field: "modifier_type",
        })?;
        Ok(DamageModifier {
            id: ModifierId::next(),
            step: self.step.unwrap_or_else(|| modifier_type.default_step()),
            modifier_type,
            group: self.group.unwrap_or_default(),
            source: self.source,
        })
    }
}

// ============================================================================
// Damage Function
// ============================================================================

/// Transform applied to the running damage value.
pub type ModifierFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A modifier paired with the transform it applies.
#[derive(Clone)]
pub struct DamageFunction {
    modifier: DamageModifier,
    function: ModifierFn,
}

impl DamageFunction {
    /// Pair a modifier with a transform.
    pub fn new(modifier: DamageModifier, function: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            modifier,
            function: Arc::new(function),
        }
    }

    /// Pair a modifier with an already shared transform.
    #[must_use]
    pub fn from_shared(modifier: DamageModifier, function: ModifierFn) -> Self {
        Self { modifier, function }
    }

    /// A function that leaves the damage untouched.
    #[must_use]
    pub fn identity(modifier: DamageModifier) -> Self {
        Self::new(modifier, |damage| damage)
    }

    /// Multiply the running damage by `factor`.
    #[must_use]
    pub fn multiply(modifier: DamageModifier, factor: f64) -> Self {
        Self::new(modifier, move |damage| damage * factor)
    }

    /// Add `amount` to the running damage (negative to subtract).
    #[must_use]
    pub fn add(modifier: DamageModifier, amount: f64) -> Self {
        Self::new(modifier, move |damage| damage + amount)
    }

    /// Cap the running damage at `cap`.
    #[must_use]
    pub fn cap(modifier: DamageModifier, cap: f64) -> Self {
        Self::new(modifier, move |damage| damage.min(cap))
    }

    /// The modifier.
    #[must_use]
    pub fn modifier(&self) -> &DamageModifier {
        &self.modifier
    }

    /// The shared transform.
    #[must_use]
    pub fn function(&self) -> &ModifierFn {
        &self.function
    }

    /// Apply the transform to a running value.
    #[must_use]
    pub fn apply(&self, damage: f64) -> f64 {
        (self.function)(damage)
    }

    /// Whether both functions hold the same modifier and the same transform.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.modifier == other.modifier && Arc::ptr_eq(&self.function, &other.function)
    }
}

impl fmt::Debug for DamageFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DamageFunction")
            .field("modifier", &self.modifier)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
