//! Pre/Post damage events.
//!
//! A [`DamageCalculationEvent`] is created by the host with a base damage and
//! the applicable modifiers. Listeners mutate it while it is open. Once every
//! Pre listener ran, the pipeline closes the Pre phase and, unless the event
//! was cancelled, runs the reducer exactly once. The result is a
//! [`PostDamageEvent`] whose steps are frozen and whose final damage is the
//! only mutable value left.
//!
//! Phase changes are crate-private. Listeners only ever see an open event
//! and cannot close it themselves.

use std::fmt;

use ahash::AHashMap;
use quarry_common::{EntityId, EventError, EventResult, ModifierId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::modifier::{DamageFunction, DamageModifier, DamageModifierType};
use crate::reducer::{self, NegativeDamagePolicy, Reduction};
use crate::registry::{ModifierCommand, ModifierRegistry, SetOutcome};
use crate::source::DamageSource;
use crate::step::{AppliedModifier, DamageStep, DamageStepType};
use crate::target::{EntitySnapshot, SnapshotRole, TargetSnapshot};

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle phase of a damage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventPhase {
    /// Pre listeners are running; modifiers and base damage are mutable.
    PreOpen,
    /// Pre listeners are done; waiting for the reducer.
    PreResolved,
    /// Reducer ran and the steps are captured.
    Reduced,
    /// Post listeners are running; only the final damage is mutable.
    PostOpen,
    /// Final damage handed to the host.
    PostResolved,
    /// Terminal. Reached through cancellation or after the host applied damage.
    Discarded,
}

impl EventPhase {
    /// Name used in errors and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreOpen => "pre_open",
            Self::PreResolved => "pre_resolved",
            Self::Reduced => "reduced",
            Self::PostOpen => "post_open",
            Self::PostResolved => "post_resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Check if this is one of the Pre phases.
    #[must_use]
    pub const fn is_pre(self) -> bool {
        matches!(self, Self::PreOpen | Self::PreResolved)
    }

    /// Check if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Discarded)
    }

    /// Check if a transition is allowed.
    #[must_use]
    #[allow(clippy::unnested_or_patterns)]
    pub const fn is_valid_transition(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::PreOpen, Self::PreResolved | Self::Discarded)
                | (Self::PreResolved, Self::Reduced)
                | (Self::Reduced, Self::PostOpen)
                | (Self::PostOpen, Self::PostResolved)
                | (Self::PostResolved, Self::Discarded)
        )
    }
}

impl fmt::Display for EventPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
struct Lifecycle {
    phase: EventPhase,
}

impl Lifecycle {
    const fn new() -> Self {
        Self {
            phase: EventPhase::PreOpen,
        }
    }

    fn transition_to(&mut self, to: EventPhase) -> EventResult<()> {
        let from = self.phase;
        if !EventPhase::is_valid_transition(from, to) {
            return Err(EventError::InvalidTransition {
                from: from.name(),
                to: to.name(),
            });
        }
        debug!("Damage event {} -> {}", from, to);
        self.phase = to;
        Ok(())
    }

    fn require(&self, operation: &'static str, phase: EventPhase) -> EventResult<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(EventError::IllegalState {
                operation,
                phase: self.phase.name(),
            })
        }
    }
}

// ============================================================================
// Event category and capabilities
// ============================================================================

/// Category of a damage event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DamageEventKind {
    /// An entity attacked the target. Carries the knockback modifier.
    Attack {
        /// Extra knockback applied with the hit.
        knockback: f64,
    },
    /// Any other damage.
    Damage,
}

impl DamageEventKind {
    /// Attack with no extra knockback.
    #[must_use]
    pub const fn attack() -> Self {
        Self::Attack { knockback: 0.0 }
    }

    /// Check if this is an attack.
    #[must_use]
    pub const fn is_attack(&self) -> bool {
        matches!(self, Self::Attack { .. })
    }

    /// Knockback modifier, for attacks.
    #[must_use]
    pub const fn knockback(&self) -> Option<f64> {
        match self {
            Self::Attack { knockback } => Some(*knockback),
            Self::Damage => None,
        }
    }

    /// Name of the category.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Attack { .. } => "attack",
            Self::Damage => "damage",
        }
    }
}

/// Events that can be cancelled.
pub trait Cancellable {
    /// Check if the event is cancelled.
    fn is_cancelled(&self) -> bool;

    /// Set the cancelled flag.
    fn set_cancelled(&mut self, cancelled: bool);
}

/// Events with a target entity.
pub trait TargetEntity {
    /// Target as reported by the host.
    fn target(&self) -> &TargetSnapshot;

    /// Target entity id.
    fn target_id(&self) -> EntityId {
        self.target().entity
    }
}

/// Events that know what caused them.
pub trait CauseTracked {
    /// Damage source.
    fn source(&self) -> &DamageSource;

    /// Entity ultimately responsible, preferring the indirect source.
    fn root_cause(&self) -> Option<EntityId> {
        self.source()
            .indirect_source()
            .or_else(|| self.source().source())
    }
}

/// Damage as handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedDamage {
    /// Damaged entity.
    pub target: EntityId,
    /// Damage after the negative damage policy.
    pub amount: f64,
    /// Whether this damage kills the target.
    pub fatal: bool,
    /// Knockback modifier for attacks.
    pub knockback: Option<f64>,
}

// ============================================================================
// Pre event
// ============================================================================

/// Damage calculation in its Pre phase.
#[derive(Debug)]
pub struct DamageCalculationEvent {
    lifecycle: Lifecycle,
    kind: DamageEventKind,
    source: DamageSource,
    target: TargetSnapshot,
    original_damage: f64,
    original_final_damage: f64,
    original_functions: Vec<DamageFunction>,
    original_damages: AHashMap<ModifierId, f64>,
    base_damage: f64,
    registry: ModifierRegistry,
    cancelled: bool,
    snapshots: Vec<EntitySnapshot>,
    log_steps: bool,
}

impl DamageCalculationEvent {
    /// Create an event from the host's base damage and modifiers.
    ///
    /// Fails if the same modifier appears twice.
    pub fn new(
        kind: DamageEventKind,
        source: DamageSource,
        target: TargetSnapshot,
        base_damage: f64,
        functions: Vec<DamageFunction>,
    ) -> EventResult<Self> {
        let registry = ModifierRegistry::from_functions(functions)?;
        let original = reducer::reduce_traced(base_damage, &registry.plan(), false);
        let original_damages = original
            .applied()
            .iter()
            .map(|applied| (applied.modifier.id(), applied.output))
            .collect();

        Ok(Self {
            lifecycle: Lifecycle::new(),
            kind,
            source,
            target,
            original_damage: base_damage,
            original_final_damage: original.final_damage(),
            original_functions: registry.functions().to_vec(),
            original_damages,
            base_damage,
            registry,
            cancelled: false,
            snapshots: Vec::new(),
            log_steps: false,
        })
    }

    /// Attack event with the given knockback modifier.
    pub fn attack(
        source: DamageSource,
        target: TargetSnapshot,
        base_damage: f64,
        functions: Vec<DamageFunction>,
        knockback: f64,
    ) -> EventResult<Self> {
        Self::new(
            DamageEventKind::Attack { knockback },
            source,
            target,
            base_damage,
            functions,
        )
    }

    /// Non-attack damage event.
    pub fn damage(
        source: DamageSource,
        target: TargetSnapshot,
        base_damage: f64,
        functions: Vec<DamageFunction>,
    ) -> EventResult<Self> {
        Self::new(DamageEventKind::Damage, source, target, base_damage, functions)
    }

    /// Trace every applied modifier when the reducer runs (builder pattern).
    #[must_use]
    pub fn with_step_logging(mut self, log_steps: bool) -> Self {
        self.log_steps = log_steps;
        self
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> EventPhase {
        self.lifecycle.phase
    }

    /// Event category.
    #[must_use]
    pub fn kind(&self) -> DamageEventKind {
        self.kind
    }

    // === Original values ===

    /// Base damage the host created the event with.
    #[must_use]
    pub fn original_damage(&self) -> f64 {
        self.original_damage
    }

    /// Final damage the original modifiers produced from the original base.
    #[must_use]
    pub fn original_final_damage(&self) -> f64 {
        self.original_final_damage
    }

    /// Modifiers the host created the event with, in order.
    #[must_use]
    pub fn original_functions(&self) -> &[DamageFunction] {
        &self.original_functions
    }

    /// Value each original modifier produced, by modifier id.
    #[must_use]
    pub fn original_damages(&self) -> &AHashMap<ModifierId, f64> {
        &self.original_damages
    }

    /// Value an original modifier produced.
    pub fn original_modifier_damage(&self, modifier: &DamageModifier) -> EventResult<f64> {
        self.original_damages
            .get(&modifier.id())
            .copied()
            .ok_or_else(|| EventError::ModifierNotApplicable(modifier.to_string()))
    }

    // === Current values ===

    /// Current base damage.
    #[must_use]
    pub fn base_damage(&self) -> f64 {
        self.base_damage
    }

    /// Replace the base damage.
    pub fn set_base_damage(&mut self, damage: f64) -> EventResult<()> {
        self.lifecycle.require("set_base_damage", EventPhase::PreOpen)?;
        self.base_damage = damage;
        Ok(())
    }

    /// Final damage with the current base and modifiers. Recomputed on
    /// every call.
    #[must_use]
    pub fn final_damage(&self) -> f64 {
        reducer::reduce(
            self.base_damage,
            self.registry.plan().into_iter().map(|planned| planned.function),
        )
    }

    /// Check if the current final damage would kill the target.
    #[must_use]
    pub fn will_cause_death(&self) -> bool {
        reducer::will_cause_death(self.target.health, self.final_damage())
    }

    /// Check if a modifier is currently registered.
    #[must_use]
    pub fn is_modifier_applicable(&self, modifier: &DamageModifier) -> bool {
        self.registry.contains(modifier)
    }

    /// Value a registered modifier currently produces.
    pub fn modifier_damage(&self, modifier: &DamageModifier) -> EventResult<f64> {
        self.preview()
            .output_of(modifier)
            .ok_or_else(|| EventError::ModifierNotApplicable(modifier.to_string()))
    }

    /// Reduction of the current state, without advancing the lifecycle.
    #[must_use]
    pub fn preview(&self) -> Reduction {
        reducer::reduce_traced(self.base_damage, &self.registry.plan(), false)
    }

    /// Main-list modifiers in order.
    #[must_use]
    pub fn modifiers(&self) -> &[DamageFunction] {
        self.registry.functions()
    }

    /// The full modifier registry, staged buckets included.
    #[must_use]
    pub fn registry(&self) -> &ModifierRegistry {
        &self.registry
    }

    /// Functions staged before a step.
    #[must_use]
    pub fn modifiers_before(&self, step: &DamageStepType) -> &[DamageFunction] {
        self.registry.modifiers_before(step)
    }

    /// Functions staged after a step.
    #[must_use]
    pub fn modifiers_after(&self, step: &DamageStepType) -> &[DamageFunction] {
        self.registry.modifiers_after(step)
    }

    // === Modifier mutation ===

    /// Insert before the first modifier of one of the given types.
    pub fn add_before(
        &mut self,
        function: DamageFunction,
        before: &[DamageModifierType],
    ) -> EventResult<usize> {
        self.lifecycle.require("add_before", EventPhase::PreOpen)?;
        self.registry.add_before(function, before)
    }

    /// Insert after the last modifier of one of the given types.
    pub fn add_after(
        &mut self,
        function: DamageFunction,
        after: &[DamageModifierType],
    ) -> EventResult<usize> {
        self.lifecycle.require("add_after", EventPhase::PreOpen)?;
        self.registry.add_after(function, after)
    }

    /// Replace a modifier's function in place, or append it.
    pub fn set_damage(&mut self, function: DamageFunction) -> EventResult<SetOutcome> {
        self.lifecycle.require("set_damage", EventPhase::PreOpen)?;
        Ok(self.registry.set_damage(function))
    }

    /// Stage a function before every modifier of a step.
    pub fn stage_before(&mut self, step: DamageStepType, function: DamageFunction) -> EventResult<()> {
        self.lifecycle.require("stage_before", EventPhase::PreOpen)?;
        self.registry.stage_before(step, function)
    }

    /// Stage a function after every modifier of a step.
    pub fn stage_after(&mut self, step: DamageStepType, function: DamageFunction) -> EventResult<()> {
        self.lifecycle.require("stage_after", EventPhase::PreOpen)?;
        self.registry.stage_after(step, function)
    }

    /// Apply a registry command.
    pub fn apply_command(&mut self, command: ModifierCommand) -> EventResult<()> {
        self.lifecycle.require("apply_command", EventPhase::PreOpen)?;
        self.registry.apply(command)
    }

    // === Knockback ===

    /// Knockback modifier, `None` for non-attack events.
    #[must_use]
    pub fn knockback_modifier(&self) -> Option<f64> {
        self.kind.knockback()
    }

    /// Set the knockback modifier of an attack.
    pub fn set_knockback_modifier(&mut self, value: f64) -> EventResult<()> {
        self.lifecycle.require("set_knockback_modifier", EventPhase::PreOpen)?;
        match &mut self.kind {
            DamageEventKind::Attack { knockback } => {
                *knockback = value;
                Ok(())
            },
            DamageEventKind::Damage => Err(EventError::IllegalState {
                operation: "set_knockback_modifier",
                phase: "not an attack",
            }),
        }
    }

    // === Lifecycle ===

    /// Close the Pre phase.
    ///
    /// Moves to [`EventPhase::Discarded`] if the event is cancelled, otherwise
    /// captures entity snapshots and moves to [`EventPhase::PreResolved`].
    pub(crate) fn resolve(&mut self) -> EventResult<EventPhase> {
        self.lifecycle.require("resolve", EventPhase::PreOpen)?;
        if self.cancelled {
            debug!("Damage to {} cancelled", self.target.entity);
            self.lifecycle.transition_to(EventPhase::Discarded)?;
        } else {
            self.snapshots = self.capture_snapshots();
            self.lifecycle.transition_to(EventPhase::PreResolved)?;
        }
        Ok(self.lifecycle.phase)
    }

    /// Entities involved, as captured when the Pre phase resolved.
    pub fn entity_snapshots(&self) -> EventResult<&[EntitySnapshot]> {
        self.lifecycle.require("entity_snapshots", EventPhase::PreResolved)?;
        Ok(&self.snapshots)
    }

    /// Run the reducer and open the Post phase.
    pub(crate) fn into_post(mut self) -> EventResult<PostDamageEvent> {
        self.lifecycle.require("into_post", EventPhase::PreResolved)?;
        let reduction = reducer::reduce_traced(self.base_damage, &self.registry.plan(), self.log_steps);
        self.lifecycle.transition_to(EventPhase::Reduced)?;

        let reduced_damage = reduction.final_damage();
        let (applied, steps) = reduction.into_parts();
        self.lifecycle.transition_to(EventPhase::PostOpen)?;

        Ok(PostDamageEvent {
            lifecycle: self.lifecycle,
            kind: self.kind,
            source: self.source,
            target: self.target,
            original_damage: self.original_damage,
            base_damage: self.base_damage,
            reduced_damage,
            final_damage: reduced_damage,
            applied,
            steps,
            snapshots: self.snapshots,
        })
    }

    fn capture_snapshots(&self) -> Vec<EntitySnapshot> {
        let mut snapshots = vec![EntitySnapshot {
            entity: self.target.entity,
            role: SnapshotRole::Target,
            health: self.target.health,
            position: self.target.position,
        }];
        if let Some(entity) = self.source.source() {
            snapshots.push(EntitySnapshot {
                entity,
                role: SnapshotRole::Source,
                health: None,
                position: self.source.position(),
            });
        }
        if let Some(entity) = self.source.indirect_source() {
            snapshots.push(EntitySnapshot {
                entity,
                role: SnapshotRole::IndirectSource,
                health: None,
                position: None,
            });
        }
        snapshots
    }
}

impl Cancellable for DamageCalculationEvent {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        if self.lifecycle.phase != EventPhase::PreOpen {
            debug!(
                "Ignoring set_cancelled({}) on damage event in phase {}",
                cancelled, self.lifecycle.phase
            );
            return;
        }
        self.cancelled = cancelled;
    }
}

impl TargetEntity for DamageCalculationEvent {
    fn target(&self) -> &TargetSnapshot {
        &self.target
    }
}

impl CauseTracked for DamageCalculationEvent {
    fn source(&self) -> &DamageSource {
        &self.source
    }
}

// ============================================================================
// Post event
// ============================================================================

/// Damage calculation after the reducer ran.
#[derive(Debug, Clone)]
pub struct PostDamageEvent {
    lifecycle: Lifecycle,
    kind: DamageEventKind,
    source: DamageSource,
    target: TargetSnapshot,
    original_damage: f64,
    base_damage: f64,
    reduced_damage: f64,
    final_damage: f64,
    applied: Vec<AppliedModifier>,
    steps: Vec<DamageStep>,
    snapshots: Vec<EntitySnapshot>,
}

impl PostDamageEvent {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> EventPhase {
        self.lifecycle.phase
    }

    /// Event category.
    #[must_use]
    pub fn kind(&self) -> DamageEventKind {
        self.kind
    }

    /// Knockback modifier, `None` for non-attack events.
    #[must_use]
    pub fn knockback_modifier(&self) -> Option<f64> {
        self.kind.knockback()
    }

    /// Base damage the host created the Pre event with.
    #[must_use]
    pub fn original_damage(&self) -> f64 {
        self.original_damage
    }

    /// Base damage the reducer started from.
    #[must_use]
    pub fn base_damage(&self) -> f64 {
        self.base_damage
    }

    /// Damage the reducer produced, before any Post override.
    #[must_use]
    pub fn reduced_damage(&self) -> f64 {
        self.reduced_damage
    }

    /// Damage that will be applied.
    #[must_use]
    pub fn final_damage(&self) -> f64 {
        self.final_damage
    }

    /// Override the damage that will be applied. The last value wins.
    pub fn set_final_damage(&mut self, damage: f64) -> EventResult<()> {
        self.lifecycle.require("set_final_damage", EventPhase::PostOpen)?;
        self.final_damage = damage;
        Ok(())
    }

    /// Captured steps in application order.
    #[must_use]
    pub fn steps(&self) -> &[DamageStep] {
        &self.steps
    }

    /// First captured step of a type.
    ///
    /// A step type interleaved with other steps is captured once per run, so
    /// this can miss later captures. Use [`Self::steps_of`] to see them all.
    #[must_use]
    pub fn step<'a>(&'a self, step_type: &'a DamageStepType) -> Option<&'a DamageStep> {
        self.steps_of(step_type).next()
    }

    /// Every captured step of a type, in application order.
    pub fn steps_of<'a>(
        &'a self,
        step_type: &'a DamageStepType,
    ) -> impl Iterator<Item = &'a DamageStep> + 'a {
        self.steps
            .iter()
            .filter(move |step| step.step_type() == step_type)
    }

    /// Every applied modifier in order.
    #[must_use]
    pub fn applied(&self) -> &[AppliedModifier] {
        &self.applied
    }

    /// Value a modifier produced during the reduction.
    pub fn modifier_damage(&self, modifier: &DamageModifier) -> EventResult<f64> {
        self.applied
            .iter()
            .find(|applied| &applied.modifier == modifier)
            .map(|applied| applied.output)
            .ok_or_else(|| EventError::ModifierNotApplicable(modifier.to_string()))
    }

    /// Check if the current final damage would kill the target.
    #[must_use]
    pub fn will_cause_death(&self) -> bool {
        reducer::will_cause_death(self.target.health, self.final_damage)
    }

    /// Entities captured when the Pre phase resolved.
    #[must_use]
    pub fn entity_snapshots(&self) -> &[EntitySnapshot] {
        &self.snapshots
    }

    /// Close the Post phase and produce the damage for the host.
    pub(crate) fn resolve(&mut self, policy: NegativeDamagePolicy) -> EventResult<AppliedDamage> {
        self.lifecycle.require("resolve", EventPhase::PostOpen)?;
        let amount = policy.apply(self.final_damage);
        self.lifecycle.transition_to(EventPhase::PostResolved)?;
        Ok(AppliedDamage {
            target: self.target.entity,
            amount,
            fatal: reducer::will_cause_death(self.target.health, amount),
            knockback: self.kind.knockback(),
        })
    }

    /// Retire the event after the host applied the damage.
    pub(crate) fn discard(&mut self) -> EventResult<()> {
        self.lifecycle.transition_to(EventPhase::Discarded)
    }
}

impl TargetEntity for PostDamageEvent {
    fn target(&self) -> &TargetSnapshot {
        &self.target
    }
}

impl CauseTracked for PostDamageEvent {
    fn source(&self) -> &DamageSource {
        &self.source
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DamageType;

    fn sword_hit(health: f64, functions: Vec<DamageFunction>) -> DamageCalculationEvent {
        let attacker = EntityId::new();
        let source = DamageSource::builder()
            .damage_type(DamageType::PlayerAttack)
            .entity(attacker)
            .build()
            .unwrap();
        let target = TargetSnapshot::living(EntityId::new(), health, 20.0);
        DamageCalculationEvent::attack(source, target, 10.0, functions, 1.0).unwrap()
    }

    fn standard_modifiers() -> (Vec<DamageModifier>, Vec<DamageFunction>) {
        let armor = DamageModifier::of(DamageModifierType::Armor);
        let resistance = DamageModifier::of(DamageModifierType::DefensivePotionEffect);
        let crit = DamageModifier::of(DamageModifierType::CriticalHit);
        let functions = vec![
            DamageFunction::multiply(armor.clone(), 0.5),
            DamageFunction::add(resistance.clone(), -2.0),
            DamageFunction::multiply(crit.clone(), 1.5),
        ];
        (vec![armor, resistance, crit], functions)
    }

    #[test]
    fn test_phase_transitions() {
        use EventPhase::*;

        assert!(EventPhase::is_valid_transition(PreOpen, PreResolved));
        assert!(EventPhase::is_valid_transition(PreOpen, Discarded));
        assert!(EventPhase::is_valid_transition(PostResolved, Discarded));
        assert!(!EventPhase::is_valid_transition(PreResolved, Discarded));
        assert!(!EventPhase::is_valid_transition(Reduced, Reduced));
        assert!(!EventPhase::is_valid_transition(Discarded, PreOpen));
        assert!(PreResolved.is_pre());
        assert!(Discarded.is_terminal());
    }

    #[test]
    fn test_full_lifecycle() {
        let (modifiers, functions) = standard_modifiers();
        let mut event = sword_hit(20.0, functions);

        assert_eq!(event.phase(), EventPhase::PreOpen);
        assert!((event.final_damage() - 4.5).abs() < f64::EPSILON);
        assert_eq!(event.resolve().unwrap(), EventPhase::PreResolved);

        let mut post = event.into_post().unwrap();
        assert_eq!(post.phase(), EventPhase::PostOpen);
        assert!((post.final_damage() - 4.5).abs() < f64::EPSILON);
        assert_eq!(post.steps().len(), 3);
        assert_eq!(post.modifier_damage(&modifiers[0]).unwrap(), 5.0);

        let applied = post.resolve(NegativeDamagePolicy::ClampToZero).unwrap();
        assert_eq!(applied.knockback, Some(1.0));
        assert!(!applied.fatal);
        assert_eq!(post.phase(), EventPhase::PostResolved);

        post.discard().unwrap();
        assert_eq!(post.phase(), EventPhase::Discarded);
    }

    #[test]
    fn test_cancel_discards() {
        let (_, functions) = standard_modifiers();
        let mut event = sword_hit(20.0, functions);
        event.set_cancelled(true);

        assert_eq!(event.resolve().unwrap(), EventPhase::Discarded);
        let err = event.into_post().unwrap_err();
        assert!(err.is_illegal_state());
    }

    #[test]
    fn test_late_cancel_ignored() {
        let mut event = sword_hit(20.0, Vec::new());
        event.resolve().unwrap();
        event.set_cancelled(true);

        assert!(!event.is_cancelled());
        assert!(event.into_post().is_ok());
    }

    #[test]
    fn test_snapshots_require_resolution() {
        let mut event = sword_hit(20.0, Vec::new());
        let err = event.entity_snapshots().unwrap_err();
        assert_eq!(
            err,
            EventError::IllegalState {
                operation: "entity_snapshots",
                phase: "pre_open",
            }
        );

        event.resolve().unwrap();
        let snapshots = event.entity_snapshots().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].role, SnapshotRole::Target);
        assert_eq!(snapshots[0].health, Some(20.0));
        assert_eq!(snapshots[1].role, SnapshotRole::Source);
    }

    #[test]
    fn test_mutation_after_resolve_fails() {
        let mut event = sword_hit(20.0, Vec::new());
        event.resolve().unwrap();

        let magic = DamageModifier::of(DamageModifierType::Magic);
        assert!(event.set_base_damage(1.0).unwrap_err().is_illegal_state());
        assert!(event
            .add_before(DamageFunction::identity(magic.clone()), &[])
            .unwrap_err()
            .is_illegal_state());
        assert!(event
            .set_damage(DamageFunction::identity(magic))
            .unwrap_err()
            .is_illegal_state());
        assert!(event.resolve().is_err());
    }

    #[test]
    fn test_original_values() {
        let (modifiers, functions) = standard_modifiers();
        let mut event = sword_hit(20.0, functions);

        event.set_base_damage(20.0).unwrap();
        event
            .set_damage(DamageFunction::identity(modifiers[0].clone()))
            .unwrap();
        let extra = DamageModifier::of(DamageModifierType::Magic);
        event
            .add_after(
                DamageFunction::add(extra.clone(), 1.0),
                &[DamageModifierType::CriticalHit],
            )
            .unwrap();

        assert_eq!(event.original_damage(), 10.0);
        assert!((event.original_final_damage() - 4.5).abs() < f64::EPSILON);
        assert_eq!(event.original_functions().len(), 3);
        assert_eq!(event.original_damages().len(), 3);
        assert_eq!(event.original_modifier_damage(&modifiers[0]).unwrap(), 5.0);
        assert_eq!(event.original_modifier_damage(&modifiers[1]).unwrap(), 3.0);
        assert!(event
            .original_modifier_damage(&extra)
            .unwrap_err()
            .is_illegal_argument());

        // (20 - 2) * 1.5 + 1
        assert_eq!(event.final_damage(), 28.0);
        assert_eq!(event.modifier_damage(&modifiers[0]).unwrap(), 20.0);
        assert_eq!(event.modifier_damage(&extra).unwrap(), 28.0);
        assert!(event.is_modifier_applicable(&extra));
        assert_eq!(event.modifiers().len(), 4);
    }

    #[test]
    fn test_modifier_damage_not_applicable() {
        let event = sword_hit(20.0, Vec::new());
        let stranger = DamageModifier::of(DamageModifierType::Shield);

        assert!(!event.is_modifier_applicable(&stranger));
        assert!(matches!(
            event.modifier_damage(&stranger),
            Err(EventError::ModifierNotApplicable(_))
        ));
    }

    #[test]
    fn test_knockback() {
        let mut attack = sword_hit(20.0, Vec::new());
        attack.set_knockback_modifier(2.5).unwrap();
        assert_eq!(attack.knockback_modifier(), Some(2.5));

        let target = TargetSnapshot::living(EntityId::new(), 20.0, 20.0);
        let mut fall = DamageCalculationEvent::damage(DamageSource::falling(), target, 3.0, Vec::new())
            .unwrap();
        assert_eq!(fall.knockback_modifier(), None);
        assert!(fall.set_knockback_modifier(1.0).unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_will_cause_death() {
        let armor = DamageModifier::of(DamageModifierType::Armor);
        let mut event = sword_hit(3.0, vec![DamageFunction::add(armor.clone(), -5.0)]);
        assert_eq!(event.final_damage(), 5.0);
        assert!(event.will_cause_death());

        event.set_damage(DamageFunction::add(armor, -8.0)).unwrap();
        assert_eq!(event.final_damage(), 2.0);
        assert!(!event.will_cause_death());
    }

    #[test]
    fn test_post_override_and_policy() {
        let mut event = sword_hit(20.0, Vec::new());
        event.resolve().unwrap();
        let mut post = event.into_post().unwrap();

        post.set_final_damage(100.0).unwrap();
        post.set_final_damage(-3.0).unwrap();
        assert_eq!(post.reduced_damage(), 10.0);

        let applied = post.resolve(NegativeDamagePolicy::ClampToZero).unwrap();
        assert_eq!(applied.amount, 0.0);
        assert!(post.set_final_damage(1.0).unwrap_err().is_illegal_state());
        assert!(post.resolve(NegativeDamagePolicy::Allow).is_err());
    }

    #[test]
    fn test_post_allows_negative() {
        let mut event = sword_hit(20.0, Vec::new());
        event.set_base_damage(-4.0).unwrap();
        event.resolve().unwrap();
        let mut post = event.into_post().unwrap();

        let applied = post.resolve(NegativeDamagePolicy::Allow).unwrap();
        assert_eq!(applied.amount, -4.0);
    }

    #[test]
    fn test_discard_requires_resolution() {
        let mut event = sword_hit(20.0, Vec::new());
        event.resolve().unwrap();
        let mut post = event.into_post().unwrap();

        assert!(matches!(
            post.discard(),
            Err(EventError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_staged_steps_captured() {
        let (_, functions) = standard_modifiers();
        let mut event = sword_hit(20.0, functions);
        let bonus = DamageModifier::of(DamageModifierType::custom("plugin:bonus"));
        event
            .stage_before(DamageStepType::Armor, DamageFunction::add(bonus.clone(), 2.0))
            .unwrap();
        assert_eq!(event.modifiers_before(&DamageStepType::Armor).len(), 1);

        event.resolve().unwrap();
        let post = event.into_post().unwrap();

        let armor = post.step(&DamageStepType::Armor).unwrap();
        assert_eq!(armor.damage_before(), 10.0);
        assert_eq!(armor.damage_after(), 6.0);
        assert_eq!(armor.modifiers().len(), 2);
        assert_eq!(post.modifier_damage(&bonus).unwrap(), 12.0);
    }

    #[test]
    fn test_interleaved_step_lookup() {
        let functions = vec![
            DamageFunction::add(DamageModifier::of(DamageModifierType::Armor), -1.0),
            DamageFunction::add(DamageModifier::of(DamageModifierType::Magic), -2.0),
            DamageFunction::add(DamageModifier::of(DamageModifierType::Armor), -3.0),
        ];
        let mut event = sword_hit(20.0, functions);
        event.resolve().unwrap();
        let post = event.into_post().unwrap();

        let armor: Vec<_> = post.steps_of(&DamageStepType::Armor).collect();
        assert_eq!(armor.len(), 2);
        assert_eq!(armor[0].damage_after(), 9.0);
        assert_eq!(armor[1].damage_before(), 7.0);
        assert_eq!(armor[1].damage_after(), 4.0);

        let first = post.step(&DamageStepType::Armor).unwrap();
        assert_eq!(first.damage_after(), 9.0);
        assert_eq!(post.steps_of(&DamageStepType::Shield).count(), 0);
    }

    #[test]
    fn test_root_cause() {
        let shooter = EntityId::new();
        let arrow = EntityId::new();
        let source = DamageSource::builder()
            .damage_type(DamageType::Arrow)
            .entity(arrow)
            .indirect_entity(shooter)
            .build()
            .unwrap();
        let target = TargetSnapshot::living(EntityId::new(), 20.0, 20.0);
        let event = DamageCalculationEvent::damage(source, target.clone(), 4.0, Vec::new()).unwrap();

        assert_eq!(event.root_cause(), Some(shooter));
        assert_eq!(event.target_id(), target.entity);
    }
}
