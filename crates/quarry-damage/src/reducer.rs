//! Damage reducer.
//!
//! Folds the running damage through each function in order. The fold never
//! looks at modifier types and never clamps; both are left to callers.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::modifier::DamageFunction;
use crate::registry::PlannedFunction;
use crate::step::{AppliedModifier, DamageStep};

/// Health at or below this value after damage means death.
pub const DEATH_THRESHOLD: f64 = 0.0;

/// Left-fold `base` through `functions`.
pub fn reduce<'a, I>(base: f64, functions: I) -> f64
where
    I: IntoIterator<Item = &'a DamageFunction>,
{
    functions
        .into_iter()
        .fold(base, |running, function| function.apply(running))
}

/// Whether `damage` leaves `health` at or below the death threshold.
///
/// Targets without health never die from damage.
#[must_use]
pub fn will_cause_death(health: Option<f64>, damage: f64) -> bool {
    health.is_some_and(|health| health - damage <= DEATH_THRESHOLD)
}

/// What to do with a negative final damage value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegativeDamagePolicy {
    /// Negative damage becomes zero.
    #[default]
    ClampToZero,
    /// Negative damage is passed on (the host may treat it as healing).
    Allow,
}

impl NegativeDamagePolicy {
    /// Apply the policy to a final value.
    #[must_use]
    pub fn apply(self, damage: f64) -> f64 {
        match self {
            Self::ClampToZero => damage.max(0.0),
            Self::Allow => damage,
        }
    }
}

/// Full breakdown of a reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    base_damage: f64,
    final_damage: f64,
    applied: Vec<AppliedModifier>,
    steps: Vec<DamageStep>,
}

impl Reduction {
    /// Damage the fold started from.
    #[must_use]
    pub fn base_damage(&self) -> f64 {
        self.base_damage
    }

    /// Damage the fold produced.
    #[must_use]
    pub fn final_damage(&self) -> f64 {
        self.final_damage
    }

    /// Every applied modifier, in order.
    #[must_use]
    pub fn applied(&self) -> &[AppliedModifier] {
        &self.applied
    }

    /// Steps in order of application.
    #[must_use]
    pub fn steps(&self) -> &[DamageStep] {
        &self.steps
    }

    /// Value a modifier produced, if it ran.
    #[must_use]
    pub fn output_of(&self, modifier: &crate::modifier::DamageModifier) -> Option<f64> {
        self.applied
            .iter()
            .find(|applied| &applied.modifier == modifier)
            .map(|applied| applied.output)
    }

    pub(crate) fn into_parts(self) -> (Vec<AppliedModifier>, Vec<DamageStep>) {
        (self.applied, self.steps)
    }
}

/// Fold `base` through a resolved plan, recording every modifier and step.
///
/// Consecutive functions attributed to the same step form one step.
#[must_use]
pub fn reduce_traced(base: f64, plan: &[PlannedFunction<'_>], log_steps: bool) -> Reduction {
    let mut running = base;
    let mut applied = Vec::with_capacity(plan.len());
    let mut steps: Vec<DamageStep> = Vec::new();

    for planned in plan {
        let input = running;
        running = planned.function.apply(input);
        if log_steps {
            trace!(
                "{} [{}]: {} -> {}",
                planned.function.modifier(),
                planned.step,
                input,
                running
            );
        }

        let record = AppliedModifier {
            modifier: planned.function.modifier().clone(),
            input,
            output: running,
        };
        match steps.last_mut() {
            Some(step) if step.step_type() == planned.step => step.record(record.clone()),
            _ => {
                let mut step = DamageStep::new(planned.step.clone(), input);
                step.record(record.clone());
                steps.push(step);
            },
        }
        applied.push(record);
    }

    Reduction {
        base_damage: base,
        final_damage: running,
        applied,
        steps,
    }
}

// ============================================================================
// Tests
// ============================================================================
