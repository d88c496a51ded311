//! Serializable summary of a finished damage event.

use quarry_common::{EntityId, QuarryError, QuarryResult, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::event::{AppliedDamage, CauseTracked, PostDamageEvent, TargetEntity};
use crate::source::DamageType;
use crate::step::DamageStep;

/// One applied modifier in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierReport {
    /// Modifier type key
    pub modifier_type: String,
    /// Running damage before the modifier
    pub input: f64,
    /// Running damage after the modifier
    pub output: f64,
}

/// One captured step in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Step type key
    pub step: String,
    /// Damage entering the step
    pub damage_before: f64,
    /// Damage leaving the step
    pub damage_after: f64,
    /// Modifiers in application order
    pub modifiers: Vec<ModifierReport>,
}

impl From<&DamageStep> for StepReport {
    fn from(step: &DamageStep) -> Self {
        Self {
            step: step.step_type().key(),
            damage_before: step.damage_before(),
            damage_after: step.damage_after(),
            modifiers: step
                .modifiers()
                .iter()
                .map(|applied| ModifierReport {
                    modifier_type: applied.modifier.modifier_type().key(),
                    input: applied.input,
                    output: applied.output,
                })
                .collect(),
        }
    }
}

/// Summary of a resolved damage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    /// Report format version
    pub schema_version: SchemaVersion,
    /// Event category name
    pub kind: String,
    /// Damaged entity
    pub target: EntityId,
    /// Damage type of the source
    pub damage_type: DamageType,
    /// Base damage the event was created with
    pub original_damage: f64,
    /// Base damage the reducer started from
    pub base_damage: f64,
    /// Damage the reducer produced
    pub reduced_damage: f64,
    /// Damage handed to the host
    pub final_damage: f64,
    /// Whether the damage killed the target
    pub fatal: bool,
    /// Captured steps
    pub steps: Vec<StepReport>,
}

impl DamageReport {
    /// Build a report from a resolved Post event and the damage it produced.
    #[must_use]
    pub fn new(event: &PostDamageEvent, applied: &AppliedDamage) -> Self {
        Self {
            schema_version: SchemaVersion::DAMAGE_REPORT,
            kind: event.kind().name().to_string(),
            target: event.target_id(),
            damage_type: event.source().damage_type().clone(),
            original_damage: event.original_damage(),
            base_damage: event.base_damage(),
            reduced_damage: event.reduced_damage(),
            final_damage: applied.amount,
            fatal: applied.fatal,
            steps: event.steps().iter().map(StepReport::from).collect(),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> QuarryResult<String> {
        serde_json::to_string(self).map_err(|e| QuarryError::Serialization(e.to_string()))
    }

    /// Parse a report, rejecting unreadable schema versions.
    pub fn from_json(text: &str) -> QuarryResult<Self> {
        let report: Self =
            serde_json::from_str(text).map_err(|e| QuarryError::Serialization(e.to_string()))?;
        if !SchemaVersion::DAMAGE_REPORT.can_read(&report.schema_version) {
            return Err(QuarryError::Serialization(format!(
                "Unsupported damage report version {}",
                report.schema_version
            )));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DamageCalculationEvent;
    use crate::modifier::{DamageFunction, DamageModifier, DamageModifierType};
    use crate::reducer::NegativeDamagePolicy;
    use crate::source::DamageSource;
    use crate::target::TargetSnapshot;

    fn resolved_event() -> (PostDamageEvent, AppliedDamage) {
        let target = TargetSnapshot::living(EntityId::new(), 4.0, 20.0);
        let functions = vec![DamageFunction::multiply(
            DamageModifier::of(DamageModifierType::Armor),
            0.5,
        )];
        let mut event =
            DamageCalculationEvent::damage(DamageSource::fire_tick(), target, 10.0, functions).unwrap();
        event.resolve().unwrap();
        let mut post = event.into_post().unwrap();
        let applied = post.resolve(NegativeDamagePolicy::ClampToZero).unwrap();
        (post, applied)
    }

    #[test]
    fn test_report_contents() {
        let (post, applied) = resolved_event();
        let report = DamageReport::new(&post, &applied);

        assert_eq!(report.kind, "damage");
        assert_eq!(report.damage_type, DamageType::Fire);
        assert_eq!(report.final_damage, 5.0);
        assert!(report.fatal);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].step, "quarry:armor");
        assert_eq!(report.steps[0].modifiers[0].modifier_type, "quarry:armor");
    }

    #[test]
    fn test_report_json() {
        let (post, applied) = resolved_event();
        let report = DamageReport::new(&post, &applied);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"reduced_damage\":5.0"));
        assert_eq!(DamageReport::from_json(&json).unwrap(), report);
    }

    #[test]
    fn test_report_rejects_future_version() {
        let (post, applied) = resolved_event();
        let mut report = DamageReport::new(&post, &applied);
        report.schema_version = SchemaVersion::new(2, 0, 0);

        let json = report.to_json().unwrap();
        assert!(DamageReport::from_json(&json).is_err());
    }
}
