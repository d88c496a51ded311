//! Damage pipeline driver.
//!
//! Fires Pre listeners, resolves the event, runs the reducer, fires Post
//! listeners and hands the final damage to the host.

use quarry_common::{EventResult, ListenerId, QuarryResult};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::event::{
    AppliedDamage, CauseTracked, DamageCalculationEvent, EventPhase, PostDamageEvent, TargetEntity,
};
use crate::listener::ListenerRegistry;
use crate::notice::{DamageNotice, NoticeBus};
use crate::order::Order;
use crate::report::DamageReport;

/// Game side of the pipeline. Applies damage to entity health.
pub trait DamageHost {
    /// Apply resolved damage to the target.
    fn apply_damage(&mut self, damage: &AppliedDamage);
}

/// Result of firing a damage event.
#[derive(Debug, Clone, PartialEq)]
pub enum DamageOutcome {
    /// A Pre listener cancelled the event. Nothing was applied.
    Cancelled,
    /// Damage was handed to the host.
    Applied(AppliedDamage),
}

impl DamageOutcome {
    /// Damage applied, zero when cancelled.
    #[must_use]
    pub fn amount(&self) -> f64 {
        match self {
            Self::Cancelled => 0.0,
            Self::Applied(damage) => damage.amount,
        }
    }

    /// Check if the event was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Listener registries, config and notice bus for damage events.
#[derive(Debug)]
pub struct DamagePipeline {
    config: PipelineConfig,
    pre: ListenerRegistry<DamageCalculationEvent>,
    post: ListenerRegistry<PostDamageEvent>,
    notices: NoticeBus,
}

impl Default for DamagePipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl DamagePipeline {
    /// Create a pipeline with no listeners.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let notices = NoticeBus::new(config.notice_capacity);
        Self {
            config,
            pre: ListenerRegistry::new(),
            post: ListenerRegistry::new(),
            notices,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Notice bus.
    #[must_use]
    pub fn notices(&self) -> &NoticeBus {
        &self.notices
    }

    /// Register a listener for the Pre phase.
    ///
    /// Listeners may mutate or cancel the event. Closing the phase is left
    /// to [`Self::fire`]:
    ///
    /// ```compile_fail
    /// use quarry_damage::{DamageCalculationEvent, DamagePipeline, Order};
    ///
    /// let mut pipeline = DamagePipeline::default();
    /// pipeline.on_pre(Order::Default, |event: &mut DamageCalculationEvent| {
    ///     event.resolve().map(|_| ())
    /// });
    /// ```
    pub fn on_pre<F>(&mut self, order: Order, listener: F) -> ListenerId
    where
        F: FnMut(&mut DamageCalculationEvent) -> EventResult<()> + 'static,
    {
        self.pre.register(order, listener)
    }

    /// Register a listener for the Post phase.
    pub fn on_post<F>(&mut self, order: Order, listener: F) -> ListenerId
    where
        F: FnMut(&mut PostDamageEvent) -> EventResult<()> + 'static,
    {
        self.post.register(order, listener)
    }

    /// Remove a Pre listener. Handles from [`Self::on_post`] never match.
    pub fn remove_pre(&mut self, id: ListenerId) -> bool {
        self.pre.unregister(id)
    }

    /// Remove a Post listener. Handles from [`Self::on_pre`] never match.
    pub fn remove_post(&mut self, id: ListenerId) -> bool {
        self.post.unregister(id)
    }

    /// Number of registered listeners in both phases.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    /// Run an event through both phases.
    ///
    /// The host is only called when the event survives the Pre phase. A
    /// listener error aborts the event and is returned as is.
    pub fn fire<H>(&mut self, event: DamageCalculationEvent, host: &mut H) -> QuarryResult<DamageOutcome>
    where
        H: DamageHost + ?Sized,
    {
        let mut event = event.with_step_logging(self.config.log_steps);

        self.pre.dispatch(&mut event)?;
        if event.resolve()? == EventPhase::Discarded {
            self.notices.publish(DamageNotice::Cancelled {
                target: event.target_id(),
                damage_type: event.source().damage_type().clone(),
            });
            return Ok(DamageOutcome::Cancelled);
        }

        let mut post = event.into_post()?;
        self.post.dispatch(&mut post)?;

        let applied = post.resolve(self.config.negative_damage)?;
        debug!(
            "Applying {} damage to {} (fatal: {})",
            applied.amount, applied.target, applied.fatal
        );
        host.apply_damage(&applied);
        post.discard()?;

        self.notices
            .publish(DamageNotice::Applied(DamageReport::new(&post, &applied)));
        Ok(DamageOutcome::Applied(applied))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Cancellable;
    use crate::modifier::{DamageFunction, DamageModifier, DamageModifierType};
    use crate::reducer::NegativeDamagePolicy;
    use crate::source::{DamageSource, DamageType};
    use crate::target::TargetSnapshot;
    use quarry_common::{EntityId, EventError, QuarryError};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingHost {
        applied: Vec<AppliedDamage>,
    }

    impl DamageHost for RecordingHost {
        fn apply_damage(&mut self, damage: &AppliedDamage) {
            self.applied.push(*damage);
        }
    }

    fn hit(health: f64) -> DamageCalculationEvent {
        let source = DamageSource::builder()
            .damage_type(DamageType::MobAttack)
            .entity(EntityId::new())
            .build()
            .unwrap();
        let target = TargetSnapshot::living(EntityId::new(), health, 20.0);
        let functions = vec![
            DamageFunction::multiply(DamageModifier::of(DamageModifierType::Armor), 0.5),
            DamageFunction::add(
                DamageModifier::of(DamageModifierType::DefensivePotionEffect),
                -2.0,
            ),
            DamageFunction::multiply(DamageModifier::of(DamageModifierType::CriticalHit), 1.5),
        ];
        DamageCalculationEvent::attack(source, target, 10.0, functions, 0.5).unwrap()
    }

    #[test]
    fn test_fire_applies_damage() {
        let mut pipeline = DamagePipeline::default();
        let mut host = RecordingHost::default();

        let outcome = pipeline.fire(hit(20.0), &mut host).unwrap();

        assert!((outcome.amount() - 4.5).abs() < f64::EPSILON);
        assert_eq!(host.applied.len(), 1);
        assert_eq!(host.applied[0].knockback, Some(0.5));

        let notices = pipeline.notices().drain();
        assert_eq!(notices.len(), 1);
        match &notices[0] {
            DamageNotice::Applied(report) => {
                assert_eq!(report.steps.len(), 3);
                assert!((report.final_damage - 4.5).abs() < f64::EPSILON);
            },
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[test]
    fn test_cancel_skips_host() {
        let mut pipeline = DamagePipeline::default();
        let mut host = RecordingHost::default();
        let post_calls = Rc::new(RefCell::new(0));

        pipeline.on_pre(Order::Default, |event| {
            event.set_cancelled(true);
            Ok(())
        });
        let calls = Rc::clone(&post_calls);
        pipeline.on_post(Order::Default, move |_| {
            *calls.borrow_mut() += 1;
            Ok(())
        });

        let outcome = pipeline.fire(hit(20.0), &mut host).unwrap();

        assert!(outcome.is_cancelled());
        assert_eq!(outcome.amount(), 0.0);
        assert!(host.applied.is_empty());
        assert_eq!(*post_calls.borrow(), 0);
        let notices = pipeline.notices().drain();
        assert!(matches!(notices.as_slice(), [DamageNotice::Cancelled { .. }]));
    }

    #[test]
    fn test_later_listener_can_uncancel() {
        let mut pipeline = DamagePipeline::default();
        let mut host = RecordingHost::default();

        pipeline.on_pre(Order::Late, |event| {
            event.set_cancelled(false);
            Ok(())
        });
        pipeline.on_pre(Order::Early, |event| {
            event.set_cancelled(true);
            Ok(())
        });

        let outcome = pipeline.fire(hit(20.0), &mut host).unwrap();
        assert!(!outcome.is_cancelled());
        assert_eq!(host.applied.len(), 1);
    }

    #[test]
    fn test_listener_order_and_mutation() {
        let mut pipeline = DamagePipeline::default();
        let mut host = RecordingHost::default();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        pipeline.on_pre(Order::Last, move |event| {
            log.borrow_mut().push(event.base_damage());
            Ok(())
        });
        let log = Rc::clone(&seen);
        pipeline.on_pre(Order::First, move |event| {
            log.borrow_mut().push(event.base_damage());
            event.set_base_damage(20.0)
        });
        pipeline.on_post(Order::Default, |post| {
            let doubled = post.final_damage() * 2.0;
            post.set_final_damage(doubled)
        });

        let outcome = pipeline.fire(hit(40.0), &mut host).unwrap();

        assert_eq!(*seen.borrow(), vec![10.0, 20.0]);
        // ((20 * 0.5) - 2) * 1.5 * 2
        assert_eq!(outcome.amount(), 24.0);
    }

    #[test]
    fn test_listener_error_aborts() {
        let mut pipeline = DamagePipeline::default();
        let mut host = RecordingHost::default();

        pipeline.on_pre(Order::Default, |event| {
            let magic = DamageModifier::of(DamageModifierType::Magic);
            event.modifier_damage(&magic).map(|_| ())
        });

        let err = pipeline.fire(hit(20.0), &mut host).unwrap_err();
        assert!(matches!(
            err,
            QuarryError::Event(EventError::ModifierNotApplicable(_))
        ));
        assert!(host.applied.is_empty());
        assert_eq!(pipeline.notices().pending_count(), 0);
    }

    #[test]
    fn test_negative_policy_from_config() {
        let config = PipelineConfig {
            negative_damage: NegativeDamagePolicy::Allow,
            log_steps: true,
            ..PipelineConfig::default()
        };
        let mut pipeline = DamagePipeline::new(config);
        let mut host = RecordingHost::default();
        pipeline.on_post(Order::Default, |post| post.set_final_damage(-1.0));

        let outcome = pipeline.fire(hit(20.0), &mut host).unwrap();
        assert_eq!(outcome.amount(), -1.0);

        let mut clamped = DamagePipeline::default();
        clamped.on_post(Order::Default, |post| post.set_final_damage(-1.0));
        assert_eq!(clamped.fire(hit(20.0), &mut host).unwrap().amount(), 0.0);
    }

    #[test]
    fn test_fatal_damage() {
        let mut pipeline = DamagePipeline::default();
        let mut host = RecordingHost::default();

        let outcome = pipeline.fire(hit(3.0), &mut host).unwrap();
        match outcome {
            DamageOutcome::Applied(damage) => assert!(damage.fatal),
            DamageOutcome::Cancelled => panic!("event was not cancelled"),
        }
    }

    #[test]
    fn test_remove_listener() {
        let mut pipeline = DamagePipeline::default();
        let id = pipeline.on_pre(Order::Default, |event| {
            event.set_cancelled(true);
            Ok(())
        });
        assert_eq!(pipeline.listener_count(), 1);
        assert!(pipeline.remove_pre(id));
        assert!(!pipeline.remove_post(id));

        let mut host = RecordingHost::default();
        assert!(!pipeline.fire(hit(20.0), &mut host).unwrap().is_cancelled());
    }

    #[test]
    fn test_handles_are_phase_specific() {
        let mut pipeline = DamagePipeline::default();
        let pre = pipeline.on_pre(Order::Default, |_| Ok(()));
        let post = pipeline.on_post(Order::Default, |post| post.set_final_damage(0.0));
        assert_ne!(pre, post);

        assert!(!pipeline.remove_post(pre));
        assert!(!pipeline.remove_pre(post));
        assert_eq!(pipeline.listener_count(), 2);

        let mut host = RecordingHost::default();
        assert_eq!(pipeline.fire(hit(20.0), &mut host).unwrap().amount(), 0.0);
    }

    #[test]
    fn test_listeners_only_see_open_phases() {
        let mut pipeline = DamagePipeline::default();
        let phases = Rc::new(RefCell::new(Vec::new()));

        let seen = Rc::clone(&phases);
        pipeline.on_pre(Order::Default, move |event| {
            seen.borrow_mut().push(event.phase());
            event.set_cancelled(true);
            Ok(())
        });
        let seen = Rc::clone(&phases);
        pipeline.on_pre(Order::Late, move |event| {
            seen.borrow_mut().push(event.phase());
            event.set_cancelled(false);
            Ok(())
        });
        let seen = Rc::clone(&phases);
        pipeline.on_post(Order::Default, move |post| {
            seen.borrow_mut().push(post.phase());
            post.set_final_damage(-2.0)
        });

        let mut host = RecordingHost::default();
        let outcome = pipeline.fire(hit(20.0), &mut host).unwrap();

        assert_eq!(
            *phases.borrow(),
            vec![EventPhase::PreOpen, EventPhase::PreOpen, EventPhase::PostOpen]
        );
        // Default policy clamps the listener's negative override.
        assert_eq!(outcome.amount(), 0.0);
        assert_eq!(host.applied.len(), 1);
        assert!(matches!(
            pipeline.notices().drain().as_slice(),
            [DamageNotice::Applied(_)]
        ));
    }

    #[test]
    fn test_cancelling_listener_publishes_notice() {
        let mut pipeline = DamagePipeline::default();
        pipeline.on_pre(Order::Default, |event| {
            event.set_cancelled(true);
            assert_eq!(event.phase(), EventPhase::PreOpen);
            Ok(())
        });

        let mut host = RecordingHost::default();
        let event = hit(20.0);
        let target = event.target_id();
        let outcome = pipeline.fire(event, &mut host).unwrap();

        assert!(outcome.is_cancelled());
        let notices = pipeline.notices().drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].target(), target);
    }
}
