//! Per-event modifier registry.
//!
//! The registry owns the ordered list of damage functions for one damage
//! calculation, plus staged buckets that run immediately before or after all
//! modifiers of a given step. Mutation goes through explicit insertion
//! commands; read access hands out shared slices only.

use quarry_common::{EventError, EventResult};
use tracing::trace;

use crate::modifier::{DamageFunction, DamageModifier, DamageModifierType};
use crate::step::DamageStepType;

/// Side of a step a staged function runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Immediately before the first modifier of the step.
    Before,
    /// Immediately after the last modifier of the step.
    After,
}

/// Structured insertion request against a [`ModifierRegistry`].
#[derive(Debug, Clone)]
pub enum ModifierCommand {
    /// Insert before the first modifier whose type is listed.
    InsertBefore {
        /// Function to insert.
        function: DamageFunction,
        /// Types to run ahead of.
        before: Vec<DamageModifierType>,
    },
    /// Insert after the last modifier whose type is listed.
    InsertAfter {
        /// Function to insert.
        function: DamageFunction,
        /// Types to run behind.
        after: Vec<DamageModifierType>,
    },
    /// Replace the function of a modifier, or append it.
    SetDamage(DamageFunction),
    /// Stage a function around a step.
    Stage {
        /// Step to attach to.
        step: DamageStepType,
        /// Side of the step.
        placement: Placement,
        /// Function to stage.
        function: DamageFunction,
    },
}

/// Result of [`ModifierRegistry::set_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The modifier existed and its function was swapped in place.
    Replaced,
    /// The modifier was new and went to the end of the list.
    Appended,
}

/// A function in execution order, with the step it is attributed to.
#[derive(Debug, Clone, Copy)]
pub struct PlannedFunction<'a> {
    /// Step the function counts towards.
    pub step: &'a DamageStepType,
    /// Function to apply.
    pub function: &'a DamageFunction,
}

#[derive(Debug, Clone)]
struct StepBucket {
    step: DamageStepType,
    before: Vec<DamageFunction>,
    after: Vec<DamageFunction>,
}

impl StepBucket {
    fn new(step: DamageStepType) -> Self {
        Self {
            step,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    fn side(&self, placement: Placement) -> &[DamageFunction] {
        match placement {
            Placement::Before => &self.before,
            Placement::After => &self.after,
        }
    }

    fn side_mut(&mut self, placement: Placement) -> &mut Vec<DamageFunction> {
        match placement {
            Placement::Before => &mut self.before,
            Placement::After => &mut self.after,
        }
    }

    fn functions_mut(&mut self) -> impl Iterator<Item = &mut DamageFunction> {
        self.before.iter_mut().chain(self.after.iter_mut())
    }
}

/// Ordered modifier list for a single damage calculation.
#[derive(Debug, Clone, Default)]
pub struct ModifierRegistry {
    functions: Vec<DamageFunction>,
    buckets: Vec<StepBucket>,
}

impl ModifierRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from an initial ordered list.
    pub fn from_functions(functions: Vec<DamageFunction>) -> EventResult<Self> {
        let mut registry = Self::new();
        for function in functions {
            registry.ensure_absent(function.modifier())?;
            registry.functions.push(function);
        }
        Ok(registry)
    }

    /// Main-list functions in order, without staged buckets.
    #[must_use]
    pub fn functions(&self) -> &[DamageFunction] {
        &self.functions
    }

    /// Number of functions, staged ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
            + self
                .buckets
                .iter()
                .map(|b| b.before.len() + b.after.len())
                .sum::<usize>()
    }

    /// Check if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a modifier is registered anywhere.
    #[must_use]
    pub fn contains(&self, modifier: &DamageModifier) -> bool {
        self.get(modifier).is_some()
    }

    /// Function registered for a modifier.
    #[must_use]
    pub fn get(&self, modifier: &DamageModifier) -> Option<&DamageFunction> {
        self.functions
            .iter()
            .chain(
                self.buckets
                    .iter()
                    .flat_map(|b| b.before.iter().chain(b.after.iter())),
            )
            .find(|f| f.modifier() == modifier)
    }

    /// Functions staged to run right before the given step.
    #[must_use]
    pub fn modifiers_before(&self, step: &DamageStepType) -> &[DamageFunction] {
        match self.bucket(step) {
            Some(bucket) => bucket.side(Placement::Before),
            None => &[],
        }
    }

    /// Functions staged to run right after the given step.
    #[must_use]
    pub fn modifiers_after(&self, step: &DamageStepType) -> &[DamageFunction] {
        match self.bucket(step) {
            Some(bucket) => bucket.side(Placement::After),
            None => &[],
        }
    }

    /// Stage a function before all modifiers of `step`.
    pub fn stage_before(&mut self, step: DamageStepType, function: DamageFunction) -> EventResult<()> {
        self.stage(step, Placement::Before, function)
    }

    /// Stage a function after all modifiers of `step`.
    pub fn stage_after(&mut self, step: DamageStepType, function: DamageFunction) -> EventResult<()> {
        self.stage(step, Placement::After, function)
    }

    /// Stage a function on one side of a step.
    pub fn stage(
        &mut self,
        step: DamageStepType,
        placement: Placement,
        function: DamageFunction,
    ) -> EventResult<()> {
        self.ensure_absent(function.modifier())?;
        trace!(
            "Staging {} {:?} step {}",
            function.modifier(),
            placement,
            step
        );
        let index = match self.buckets.iter().position(|b| b.step == step) {
            Some(index) => index,
            None => {
                self.buckets.push(StepBucket::new(step));
                self.buckets.len() - 1
            },
        };
        self.buckets[index].side_mut(placement).push(function);
        Ok(())
    }

    /// Insert a function before the first modifier whose type is in `before`.
    ///
    /// Appends when nothing matches, including for an empty set. Returns the
    /// index the function landed at.
    pub fn add_before(
        &mut self,
        function: DamageFunction,
        before: &[DamageModifierType],
    ) -> EventResult<usize> {
        self.ensure_absent(function.modifier())?;
        let index = self
            .functions
            .iter()
            .position(|f| before.contains(f.modifier().modifier_type()))
            .unwrap_or(self.functions.len());
        trace!("Inserting {} at {}", function.modifier(), index);
        self.functions.insert(index, function);
        Ok(index)
    }

    /// Insert a function after the last modifier whose type is in `after`.
    ///
    /// Appends when nothing matches. Returns the index the function landed at.
    pub fn add_after(
        &mut self,
        function: DamageFunction,
        after: &[DamageModifierType],
    ) -> EventResult<usize> {
        self.ensure_absent(function.modifier())?;
        let index = self
            .functions
            .iter()
            .rposition(|f| after.contains(f.modifier().modifier_type()))
            .map_or(self.functions.len(), |last| last + 1);
        trace!("Inserting {} at {}", function.modifier(), index);
        self.functions.insert(index, function);
        Ok(index)
    }

    /// Replace the function of an existing modifier in place, or append it.
    pub fn set_damage(&mut self, function: DamageFunction) -> SetOutcome {
        let modifier = function.modifier().clone();
        let existing = self.functions.iter_mut().find(|f| f.modifier() == &modifier);
        let existing = match existing {
            Some(slot) => Some(slot),
            None => self
                .buckets
                .iter_mut()
                .flat_map(|bucket| bucket.functions_mut())
                .find(|f| f.modifier() == &modifier),
        };
        if let Some(slot) = existing {
            *slot = function;
            SetOutcome::Replaced
        } else {
            self.functions.push(function);
            SetOutcome::Appended
        }
    }

    /// Apply an insertion command.
    pub fn apply(&mut self, command: ModifierCommand) -> EventResult<()> {
        match command {
            ModifierCommand::InsertBefore { function, before } => {
                self.add_before(function, &before).map(|_| ())
            },
            ModifierCommand::InsertAfter { function, after } => {
                self.add_after(function, &after).map(|_| ())
            },
            ModifierCommand::SetDamage(function) => {
                self.set_damage(function);
                Ok(())
            },
            ModifierCommand::Stage {
                step,
                placement,
                function,
            } => self.stage(step, placement, function),
        }
    }

    /// Resolve the execution order.
    ///
    /// Staged functions run around the first/last main-list modifier of their
    /// step. Buckets whose step has no main-list member run at the end, in
    /// the order the buckets were created.
    #[must_use]
    pub fn plan(&self) -> Vec<PlannedFunction<'_>> {
        let mut plan = Vec::with_capacity(self.len());

        for (index, function) in self.functions.iter().enumerate() {
            let step = function.modifier().step();
            let bucket = self.bucket(step);
            let first = self.functions.iter().position(|f| f.modifier().step() == step);
            let last = self.functions.iter().rposition(|f| f.modifier().step() == step);

            if let (Some(bucket), Some(true)) = (bucket, first.map(|i| i == index)) {
                plan.extend(bucket.before.iter().map(|f| PlannedFunction { step, function: f }));
            }
            plan.push(PlannedFunction { step, function });
            if let (Some(bucket), Some(true)) = (bucket, last.map(|i| i == index)) {
                plan.extend(bucket.after.iter().map(|f| PlannedFunction { step, function: f }));
            }
        }

        for bucket in &self.buckets {
            let anchored = self
                .functions
                .iter()
                .any(|f| f.modifier().step() == &bucket.step);
            if !anchored {
                let step = &bucket.step;
                plan.extend(
                    bucket
                        .before
                        .iter()
                        .chain(bucket.after.iter())
                        .map(|f| PlannedFunction { step, function: f }),
                );
            }
        }

        plan
    }

    fn bucket(&self, step: &DamageStepType) -> Option<&StepBucket> {
        self.buckets.iter().find(|b| &b.step == step)
    }

    fn ensure_absent(&self, modifier: &DamageModifier) -> EventResult<()> {
        if self.contains(modifier) {
            return Err(EventError::DuplicateModifier(modifier.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
