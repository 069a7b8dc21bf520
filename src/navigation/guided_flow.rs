//! Guided flows: named, runtime-editable step sequences.
//!
//! Every modification is a pure function producing a new definition.
//! Modifications address steps by 1-based step number; the runtime pointer
//! (`GuidedFlowState::current_step`) is a 0-based slot. Out-of-range step
//! numbers, including 0, leave the flow unchanged.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::destination::Params;
use crate::store::StoreAccessor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidedFlowStep {
    pub route: String,
    #[serde(default)]
    pub params: Params,
}

impl GuidedFlowStep {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Invoked once when a flow advances past its final step.
#[derive(Clone)]
pub struct CompletionCallback(Arc<dyn Fn(&StoreAccessor) + Send + Sync>);

impl CompletionCallback {
    pub fn new(callback: impl Fn(&StoreAccessor) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub(crate) fn invoke(&self, store: &StoreAccessor) {
        (self.0)(store)
    }
}

impl fmt::Debug for CompletionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionCallback")
    }
}

impl PartialEq for CompletionCallback {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidedFlowDefinition {
    pub name: String,
    pub steps: Vec<GuidedFlowStep>,
    #[serde(skip)]
    pub on_complete: Option<CompletionCallback>,
}

/// Runtime edit of a flow definition. Step numbers start at 1.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidedFlowModification {
    /// Insert so the first new step becomes step `at`, or append when `None`.
    AddSteps {
        steps: Vec<GuidedFlowStep>,
        at: Option<usize>,
    },
    RemoveSteps { indices: Vec<usize> },
    ReplaceStep { index: usize, step: GuidedFlowStep },
    /// Merge `params` into the step's params.
    UpdateStepParams { index: usize, params: Params },
    UpdateOnComplete(Option<CompletionCallback>),
}

impl GuidedFlowDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<GuidedFlowStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            on_complete: None,
        }
    }

    pub fn on_complete(mut self, callback: impl Fn(&StoreAccessor) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(CompletionCallback::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// New definition with `modification` applied.
    pub fn apply(&self, modification: &GuidedFlowModification) -> Self {
        let mut next = self.clone();
        match modification {
            GuidedFlowModification::AddSteps { steps, at } => match at {
                None => next.steps.extend(steps.iter().cloned()),
                Some(number) => {
                    if let Some(slot) = insertion_slot(*number, next.steps.len()) {
                        let tail = next.steps.split_off(slot);
                        next.steps.extend(steps.iter().cloned());
                        next.steps.extend(tail);
                    }
                }
            },
            GuidedFlowModification::RemoveSteps { indices } => {
                let mut number = 0;
                next.steps.retain(|_| {
                    number += 1;
                    !indices.contains(&number)
                });
            }
            GuidedFlowModification::ReplaceStep { index, step } => {
                if let Some(slot) = step_slot(*index).and_then(|i| next.steps.get_mut(i)) {
                    *slot = step.clone();
                }
            }
            GuidedFlowModification::UpdateStepParams { index, params } => {
                if let Some(slot) = step_slot(*index).and_then(|i| next.steps.get_mut(i)) {
                    slot.params.extend(params.clone());
                }
            }
            GuidedFlowModification::UpdateOnComplete(callback) => {
                next.on_complete = callback.clone();
            }
        }
        next
    }
}

/// Slot of the 1-based step `number`.
fn step_slot(number: usize) -> Option<usize> {
    number.checked_sub(1)
}

/// Slot where steps inserted as step `number` go, if in `1..=len + 1`.
fn insertion_slot(number: usize, len: usize) -> Option<usize> {
    step_slot(number).filter(|slot| *slot <= len)
}

/// Progress through a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidedFlowState {
    pub definition: GuidedFlowDefinition,
    pub current_step: usize,
    pub started_at: SystemTime,
    pub completed_at: Option<SystemTime>,
}

impl GuidedFlowState {
    pub fn start(definition: GuidedFlowDefinition) -> Self {
        Self {
            definition,
            current_step: 0,
            started_at: SystemTime::now(),
            completed_at: None,
        }
    }

    pub fn current(&self) -> Option<&GuidedFlowStep> {
        if self.is_completed() {
            return None;
        }
        self.definition.steps.get(self.current_step)
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step + 1 >= self.definition.len()
    }

    /// Completed fraction in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.is_completed() {
            return 1.0;
        }
        if self.definition.is_empty() {
            return 0.0;
        }
        self.current_step as f32 / self.definition.len() as f32
    }

    /// Apply a modification, keeping the pointer on the same logical step.
    ///
    /// Insertions before the pointer shift it forward. Removals before it
    /// shift it back. Removing the current step moves the pointer to the step
    /// that slid into its place.
    pub fn modify(&self, modification: &GuidedFlowModification) -> Self {
        let mut next = self.clone();
        next.definition = self.definition.apply(modification);

        match modification {
            GuidedFlowModification::AddSteps { steps, at: Some(number) } => {
                if insertion_slot(*number, self.definition.len())
                    .is_some_and(|slot| slot <= self.current_step)
                {
                    next.current_step += steps.len();
                }
            }
            GuidedFlowModification::RemoveSteps { indices } => {
                let mut removed: Vec<usize> = indices
                    .iter()
                    .filter_map(|number| step_slot(*number))
                    .filter(|slot| *slot < self.definition.len())
                    .collect();
                removed.sort_unstable();
                removed.dedup();
                let before = removed.iter().filter(|i| **i < self.current_step).count();
                next.current_step = self.current_step - before;
                if !next.is_completed() && next.definition.len() > 0 {
                    next.current_step = next.current_step.min(next.definition.len() - 1);
                }
            }
            _ => {}
        }
        next
    }

    /// Move to the next step. Returns `true` if this call completed the flow.
    pub fn advance(&self) -> (Self, bool) {
        let mut next = self.clone();
        if self.is_completed() {
            return (next, false);
        }
        next.current_step += 1;
        if next.current_step >= next.definition.len() {
            next.completed_at = Some(SystemTime::now());
            return (next, true);
        }
        (next, false)
    }

    /// Move to the previous step; `None` on the first step or once completed.
    pub fn retreat(&self) -> Option<Self> {
        if self.is_completed() || self.current_step == 0 {
            return None;
        }
        let mut next = self.clone();
        next.current_step -= 1;
        Some(next)
    }
}

/// Modifications plus an optional advance, committed as one action.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuidedFlowBatch {
    pub modifications: Vec<GuidedFlowModification>,
    pub advance: bool,
}

impl GuidedFlowBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modify(mut self, modification: GuidedFlowModification) -> Self {
        self.modifications.push(modification);
        self
    }

    pub fn then_advance(mut self) -> Self {
        self.advance = true;
        self
    }

    /// Resulting state and whether the flow completed.
    pub fn apply(&self, state: &GuidedFlowState) -> (GuidedFlowState, bool) {
        let modified = self
            .modifications
            .iter()
            .fold(state.clone(), |state, modification| state.modify(modification));
        if self.advance {
            modified.advance()
        } else {
            (modified, false)
        }
    }
}
