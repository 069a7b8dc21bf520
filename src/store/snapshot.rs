//! Read-only view of every module's state at one instant.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::registry::{ModuleKey, StateRef};
use crate::mvi::ModuleState;

/// Full-snapshot read taken under the state lock.
#[derive(Clone, Default)]
pub struct StateSnapshot {
    states: HashMap<ModuleKey, StateRef>,
}

impl StateSnapshot {
    pub(crate) fn new(states: HashMap<ModuleKey, StateRef>) -> Self {
        Self { states }
    }

    pub fn get<S: ModuleState>(&self) -> Option<&S> {
        self.states
            .get(&ModuleKey::of::<S>())
            .and_then(|state| (**state).downcast_ref::<S>())
    }

    pub fn get_shared<S: ModuleState>(&self) -> Option<Arc<S>> {
        self.states
            .get(&ModuleKey::of::<S>())
            .and_then(|state| Arc::clone(state).downcast::<S>().ok())
    }

    pub fn contains<S: ModuleState>(&self) -> bool {
        self.states.contains_key(&ModuleKey::of::<S>())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&ModuleKey, &StateRef)> {
        self.states.iter()
    }

    pub(crate) fn into_states(self) -> HashMap<ModuleKey, StateRef> {
        self.states
    }
}

impl fmt::Debug for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.states.keys()).finish()
    }
}
