//! Module trait: one feature's state, reducer and logic factory.

use std::sync::Arc;

use super::action::ModuleAction;
use super::logic::ModuleLogic;
use super::state::ModuleState;
use crate::codec::CodecRegistry;
use crate::store::{Middleware, StoreAccessor};

/// A feature registered with the store.
///
/// At most one module may be registered per `State` type.
pub trait Module: Send + Sync + 'static {
    /// Name used in logs and as the key of persisted payloads.
    const NAME: &'static str;

    type State: ModuleState;
    type Action: ModuleAction<Module = Self>;
    type Logic: ModuleLogic<Action = Self::Action>;

    fn initial_state(&self) -> Self::State;

    /// Process an action and return the new state.
    ///
    /// This must be a pure function with no side effects. The action family
    /// is closed, so every variant has to be handled.
    fn reduce(&self, state: Self::State, action: Self::Action) -> Self::State;

    /// Build a fresh logic instance. Called at startup and after every reset.
    fn create_logic(&self, store: StoreAccessor) -> Self::Logic;

    /// Middlewares contributed by this module. They run after every
    /// explicitly registered middleware, closest to the reducer.
    fn middlewares(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    /// Opt-in registrar for state codecs used by persistence.
    fn register_codecs(&self, _codecs: &mut CodecRegistry) {}
}
