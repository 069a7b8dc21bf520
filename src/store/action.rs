//! Type-erased actions as they travel through the lanes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::registry::ModuleKey;
use crate::mvi::{Module, ModuleAction, Priority};

/// Object-safe view of any [`ModuleAction`].
pub trait AnyAction: Any + fmt::Debug + Send + Sync {
    /// Key of the module whose reducer handles this action.
    fn module_key(&self) -> ModuleKey;

    fn lane(&self) -> Priority;

    fn action_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
}

impl<A: ModuleAction> AnyAction for A {
    fn module_key(&self) -> ModuleKey {
        ModuleKey::of::<<A::Module as Module>::State>()
    }

    fn lane(&self) -> Priority {
        ModuleAction::priority(self)
    }

    fn action_name(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AnyAction {
    pub fn downcast_ref<A: ModuleAction>(&self) -> Option<&A> {
        self.as_any().downcast_ref::<A>()
    }

    pub fn is<A: ModuleAction>(&self) -> bool {
        self.as_any().is::<A>()
    }
}

/// Shared handle to a dispatched action.
///
/// Identity matters: a middleware forwarding the same `ActionRef` continues
/// the chain, any other action starts a new dispatch.
pub type ActionRef = Arc<dyn AnyAction>;

pub(crate) fn same_action(a: &ActionRef, b: &ActionRef) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
