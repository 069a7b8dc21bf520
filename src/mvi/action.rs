//! Base trait for actions (user/system events) targeting a module.

use super::module::Module;

/// Lane an action is queued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    #[default]
    Normal,
    /// Serviced ahead of every queued normal action.
    High,
}

/// Marker trait for action objects.
///
/// Actions represent:
/// - User actions (button clicks, key presses)
/// - System events (responses, timers)
/// - Navigation events
///
/// The associated `Module` is the action's module tag: the store routes the
/// action to that module's reducer and logic.
pub trait ModuleAction: Clone + std::fmt::Debug + Send + Sync + 'static {
    type Module: Module;

    fn priority(&self) -> Priority {
        Priority::Normal
    }
}
