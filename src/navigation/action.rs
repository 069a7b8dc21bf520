//! Navigation actions.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::destination::Params;
use super::guided_flow::{GuidedFlowBatch, GuidedFlowDefinition, GuidedFlowModification};
use super::module::NavigationModule;
use super::state::NavigationUpdate;
use crate::mvi::ModuleAction;

/// Extra behavior for a `Navigate` intent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavOptions {
    /// Pop back to the most recent entry matching this route first.
    pub pop_up_to: Option<String>,
    /// Also pop the `pop_up_to` match itself.
    pub inclusive: bool,
    /// Replace the top entry instead of pushing when it has the same path.
    pub single_top: bool,
    /// Empty the back stack before pushing.
    pub clear_back_stack: bool,
}

impl NavOptions {
    pub fn pop_up_to(route: impl Into<String>, inclusive: bool) -> Self {
        Self {
            pop_up_to: Some(route.into()),
            inclusive,
            ..Self::default()
        }
    }

    pub fn single_top() -> Self {
        Self {
            single_top: true,
            ..Self::default()
        }
    }

    pub fn clear_back_stack() -> Self {
        Self {
            clear_back_stack: true,
            ..Self::default()
        }
    }
}

/// What a caller asks the navigation logic to do.
#[derive(Debug, Clone)]
pub enum NavigationIntent {
    Navigate {
        route: String,
        params: Params,
        options: NavOptions,
    },
    Back,
    PopUpTo {
        route: String,
        inclusive: bool,
    },
    ClearBackStack,
    DismissModal,
    ResumePendingNavigation,
    StartGuidedFlow(GuidedFlowDefinition),
    /// Start a flow registered on the navigation module by name.
    StartNamedGuidedFlow(String),
    NextStep,
    PreviousStep,
    ModifyGuidedFlow(Vec<GuidedFlowModification>),
    GuidedFlowBatch(GuidedFlowBatch),
}

/// How an intent ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed,
    /// A guard redirected; the final path was committed.
    Redirected { to: String },
    Rejected,
    NotFound { path: String },
    /// Nothing to do (empty history, no modal, no active flow).
    Ignored,
    /// A middleware blocked the state update.
    Blocked,
    Failed(String),
}

impl NavigationOutcome {
    /// Whether the back stack or flow state changed.
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            NavigationOutcome::Committed | NavigationOutcome::Redirected { .. }
        )
    }
}

/// One-shot reply slot carried by an intent.
#[derive(Clone, Default)]
pub struct Completion(Option<Arc<Mutex<Option<oneshot::Sender<NavigationOutcome>>>>>);

impl Completion {
    /// No one waits for the outcome.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn channel() -> (Self, oneshot::Receiver<NavigationOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self(Some(Arc::new(Mutex::new(Some(sender))))), receiver)
    }

    pub(crate) fn complete(&self, outcome: NavigationOutcome) {
        let Some(slot) = &self.0 else {
            return;
        };
        if let Some(sender) = slot.lock().take() {
            let _ = sender.send(outcome);
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.0 {
            None => "none",
            Some(slot) if slot.lock().is_some() => "pending",
            Some(_) => "completed",
        };
        write!(f, "Completion({})", state)
    }
}

#[derive(Debug, Clone)]
pub enum NavigationAction {
    /// Handled by the navigation logic; leaves the state untouched.
    Intent {
        intent: NavigationIntent,
        done: Completion,
    },
    /// Commit a computed update. Only the navigation logic dispatches this.
    Apply(NavigationUpdate),
}

impl NavigationAction {
    pub fn intent(intent: NavigationIntent) -> Self {
        NavigationAction::Intent {
            intent,
            done: Completion::none(),
        }
    }

    pub fn navigate(route: impl Into<String>) -> Self {
        Self::intent(NavigationIntent::Navigate {
            route: route.into(),
            params: Params::new(),
            options: NavOptions::default(),
        })
    }

    pub fn back() -> Self {
        Self::intent(NavigationIntent::Back)
    }
}

impl ModuleAction for NavigationAction {
    type Module = NavigationModule;
}
