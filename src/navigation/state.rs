//! Navigation module state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::entry::{ModalContext, NavigationEntry};
use super::guard::PendingNavigation;
use super::guided_flow::GuidedFlowState;
use super::view::NavigationView;
use crate::mvi::ModuleState;

/// Where the user is, plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub back_stack: Vec<NavigationEntry>,
    pub modal_contexts: Vec<ModalContext>,
    pub guided_flow: Option<GuidedFlowState>,
    pub pending_navigation: Option<PendingNavigation>,
    pub view: NavigationView,
}

impl ModuleState for NavigationState {}

impl NavigationState {
    pub fn empty() -> Self {
        Self::from_update(NavigationUpdate::default(), &BTreeSet::new())
    }

    /// Build a state from raw parts, recomputing the view.
    pub fn from_update(update: NavigationUpdate, graph_paths: &BTreeSet<String>) -> Self {
        let view = NavigationView::compute(&update.back_stack, &update.modal_contexts, graph_paths);
        Self {
            back_stack: view.back_stack.clone(),
            modal_contexts: update.modal_contexts,
            guided_flow: update.guided_flow,
            pending_navigation: update.pending_navigation,
            view,
        }
    }

    pub fn current(&self) -> Option<&NavigationEntry> {
        self.back_stack.last()
    }

    pub fn depth(&self) -> usize {
        self.back_stack.len()
    }

    pub(crate) fn to_update(&self) -> NavigationUpdate {
        NavigationUpdate {
            back_stack: self.back_stack.clone(),
            modal_contexts: self.modal_contexts.clone(),
            guided_flow: self.guided_flow.clone(),
            pending_navigation: self.pending_navigation.clone(),
        }
    }
}

/// Replacement values committed by one `NavigationAction::Apply`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationUpdate {
    pub back_stack: Vec<NavigationEntry>,
    pub modal_contexts: Vec<ModalContext>,
    pub guided_flow: Option<GuidedFlowState>,
    pub pending_navigation: Option<PendingNavigation>,
}
