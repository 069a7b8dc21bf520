//! Caller-facing navigation API.

use std::sync::Arc;

use super::action::{Completion, NavOptions, NavigationAction, NavigationIntent, NavigationOutcome};
use super::destination::Params;
use super::guided_flow::{GuidedFlowBatch, GuidedFlowDefinition, GuidedFlowModification};
use super::state::NavigationState;
use crate::error::StoreError;
use crate::store::StoreAccessor;

/// Dispatches navigation intents and waits for their outcome.
///
/// Every method goes through the store like any other action; there is
/// no separate mutation path.
#[derive(Clone)]
pub struct Navigator {
    store: StoreAccessor,
}

impl Navigator {
    pub fn new(store: StoreAccessor) -> Self {
        Self { store }
    }

    async fn send(&self, intent: NavigationIntent) -> Result<NavigationOutcome, StoreError> {
        let (done, outcome) = Completion::channel();
        self.store
            .dispatch(NavigationAction::Intent { intent, done })?;
        outcome.await.map_err(|_| StoreError::NoReply)
    }

    pub async fn navigate(&self, route: &str) -> Result<NavigationOutcome, StoreError> {
        self.navigate_with(route, Params::new(), NavOptions::default())
            .await
    }

    pub async fn navigate_with(
        &self,
        route: &str,
        params: Params,
        options: NavOptions,
    ) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::Navigate {
            route: route.to_string(),
            params,
            options,
        })
        .await
    }

    pub async fn back(&self) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::Back).await
    }

    pub async fn pop_up_to(
        &self,
        route: &str,
        inclusive: bool,
    ) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::PopUpTo {
            route: route.to_string(),
            inclusive,
        })
        .await
    }

    pub async fn clear_back_stack(&self) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::ClearBackStack).await
    }

    pub async fn dismiss_modal(&self) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::DismissModal).await
    }

    pub async fn resume_pending_navigation(&self) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::ResumePendingNavigation).await
    }

    pub async fn start_guided_flow(
        &self,
        definition: GuidedFlowDefinition,
    ) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::StartGuidedFlow(definition))
            .await
    }

    pub async fn start_named_guided_flow(
        &self,
        name: &str,
    ) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::StartNamedGuidedFlow(name.to_string()))
            .await
    }

    pub async fn next_step(&self) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::NextStep).await
    }

    pub async fn previous_step(&self) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::PreviousStep).await
    }

    pub async fn modify_guided_flow(
        &self,
        modifications: Vec<GuidedFlowModification>,
    ) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::ModifyGuidedFlow(modifications))
            .await
    }

    pub async fn guided_flow_batch(
        &self,
        batch: GuidedFlowBatch,
    ) -> Result<NavigationOutcome, StoreError> {
        self.send(NavigationIntent::GuidedFlowBatch(batch)).await
    }

    pub async fn state(&self) -> Result<Arc<NavigationState>, StoreError> {
        self.store.select_state::<NavigationState>().await
    }
}
