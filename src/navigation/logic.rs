//! Turns navigation intents into committed state updates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::Instrument;

use super::action::{NavOptions, NavigationAction, NavigationIntent, NavigationOutcome};
use super::destination::Params;
use super::entry::NavigationEntry;
use super::guard::{GuardRegistry, GuardResult, NavigationRequest, PendingNavigation};
use super::guided_flow::{CompletionCallback, GuidedFlowDefinition, GuidedFlowState};
use super::resolver::{ResolutionKind, RouteResolver};
use super::state::{NavigationState, NavigationUpdate};
use super::template::normalize;
use crate::config::NavigationSettings;
use crate::error::StoreError;
use crate::mvi::ModuleLogic;
use crate::store::{DispatchOutcome, StoreAccessor};

/// Result of planning one intent.
enum Plan {
    Commit {
        update: NavigationUpdate,
        outcome: NavigationOutcome,
        completed: Option<CompletionCallback>,
    },
    Skip(NavigationOutcome),
}

impl Plan {
    fn commit(update: NavigationUpdate, outcome: NavigationOutcome) -> Self {
        Plan::Commit {
            update,
            outcome,
            completed: None,
        }
    }

    fn with_flow(self, flow: GuidedFlowState) -> Self {
        match self {
            Plan::Commit {
                mut update,
                outcome,
                completed,
            } => {
                update.guided_flow = Some(flow);
                Plan::Commit {
                    update,
                    outcome,
                    completed,
                }
            }
            skip => skip,
        }
    }
}

/// Navigation logic unit.
///
/// Intents are handled one at a time, in dispatch order: each reads the
/// current state, runs guards, and commits its update with
/// `dispatch_and_await` before the next intent starts.
pub struct NavigationLogic {
    resolver: Arc<RouteResolver>,
    guards: GuardRegistry,
    flows: Arc<HashMap<String, GuidedFlowDefinition>>,
    settings: NavigationSettings,
    debug: bool,
}

impl NavigationLogic {
    pub(crate) fn new(
        resolver: Arc<RouteResolver>,
        guards: GuardRegistry,
        flows: Arc<HashMap<String, GuidedFlowDefinition>>,
        settings: NavigationSettings,
        debug: bool,
    ) -> Self {
        Self {
            resolver,
            guards,
            flows,
            settings,
            debug,
        }
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    async fn handle(
        &self,
        intent: &NavigationIntent,
        store: &StoreAccessor,
    ) -> Result<NavigationOutcome, StoreError> {
        let state = store.select_state::<NavigationState>().await?;
        let plan = self.plan(intent, &state, store).await;

        let (update, outcome, completed) = match plan {
            Plan::Commit {
                update,
                outcome,
                completed,
            } => (update, outcome, completed),
            Plan::Skip(outcome) => {
                if self.debug {
                    tracing::debug!(intent = ?intent, outcome = ?outcome, "Navigation intent skipped");
                }
                return Ok(outcome);
            }
        };

        let depth = update.back_stack.len();
        let outcome = match store.dispatch_and_await(NavigationAction::Apply(update)).await? {
            DispatchOutcome::Processed => {
                if let Some(callback) = completed {
                    callback.invoke(store);
                }
                outcome
            }
            DispatchOutcome::Blocked => NavigationOutcome::Blocked,
            DispatchOutcome::Error(cause) => NavigationOutcome::Failed(cause.to_string()),
        };

        if self.debug {
            tracing::debug!(depth, outcome = ?outcome, "Navigation update committed");
        }
        Ok(outcome)
    }

    async fn plan(
        &self,
        intent: &NavigationIntent,
        state: &NavigationState,
        store: &StoreAccessor,
    ) -> Plan {
        match intent {
            NavigationIntent::Navigate {
                route,
                params,
                options,
            } => {
                self.plan_navigate(
                    store,
                    state,
                    route,
                    params.clone(),
                    options,
                    state.pending_navigation.clone(),
                )
                .await
            }

            NavigationIntent::Back => {
                let mut update = state.to_update();
                match update.pop() {
                    Some(_) => Plan::commit(update, NavigationOutcome::Committed),
                    None => Plan::Skip(NavigationOutcome::Ignored),
                }
            }

            NavigationIntent::PopUpTo { route, inclusive } => {
                let mut update = state.to_update();
                if !update.pop_up_to(self.matcher(route), *inclusive) || update.back_stack.is_empty()
                {
                    return Plan::Skip(NavigationOutcome::Ignored);
                }
                Plan::commit(update, NavigationOutcome::Committed)
            }

            NavigationIntent::ClearBackStack => {
                let mut update = state.to_update();
                if !update.clear_to_root() {
                    return Plan::Skip(NavigationOutcome::Ignored);
                }
                Plan::commit(update, NavigationOutcome::Committed)
            }

            NavigationIntent::DismissModal => {
                let mut update = state.to_update();
                if !update.dismiss_modal() {
                    return Plan::Skip(NavigationOutcome::Ignored);
                }
                Plan::commit(update, NavigationOutcome::Committed)
            }

            NavigationIntent::ResumePendingNavigation => {
                let Some(pending) = &state.pending_navigation else {
                    return Plan::Skip(NavigationOutcome::Ignored);
                };
                tracing::debug!(route = %pending.route, "Resuming pending navigation");
                self.plan_navigate(
                    store,
                    state,
                    &pending.route,
                    pending.params.clone(),
                    &NavOptions::default(),
                    None,
                )
                .await
            }

            NavigationIntent::StartGuidedFlow(definition) => {
                self.start_flow(store, state, definition.clone()).await
            }

            NavigationIntent::StartNamedGuidedFlow(name) => match self.flows.get(name) {
                Some(definition) => self.start_flow(store, state, definition.clone()).await,
                None => {
                    tracing::warn!(flow = %name, "Unknown guided flow");
                    Plan::Skip(NavigationOutcome::Ignored)
                }
            },

            NavigationIntent::NextStep => {
                let Some(flow) = state.guided_flow.as_ref().filter(|f| !f.is_completed()) else {
                    return Plan::Skip(NavigationOutcome::Ignored);
                };
                let (next, completed) = flow.advance();
                self.settle_flow(store, state, next, completed).await
            }

            NavigationIntent::PreviousStep => {
                let Some(previous) = state.guided_flow.as_ref().and_then(GuidedFlowState::retreat)
                else {
                    return Plan::Skip(NavigationOutcome::Ignored);
                };
                let Some(step) = previous.current().cloned() else {
                    return Plan::Skip(NavigationOutcome::Ignored);
                };

                let path = normalize(&step.route);
                let mut update = state.to_update();
                if update.pop_up_to(|entry| entry.path == path, false) {
                    update.guided_flow = Some(previous);
                    return Plan::commit(update, NavigationOutcome::Committed);
                }
                self.plan_navigate(
                    store,
                    state,
                    &step.route,
                    step.params,
                    &NavOptions::default(),
                    state.pending_navigation.clone(),
                )
                .await
                .with_flow(previous)
            }

            NavigationIntent::ModifyGuidedFlow(modifications) => {
                let Some(flow) = &state.guided_flow else {
                    return Plan::Skip(NavigationOutcome::Ignored);
                };
                let modified = modifications
                    .iter()
                    .fold(flow.clone(), |flow, modification| flow.modify(modification));
                let mut update = state.to_update();
                update.guided_flow = Some(modified);
                Plan::commit(update, NavigationOutcome::Committed)
            }

            NavigationIntent::GuidedFlowBatch(batch) => {
                let Some(flow) = &state.guided_flow else {
                    return Plan::Skip(NavigationOutcome::Ignored);
                };
                let (next, completed) = batch.apply(flow);
                if batch.advance && !flow.is_completed() {
                    self.settle_flow(store, state, next, completed).await
                } else {
                    let mut update = state.to_update();
                    update.guided_flow = Some(next);
                    Plan::commit(update, NavigationOutcome::Committed)
                }
            }
        }
    }

    async fn start_flow(
        &self,
        store: &StoreAccessor,
        state: &NavigationState,
        definition: GuidedFlowDefinition,
    ) -> Plan {
        let flow = GuidedFlowState::start(definition);
        let Some(step) = flow.current().cloned() else {
            tracing::warn!(flow = %flow.definition.name, "Guided flow has no steps");
            return Plan::Skip(NavigationOutcome::Ignored);
        };
        tracing::debug!(flow = %flow.definition.name, steps = flow.definition.len(), "Guided flow started");

        self.plan_navigate(
            store,
            state,
            &step.route,
            step.params,
            &NavOptions::default(),
            state.pending_navigation.clone(),
        )
        .await
        .with_flow(flow)
    }

    /// Commit an advanced flow: navigate to its new step, or record completion.
    async fn settle_flow(
        &self,
        store: &StoreAccessor,
        state: &NavigationState,
        flow: GuidedFlowState,
        completed: bool,
    ) -> Plan {
        if completed {
            tracing::debug!(flow = %flow.definition.name, "Guided flow completed");
            let callback = flow.definition.on_complete.clone();
            let mut update = state.to_update();
            update.guided_flow = Some(flow);
            return Plan::Commit {
                update,
                outcome: NavigationOutcome::Committed,
                completed: callback,
            };
        }

        let Some(step) = flow.current().cloned() else {
            return Plan::Skip(NavigationOutcome::Ignored);
        };
        self.plan_navigate(
            store,
            state,
            &step.route,
            step.params,
            &NavOptions::default(),
            state.pending_navigation.clone(),
        )
        .await
        .with_flow(flow)
    }

    /// Resolve, run guards (following redirects), then push.
    async fn plan_navigate(
        &self,
        store: &StoreAccessor,
        state: &NavigationState,
        route: &str,
        params: Params,
        options: &NavOptions,
        mut pending: Option<PendingNavigation>,
    ) -> Plan {
        let from = state.current().cloned();
        let mut target = route.to_string();
        let mut params = params;
        let mut redirects = 0;

        let resolution = loop {
            let Some(resolution) = self.resolver.resolve(&target) else {
                tracing::warn!(path = %target, "Route not resolved");
                return Plan::Skip(NavigationOutcome::NotFound { path: target });
            };
            if self.debug {
                tracing::debug!(
                    path = %target,
                    full_path = %resolution.full_path,
                    kind = ?resolution.kind,
                    "Route resolved"
                );
            }

            let request = NavigationRequest {
                resolution,
                params: params.clone(),
                from: from.clone(),
            };
            let redirect_to = match self.guards.evaluate(store, &request).await {
                GuardResult::Allow => break request.resolution,
                GuardResult::Reject => {
                    tracing::debug!(path = %request.path(), "Navigation rejected by guard");
                    return Plan::Skip(NavigationOutcome::Rejected);
                }
                GuardResult::RedirectTo(to) => to,
                GuardResult::PendAndRedirectTo {
                    route: to,
                    metadata,
                    hint,
                } => {
                    pending = Some(PendingNavigation {
                        route: request.resolution.path.clone(),
                        params: params.clone(),
                        metadata,
                        hint,
                        created_at: SystemTime::now(),
                    });
                    to
                }
            };

            redirects += 1;
            if redirects > self.settings.max_redirects {
                tracing::error!(
                    path = %route,
                    max_redirects = self.settings.max_redirects,
                    "Too many guard redirects, navigation rejected"
                );
                return Plan::Skip(NavigationOutcome::Rejected);
            }
            tracing::debug!(from = %target, to = %redirect_to, "Guard redirected navigation");
            target = redirect_to;
            params = Params::new();
        };

        let mut update = state.to_update();
        update.pending_navigation = pending;
        if options.clear_back_stack {
            update.clear_all();
        } else if let Some(pop_route) = &options.pop_up_to {
            if !update.pop_up_to(self.matcher(pop_route), options.inclusive) {
                tracing::debug!(route = %pop_route, "pop_up_to target not in back stack");
            }
        }
        update.push(
            NavigationEntry::from_resolution(&resolution, params),
            options.single_top,
        );

        let outcome = if redirects > 0 {
            NavigationOutcome::Redirected {
                to: resolution.path.clone(),
            }
        } else {
            NavigationOutcome::Committed
        };
        Plan::commit(update, outcome)
    }

    /// Entries on the path `route`, or showing the destination it resolves to.
    fn matcher(&self, route: &str) -> impl Fn(&NavigationEntry) -> bool {
        let path = normalize(route);
        let resolution = self
            .resolver
            .resolve(route)
            .filter(|resolution| resolution.kind != ResolutionKind::NotFound);
        move |entry: &NavigationEntry| {
            entry.path == path
                || resolution.as_ref().is_some_and(|resolution| {
                    entry.graph_id == resolution.graph_id
                        && entry.destination == resolution.destination
                })
        }
    }
}

#[async_trait]
impl ModuleLogic for NavigationLogic {
    type Action = NavigationAction;

    const ORDERED: bool = true;

    async fn on_action(&self, action: &NavigationAction, store: &StoreAccessor) -> anyhow::Result<()> {
        let NavigationAction::Intent { intent, done } = action else {
            return Ok(());
        };

        let span = tracing::debug_span!("logic", module = "navigation", intent = ?intent);
        match self.handle(intent, store).instrument(span).await {
            Ok(outcome) => {
                done.complete(outcome);
                Ok(())
            }
            Err(e) => {
                done.complete(NavigationOutcome::Failed(e.to_string()));
                Err(e.into())
            }
        }
    }
}
