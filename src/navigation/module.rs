//! The navigation engine as a store module.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::action::NavigationAction;
use super::destination::Params;
use super::entry::NavigationEntry;
use super::graph::NavigationGraph;
use super::guard::GuardRegistry;
use super::guided_flow::GuidedFlowDefinition;
use super::logic::NavigationLogic;
use super::resolver::{ResolverOptions, RouteResolver};
use super::state::{NavigationState, NavigationUpdate};
use crate::codec::CodecRegistry;
use crate::config::{Config, NavigationSettings};
use crate::error::ConfigurationError;
use crate::mvi::Module;
use crate::store::StoreAccessor;

/// Navigation module: owns [`NavigationState`], commits updates computed
/// by [`NavigationLogic`].
pub struct NavigationModule {
    resolver: Arc<RouteResolver>,
    guards: GuardRegistry,
    flows: Arc<HashMap<String, GuidedFlowDefinition>>,
    settings: NavigationSettings,
    debug: bool,
    graph_paths: BTreeSet<String>,
    initial: NavigationState,
}

impl NavigationModule {
    pub fn new(resolver: RouteResolver) -> Self {
        Self::with_settings(resolver, NavigationSettings::default())
    }

    pub fn with_settings(resolver: RouteResolver, settings: NavigationSettings) -> Self {
        let graph_paths = resolver.graph_paths();
        // Computed once so every reset restores the very same root entry.
        let back_stack: Vec<NavigationEntry> = resolver
            .root_start()
            .map(|start| NavigationEntry::from_resolution(&start, Params::new()))
            .into_iter()
            .collect();
        let initial = NavigationState::from_update(
            NavigationUpdate {
                back_stack,
                ..NavigationUpdate::default()
            },
            &graph_paths,
        );

        Self {
            resolver: Arc::new(resolver),
            guards: GuardRegistry::default(),
            flows: Arc::new(HashMap::new()),
            settings,
            debug: false,
            graph_paths,
            initial,
        }
    }

    /// Build the resolver from `graph` with the `[navigation]` and `[debug]`
    /// config sections applied.
    pub fn from_config(graph: &NavigationGraph, config: &Config) -> Result<Self, ConfigurationError> {
        let resolver =
            RouteResolver::with_options(graph, ResolverOptions::from(&config.navigation))?;
        Ok(Self::with_settings(resolver, config.navigation.clone()).debug(config.debug.navigation))
    }

    pub fn guards(mut self, guards: GuardRegistry) -> Self {
        self.guards = guards;
        self
    }

    /// Register flows startable by name.
    pub fn guided_flow(mut self, definition: GuidedFlowDefinition) -> Self {
        let mut flows = (*self.flows).clone();
        flows.insert(definition.name.clone(), definition);
        self.flows = Arc::new(flows);
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn resolver(&self) -> &Arc<RouteResolver> {
        &self.resolver
    }
}

impl Module for NavigationModule {
    const NAME: &'static str = "navigation";

    type State = NavigationState;
    type Action = NavigationAction;
    type Logic = NavigationLogic;

    fn initial_state(&self) -> NavigationState {
        self.initial.clone()
    }

    fn reduce(&self, state: NavigationState, action: NavigationAction) -> NavigationState {
        match action {
            NavigationAction::Intent { .. } => state,
            NavigationAction::Apply(update) => NavigationState::from_update(update, &self.graph_paths),
        }
    }

    fn create_logic(&self, _store: StoreAccessor) -> Self::Logic {
        NavigationLogic::new(
            Arc::clone(&self.resolver),
            self.guards.clone(),
            Arc::clone(&self.flows),
            self.settings.clone(),
            self.debug,
        )
    }

    fn register_codecs(&self, codecs: &mut CodecRegistry) {
        codecs.register::<NavigationState>(Self::NAME);
    }
}
