//! Data-driven navigation on top of the store.
//!
//! Screens, modals and nested graphs are plain data. A [`RouteResolver`]
//! indexes the graph once; the [`NavigationModule`] keeps the back stack
//! as ordinary module state and its logic turns intents into updates:
//!
//! ```text
//! Navigator ──→ Intent ──→ NavigationLogic ──→ resolve + guards
//!                                │
//!                                └─→ Apply(update) ──→ reducer ──→ NavigationState
//!                                                                   (view recomputed)
//! ```

mod action;
mod backstack;
mod destination;
mod entry;
mod graph;
mod guard;
mod guided_flow;
mod logic;
mod module;
mod navigator;
mod resolver;
mod state;
mod template;
mod view;

pub use action::{Completion, NavOptions, NavigationAction, NavigationIntent, NavigationOutcome};
pub use destination::{Destination, DestinationKind, Params, RenderLayer, Transition};
pub use entry::{ModalContext, NavigationEntry};
pub use graph::{GraphLoadError, NavigationGraph, StartDestination};
pub use guard::{Guard, GuardRegistry, GuardResult, NavigationRequest, PendingNavigation};
pub use guided_flow::{
    CompletionCallback, GuidedFlowBatch, GuidedFlowDefinition, GuidedFlowModification,
    GuidedFlowState, GuidedFlowStep,
};
pub use logic::NavigationLogic;
pub use module::NavigationModule;
pub use navigator::Navigator;
pub use resolver::{ResolutionKind, ResolverOptions, RouteResolution, RouteResolver, RouteTarget};
pub use state::{NavigationState, NavigationUpdate};
pub use view::{ordered_back_stack, Breadcrumb, NavigationView};
