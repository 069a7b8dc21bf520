//! Action dispatch core.
//!
//! The [`Store`] owns every module's state cell and serializes all state
//! mutation through one processing loop fed by two lanes:
//!
//! ```text
//! dispatch ─┬─→ high lane ───┐
//!           └─→ normal lane ─┴─→ middleware chain ─→ reducer ─→ state cell
//!                                                                  │
//!                                   logic unit (spawned task) ←────┘
//! ```
//!
//! The high lane is always polled first; an action already being processed
//! is never interrupted.

mod accessor;
mod action;
mod core;
mod crash;
mod lifecycle;
mod middleware;
mod persistence;
mod registry;
mod snapshot;

pub use accessor::StoreAccessor;
pub use action::{ActionRef, AnyAction};
pub use core::{DispatchOutcome, ResetOutcome, Store, StoreBuilder};
pub use crash::{CrashListener, CrashVote, LogicCrash};
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareContext, Next};
pub use persistence::{InMemoryPersistence, PersistenceStrategy};
pub use registry::{ModuleKey, ModuleRecord, Registry};
pub use snapshot::StateSnapshot;

pub(crate) use registry::StateRef;
