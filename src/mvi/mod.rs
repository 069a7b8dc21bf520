//! Model-View-Logic-Intent primitives.
//!
//! A feature becomes a [`Module`] by declaring its state, its action family,
//! a pure reducer and a factory for its [`ModuleLogic`].
//!
//! ```text
//! Action ──→ Reducer ──→ State
//!    ↑                     │
//!    └────── Logic ←───────┘
//! ```
//!
//! - **State**: immutable value owned by the store
//! - **Action**: tagged event targeting exactly one module
//! - **Reducer**: pure function `(State, Action) -> State`
//! - **Logic**: async side-effect handler notified after each reduction

mod action;
mod logic;
mod module;
mod state;

pub use action::{ModuleAction, Priority};
pub use logic::{traced, ModuleLogic, NoLogic, Traced};
pub use module::Module;
pub use state::ModuleState;
