//! Error types shared by the store and the navigation engine.
//!
//! - [`ConfigurationError`]: construction-time, fatal
//! - [`StoreError`]: runtime, caller-facing (lookups, closed store, reset)
//! - [`ProcessingError`]: cause carried by `DispatchOutcome::Error`

use thiserror::Error;

use crate::codec::CodecError;

/// Errors detected while building a store or a route index.
///
/// These fail fast before the store becomes usable.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Module '{module}' registers state type '{state}' which is already owned by module '{existing}'")]
    DuplicateState {
        module: &'static str,
        existing: &'static str,
        state: &'static str,
    },

    #[error("Route '{path}' is declared by both graph '{first_graph}' and graph '{second_graph}'")]
    RouteCollision {
        path: String,
        first_graph: String,
        second_graph: String,
    },

    #[error("Graph path '{path}' is declared more than once")]
    DuplicateGraph { path: String },

    #[error("Graph '{graph}' references missing start destination '{target}'")]
    MissingStartDestination { graph: String, target: String },

    #[error("Not-found path '{path}' does not name a destination")]
    UnknownNotFound { path: String },

    #[error("Bare route '{route}' matches {count} destinations")]
    AmbiguousBareRoute { route: String, count: usize },

    #[error("Route template '{path}' could not be compiled: {source}")]
    InvalidTemplate {
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("Store must be built inside a Tokio runtime")]
    NoRuntime,
}

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is closed")]
    Closed,

    #[error("No module registered for '{type_name}'")]
    ModuleNotFound { type_name: &'static str },

    #[error("No state registered for '{type_name}'")]
    StateNotFound { type_name: &'static str },

    #[error("No logic registered for '{type_name}'")]
    LogicNotFound { type_name: &'static str },

    #[error("Store is not initialized yet")]
    NotInitialized,

    #[error("Action was dropped before a reply was sent")]
    NoReply,

    #[error("before_reset hook of module '{module}' failed: {source}")]
    BeforeReset {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Reset task aborted: {0}")]
    ResetAborted(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Why an action did not complete normally.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Middleware failed: {0}")]
    Middleware(#[source] anyhow::Error),

    #[error("Reducer of module '{module}' panicked: {message}")]
    ReducerPanicked { module: &'static str, message: String },

    #[error("Action '{action}' does not belong to module '{module}'")]
    ActionMismatch {
        module: &'static str,
        action: &'static str,
    },

    #[error("State of module '{module}' has an unexpected type")]
    StateMismatch { module: &'static str },

    #[error("No module registered for action '{action}'")]
    ModuleNotFound { action: &'static str },

    #[error("Action was discarded before processing")]
    Discarded,
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
