//! Store and navigation configuration.
//!
//! Loaded from `~/.config/mvli/config.toml` and passed into the store
//! builder explicitly; nothing here is process-wide state.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, DebugCategories, NavigationSettings};
