//! Unidirectional state management and data-driven navigation.
//!
//! ```text
//! dispatch ──→ lanes ──→ middleware ──→ reducer ──→ state cell
//!                ↑                                      │
//!                └────────── logic units ←──────────────┘
//! ```
//!
//! - [`store`]: the action-dispatch core (two priority lanes, middleware
//!   chain, module lifecycle, crash isolation)
//! - [`navigation`]: route resolution, back stack composition and guided
//!   flows, expressed as an ordinary module of the store
//! - [`mvi`]: the traits a feature implements to become a module

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod mvi;
pub mod navigation;
pub mod store;

pub use error::{ConfigurationError, ProcessingError, StoreError};
