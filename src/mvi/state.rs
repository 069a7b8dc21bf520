//! Base trait for module state.

/// Marker trait for module state objects.
///
/// States should be:
/// - Immutable (every transition produces a new instance)
/// - Self-contained (all data the feature needs)
/// - Cheap enough to clone, the reducer receives an owned copy
pub trait ModuleState: Clone + std::fmt::Debug + Send + Sync + 'static {}
