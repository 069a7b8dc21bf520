use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debug: DebugCategories,
    #[serde(default)]
    pub navigation: NavigationSettings,
}

/// Debug log categories, injected into the store at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugCategories {
    /// Log every dispatched action through the logging middleware.
    #[serde(default)]
    pub actions: bool,
    /// Log the new state after each reduction.
    #[serde(default)]
    pub state: bool,
    /// Wrap logic invocations in tracing spans.
    #[serde(default)]
    pub logic: bool,
    /// Log route resolution and back stack changes.
    #[serde(default)]
    pub navigation: bool,
}

impl DebugCategories {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            actions: true,
            state: true,
            logic: true,
            navigation: true,
        }
    }
}

/// Route resolver and navigation logic settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSettings {
    /// Resolve a bare leaf route declared anywhere in the tree (default: true).
    #[serde(default = "default_legacy_route_fallback")]
    pub legacy_route_fallback: bool,
    /// Reject ambiguous bare routes when the resolver is built (default: false).
    #[serde(default)]
    pub strict_bare_routes: bool,
    /// Guard redirects followed before a navigation is rejected (default: 5).
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
}

fn default_legacy_route_fallback() -> bool {
    true
}

fn default_max_redirects() -> u32 {
    5
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            legacy_route_fallback: default_legacy_route_fallback(),
            strict_bare_routes: false,
            max_redirects: default_max_redirects(),
        }
    }
}
