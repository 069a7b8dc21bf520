//! Navigation guards and pending navigations.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::destination::Params;
use super::entry::NavigationEntry;
use super::resolver::RouteResolution;
use crate::store::StoreAccessor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    Allow,
    Reject,
    RedirectTo(String),
    /// Remember the requested navigation, then redirect (e.g. to login).
    PendAndRedirectTo {
        route: String,
        metadata: Params,
        hint: Option<String>,
    },
}

/// A navigation about to be committed.
#[derive(Debug, Clone)]
pub struct NavigationRequest {
    pub resolution: RouteResolution,
    pub params: Params,
    /// Entry on top of the back stack when the request was made.
    pub from: Option<NavigationEntry>,
}

impl NavigationRequest {
    pub fn path(&self) -> &str {
        &self.resolution.path
    }
}

/// Evaluated before a navigation commits.
#[async_trait]
pub trait Guard: Send + Sync {
    async fn check(&self, store: &StoreAccessor, request: &NavigationRequest) -> GuardResult;
}

/// A denied navigation kept for later resumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNavigation {
    pub route: String,
    pub params: Params,
    pub metadata: Params,
    pub hint: Option<String>,
    pub created_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GuardScope {
    All,
    /// Paths equal to or nested under the prefix.
    Prefix(String),
}

impl GuardScope {
    fn covers(&self, path: &str) -> bool {
        match self {
            GuardScope::All => true,
            GuardScope::Prefix(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// Guards in registration order, each scoped to a path prefix or to
/// every path (`"*"`).
#[derive(Default, Clone)]
pub struct GuardRegistry {
    guards: Vec<(GuardScope, Arc<dyn Guard>)>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a guard for `scope`: a path prefix such as `account`, or `*`.
    pub fn register(mut self, scope: &str, guard: Arc<dyn Guard>) -> Self {
        let scope = match scope.trim_matches('/') {
            "*" => GuardScope::All,
            prefix => GuardScope::Prefix(prefix.to_string()),
        };
        self.guards.push((scope, guard));
        self
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// First non-`Allow` verdict of the guards covering the request.
    pub async fn evaluate(&self, store: &StoreAccessor, request: &NavigationRequest) -> GuardResult {
        for (scope, guard) in &self.guards {
            if !scope.covers(request.path()) {
                continue;
            }
            let verdict = guard.check(store, request).await;
            if verdict != GuardResult::Allow {
                return verdict;
            }
        }
        GuardResult::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_scope_matches_whole_segments() {
        let scope = GuardScope::Prefix("account".to_string());
        assert!(scope.covers("account"));
        assert!(scope.covers("account/settings"));
        assert!(!scope.covers("accounting"));
        assert!(GuardScope::All.covers("anything"));
    }
}
