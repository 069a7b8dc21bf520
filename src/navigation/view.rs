//! Values derived from the back stack.
//!
//! Always recomputed from scratch: the view is a pure function of the
//! back stack, the modal contexts and the known graph paths.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::destination::RenderLayer;
use super::entry::{ModalContext, NavigationEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub segment: String,
    /// Path up to and including this segment.
    pub path: String,
    /// Whether `path` names a graph rather than a leaf segment.
    pub is_graph: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationView {
    /// Back stack with `stack_position` matching each index.
    pub back_stack: Vec<NavigationEntry>,
    /// What is on screen, sorted by z-index.
    pub visible_layers: Vec<NavigationEntry>,
    pub layers: BTreeMap<RenderLayer, Vec<NavigationEntry>>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub current_path: String,
    pub can_go_back: bool,
    pub has_modals_in_stack: bool,
}

/// Reassign `stack_position` from list order.
pub fn ordered_back_stack(back_stack: &[NavigationEntry]) -> Vec<NavigationEntry> {
    back_stack
        .iter()
        .enumerate()
        .map(|(position, entry)| entry.clone().at_position(position))
        .collect()
}

impl NavigationView {
    pub fn compute(
        back_stack: &[NavigationEntry],
        modal_contexts: &[ModalContext],
        graph_paths: &BTreeSet<String>,
    ) -> Self {
        let back_stack = ordered_back_stack(back_stack);

        let mut layers: BTreeMap<RenderLayer, Vec<NavigationEntry>> = BTreeMap::new();
        for entry in &back_stack {
            layers.entry(entry.layer()).or_default().push(entry.clone());
        }

        let current_path = back_stack
            .last()
            .map(|entry| entry.path.clone())
            .unwrap_or_default();

        Self {
            visible_layers: visible_layers(&back_stack, modal_contexts),
            breadcrumbs: breadcrumbs(&current_path, graph_paths),
            can_go_back: back_stack.len() > 1,
            has_modals_in_stack: back_stack.iter().any(NavigationEntry::is_modal),
            current_path,
            layers,
            back_stack,
        }
    }

    pub fn current(&self) -> Option<&NavigationEntry> {
        self.back_stack.last()
    }
}

fn visible_layers(
    back_stack: &[NavigationEntry],
    modal_contexts: &[ModalContext],
) -> Vec<NavigationEntry> {
    let Some(top) = back_stack.last() else {
        return Vec::new();
    };
    if !top.is_modal() {
        return vec![top.clone()];
    }

    let below = &back_stack[..back_stack.len() - 1];
    let from_context = modal_contexts
        .iter()
        .find(|context| context.modal_entry.id == top.id)
        .and_then(|context| {
            below
                .iter()
                .find(|entry| entry.id == context.underlying_screen.id)
        });
    let underlying = from_context.or_else(|| below.iter().rev().find(|entry| !entry.is_modal()));

    let mut layers: Vec<NavigationEntry> = underlying.into_iter().cloned().collect();
    layers.push(top.clone());
    layers.sort_by_key(NavigationEntry::z_index);
    layers
}

fn breadcrumbs(current_path: &str, graph_paths: &BTreeSet<String>) -> Vec<Breadcrumb> {
    let mut crumbs = Vec::new();
    let mut path = String::new();
    for segment in current_path.split('/').filter(|s| !s.is_empty()) {
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(segment);
        crumbs.push(Breadcrumb {
            segment: segment.to_string(),
            path: path.clone(),
            is_graph: graph_paths.contains(&path),
        });
    }
    crumbs
}
