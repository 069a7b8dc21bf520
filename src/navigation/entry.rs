//! Back stack entries and modal bookkeeping.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::destination::{Destination, Params, RenderLayer};
use super::resolver::RouteResolution;

/// Z-index distance between two stack positions.
const Z_STEP: usize = 10;
/// Added to a modal's z-index so it paints above a screen at the same depth.
const MODAL_Z_OFFSET: usize = 5;

/// One element of the back stack. Never mutated once created; operations
/// build a new list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub id: Uuid,
    pub destination: Arc<Destination>,
    /// Concrete path, parameters substituted.
    pub path: String,
    pub params: Params,
    pub graph_id: String,
    pub stack_position: usize,
}

impl NavigationEntry {
    pub fn from_resolution(resolution: &RouteResolution, params: Params) -> Self {
        let mut merged = resolution.params.clone();
        merged.extend(params);
        Self {
            id: Uuid::new_v4(),
            destination: Arc::clone(&resolution.destination),
            path: resolution.path.clone(),
            params: merged,
            graph_id: resolution.graph_id.clone(),
            stack_position: 0,
        }
    }

    pub fn is_modal(&self) -> bool {
        self.destination.is_modal()
    }

    pub fn layer(&self) -> RenderLayer {
        self.destination.layer
    }

    pub fn z_index(&self) -> usize {
        let base = self.stack_position * Z_STEP;
        if self.is_modal() {
            base + MODAL_Z_OFFSET
        } else {
            base
        }
    }

    pub(crate) fn at_position(mut self, stack_position: usize) -> Self {
        self.stack_position = stack_position;
        self
    }
}

/// Pairs a modal with the screen it was opened over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalContext {
    pub modal_entry: NavigationEntry,
    pub underlying_screen: NavigationEntry,
    /// Path of a screen pushed on top of the modal, if any.
    pub navigated_away_to: Option<String>,
}
