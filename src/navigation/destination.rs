//! Leaf destinations: screens and modals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Path parameters extracted from `{name}` segments.
pub type Params = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    #[default]
    Screen,
    Modal,
}

/// Render layer a destination is drawn on, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RenderLayer {
    #[default]
    Content,
    GlobalOverlay,
    System,
}

/// Enter/exit animation tag. Opaque to the navigation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    None,
    Fade,
    SlideHorizontal,
    SlideVertical,
    Scale,
}

/// A screen or modal that can sit on the back stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Route template relative to the declaring graph, e.g. `detail/{id}`.
    pub route: String,
    #[serde(default)]
    pub kind: DestinationKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub enter: Transition,
    #[serde(default)]
    pub exit: Transition,
    #[serde(default)]
    pub layer: RenderLayer,
}

impl Destination {
    pub fn screen(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            kind: DestinationKind::Screen,
            title: None,
            enter: Transition::None,
            exit: Transition::None,
            layer: RenderLayer::Content,
        }
    }

    pub fn modal(route: impl Into<String>) -> Self {
        Self {
            kind: DestinationKind::Modal,
            ..Self::screen(route)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_layer(mut self, layer: RenderLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_transitions(mut self, enter: Transition, exit: Transition) -> Self {
        self.enter = enter;
        self.exit = exit;
        self
    }

    pub fn is_modal(&self) -> bool {
        self.kind == DestinationKind::Modal
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}
