//! Declarative graph of graphs.
//!
//! A graph file (TOML or JSON) mirrors [`NavigationGraph`]:
//!
//! ```toml
//! id = "app"
//! start = { route = "home" }
//! not_found = "missing"
//!
//! [[destination]]
//! route = "home"
//!
//! [[graph]]
//! id = "settings"
//! start = { route = "main" }
//!
//! [[graph.destination]]
//! route = "main"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::destination::Destination;

/// Where a graph lands when navigated to by its own path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartDestination {
    /// Route of a leaf declared directly in the graph.
    Route(String),
    /// Id of a direct child graph, followed to its own start.
    Graph(String),
}

/// A named node holding leaves and nested graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationGraph {
    pub id: String,
    #[serde(default)]
    pub start: Option<StartDestination>,
    /// Full path of the fallback destination. Only read on the root graph.
    #[serde(default)]
    pub not_found: Option<String>,
    #[serde(default, rename = "destination")]
    pub destinations: Vec<Destination>,
    #[serde(default, rename = "graph")]
    pub graphs: Vec<NavigationGraph>,
}

#[derive(Debug, Error)]
pub enum GraphLoadError {
    #[error("Failed to read graph file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse graph file '{path}': {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse graph file '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl NavigationGraph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: None,
            not_found: None,
            destinations: Vec::new(),
            graphs: Vec::new(),
        }
    }

    pub fn start_route(mut self, route: impl Into<String>) -> Self {
        self.start = Some(StartDestination::Route(route.into()));
        self
    }

    pub fn start_graph(mut self, id: impl Into<String>) -> Self {
        self.start = Some(StartDestination::Graph(id.into()));
        self
    }

    pub fn not_found(mut self, path: impl Into<String>) -> Self {
        self.not_found = Some(path.into());
        self
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }

    pub fn graph(mut self, graph: NavigationGraph) -> Self {
        self.graphs.push(graph);
        self
    }

    /// Load a graph file; `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, GraphLoadError> {
        let content = fs::read_to_string(path).map_err(|e| GraphLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content).map_err(|e| GraphLoadError::Json {
                path: path.to_path_buf(),
                source: e,
            })
        } else {
            toml::from_str(&content).map_err(|e| GraphLoadError::Toml {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    /// Leaves declared anywhere in this subtree.
    pub fn leaf_count(&self) -> usize {
        self.destinations.len() + self.graphs.iter().map(Self::leaf_count).sum::<usize>()
    }
}
