//! Precomputed route index.
//!
//! Built once from the root [`NavigationGraph`]. Resolution precedence:
//!
//! 1. exact full path
//! 2. bare route of a root-level leaf
//! 3. graph path, resolved to the graph's start destination
//! 4. parameterized template, looked up by segment count and first segment
//! 5. legacy bare route declared anywhere (unique matches only)
//! 6. the configured not-found destination

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::destination::{Destination, Params};
use super::graph::{NavigationGraph, StartDestination};
use super::template::{is_parameterized, join, normalize, RouteTemplate};
use crate::config::NavigationSettings;
use crate::error::ConfigurationError;

/// Resolver construction switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub legacy_route_fallback: bool,
    pub strict_bare_routes: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&NavigationSettings::default())
    }
}

impl From<&NavigationSettings> for ResolverOptions {
    fn from(settings: &NavigationSettings) -> Self {
        Self {
            legacy_route_fallback: settings.legacy_route_fallback,
            strict_bare_routes: settings.strict_bare_routes,
        }
    }
}

/// A registered leaf with its location in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTarget {
    pub destination: Arc<Destination>,
    pub graph_id: String,
    pub full_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    /// Full path or root-level bare route.
    Direct,
    /// The path named a graph; the destination is its start.
    GraphReference,
    /// Matched a `{param}` template.
    Parameterized,
    /// Matched a nested leaf by its bare route.
    Legacy,
    /// Fell through to the not-found destination.
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteResolution {
    pub destination: Arc<Destination>,
    pub graph_id: String,
    /// Full path (template) of the resolved leaf.
    pub full_path: String,
    /// Concrete path to record on the back stack.
    pub path: String,
    pub params: Params,
    pub kind: ResolutionKind,
}

impl RouteResolution {
    fn new(target: &RouteTarget, path: String, params: Params, kind: ResolutionKind) -> Self {
        Self {
            destination: Arc::clone(&target.destination),
            graph_id: target.graph_id.clone(),
            full_path: target.full_path.clone(),
            path,
            params,
            kind,
        }
    }
}

struct TemplateEntry {
    template: RouteTemplate,
    target: usize,
}

/// Immutable route index.
pub struct RouteResolver {
    root_id: String,
    targets: Vec<RouteTarget>,
    exact: HashMap<String, usize>,
    root_routes: HashMap<String, usize>,
    graph_starts: HashMap<String, Option<usize>>,
    templates: HashMap<(usize, Option<String>), Vec<TemplateEntry>>,
    bare_routes: HashMap<String, Vec<usize>>,
    not_found: Option<usize>,
    options: ResolverOptions,
}

impl RouteResolver {
    pub fn new(root: &NavigationGraph) -> Result<Self, ConfigurationError> {
        Self::with_options(root, ResolverOptions::default())
    }

    pub fn with_options(
        root: &NavigationGraph,
        options: ResolverOptions,
    ) -> Result<Self, ConfigurationError> {
        let mut resolver = Self {
            root_id: root.id.clone(),
            targets: Vec::new(),
            exact: HashMap::new(),
            root_routes: HashMap::new(),
            graph_starts: HashMap::new(),
            templates: HashMap::new(),
            bare_routes: HashMap::new(),
            not_found: None,
            options,
        };
        resolver.index_graph(root, "", true)?;

        if options.strict_bare_routes {
            if let Some((route, matches)) = resolver
                .bare_routes
                .iter()
                .find(|(_, matches)| matches.len() > 1)
            {
                return Err(ConfigurationError::AmbiguousBareRoute {
                    route: route.clone(),
                    count: matches.len(),
                });
            }
        }

        if let Some(path) = &root.not_found {
            let path = normalize(path);
            let target = resolver
                .exact
                .get(&path)
                .copied()
                .ok_or(ConfigurationError::UnknownNotFound { path })?;
            resolver.not_found = Some(target);
        }

        tracing::debug!(
            root = %resolver.root_id,
            leaves = resolver.targets.len(),
            graphs = resolver.graph_starts.len(),
            "Route index built"
        );
        Ok(resolver)
    }

    /// Index `graph` whose full path is `prefix`; returns its start target.
    fn index_graph(
        &mut self,
        graph: &NavigationGraph,
        prefix: &str,
        is_root: bool,
    ) -> Result<Option<usize>, ConfigurationError> {
        if self.graph_starts.contains_key(prefix) {
            return Err(ConfigurationError::DuplicateGraph {
                path: prefix.to_string(),
            });
        }
        // Reserve the path so nested duplicates are caught.
        self.graph_starts.insert(prefix.to_string(), None);

        let mut local_routes = HashMap::new();
        for destination in &graph.destinations {
            let index = self.add_leaf(graph, prefix, destination, is_root)?;
            local_routes.insert(normalize(&destination.route), index);
        }

        let mut child_starts = HashMap::new();
        for child in &graph.graphs {
            let child_prefix = join(prefix, &child.id);
            let start = self.index_graph(child, &child_prefix, false)?;
            child_starts.insert(child.id.as_str(), start);
        }

        let start = match &graph.start {
            None => None,
            Some(StartDestination::Route(route)) => {
                let index = local_routes.get(&normalize(route)).copied().ok_or_else(|| {
                    ConfigurationError::MissingStartDestination {
                        graph: graph.id.clone(),
                        target: route.clone(),
                    }
                })?;
                Some(index)
            }
            Some(StartDestination::Graph(id)) => {
                *child_starts.get(id.as_str()).ok_or_else(|| {
                    ConfigurationError::MissingStartDestination {
                        graph: graph.id.clone(),
                        target: id.clone(),
                    }
                })?
            }
        };

        if start.is_none() && !is_root {
            tracing::debug!(graph = %graph.id, "Graph has no start destination");
        }
        self.graph_starts.insert(prefix.to_string(), start);
        Ok(start)
    }

    fn add_leaf(
        &mut self,
        graph: &NavigationGraph,
        prefix: &str,
        destination: &Destination,
        is_root: bool,
    ) -> Result<usize, ConfigurationError> {
        let full_path = join(prefix, &destination.route);
        if let Some(&existing) = self.exact.get(&full_path) {
            return Err(ConfigurationError::RouteCollision {
                path: full_path,
                first_graph: self.targets[existing].graph_id.clone(),
                second_graph: graph.id.clone(),
            });
        }

        let index = self.targets.len();
        self.targets.push(RouteTarget {
            destination: Arc::new(destination.clone()),
            graph_id: graph.id.clone(),
            full_path: full_path.clone(),
        });
        self.exact.insert(full_path.clone(), index);

        let route = normalize(&destination.route);
        if is_parameterized(&full_path) {
            let template = RouteTemplate::compile(&full_path)?;
            self.templates
                .entry(template.bucket())
                .or_default()
                .push(TemplateEntry { template, target: index });
        } else {
            self.bare_routes.entry(route.clone()).or_default().push(index);
            if is_root {
                self.root_routes.insert(route, index);
            }
        }
        Ok(index)
    }

    /// Resolve `path` through the precedence chain. `None` only when nothing
    /// matched and no not-found destination is configured.
    pub fn resolve(&self, path: &str) -> Option<RouteResolution> {
        let path = normalize(path);

        if let Some(&index) = self.exact.get(&path) {
            if !is_parameterized(&self.targets[index].full_path) {
                return Some(self.direct(index, path));
            }
        }

        if let Some(&index) = self.root_routes.get(&path) {
            return Some(self.direct(index, path));
        }

        if let Some(start) = self.graph_starts.get(&path) {
            match start {
                Some(index) => {
                    let target = &self.targets[*index];
                    return Some(RouteResolution::new(
                        target,
                        target.full_path.clone(),
                        Params::new(),
                        ResolutionKind::GraphReference,
                    ));
                }
                None => {
                    tracing::debug!(path = %path, "Graph has no start destination");
                    return self.not_found(path);
                }
            }
        }

        if let Some(resolution) = self.match_template(&path) {
            return Some(resolution);
        }

        if self.options.legacy_route_fallback {
            if let Some(resolution) = self.legacy(&path) {
                return Some(resolution);
            }
        }

        self.not_found(path)
    }

    fn direct(&self, index: usize, path: String) -> RouteResolution {
        RouteResolution::new(
            &self.targets[index],
            path,
            Params::new(),
            ResolutionKind::Direct,
        )
    }

    fn match_template(&self, path: &str) -> Option<RouteResolution> {
        let segments = path.split('/').count();
        let first = path.split('/').next().map(str::to_string);

        let keyed = self.templates.get(&(segments, first)).into_iter().flatten();
        let leading_param = self.templates.get(&(segments, None)).into_iter().flatten();

        keyed.chain(leading_param).find_map(|entry| {
            let params = entry.template.captures(path)?;
            tracing::trace!(path, template = entry.template.pattern(), "Template matched");
            Some(RouteResolution::new(
                &self.targets[entry.target],
                path.to_string(),
                params,
                ResolutionKind::Parameterized,
            ))
        })
    }

    fn legacy(&self, path: &str) -> Option<RouteResolution> {
        let matches = self.bare_routes.get(path)?;
        match matches.as_slice() {
            [index] => {
                let target = &self.targets[*index];
                tracing::warn!(
                    route = %path,
                    full_path = %target.full_path,
                    "Resolved bare route through the legacy fallback; use the full path"
                );
                Some(RouteResolution::new(
                    target,
                    target.full_path.clone(),
                    Params::new(),
                    ResolutionKind::Legacy,
                ))
            }
            _ => {
                tracing::error!(
                    route = %path,
                    count = matches.len(),
                    "Ambiguous bare route, not resolving"
                );
                None
            }
        }
    }

    fn not_found(&self, path: String) -> Option<RouteResolution> {
        let index = self.not_found?;
        tracing::debug!(path = %path, "Route not found, using fallback destination");
        Some(RouteResolution::new(
            &self.targets[index],
            self.targets[index].full_path.clone(),
            Params::new(),
            ResolutionKind::NotFound,
        ))
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Every leaf in declaration order (depth-first).
    pub fn targets(&self) -> &[RouteTarget] {
        &self.targets
    }

    /// Full path of the leaf `destination` declared by graph `graph_id`.
    ///
    /// Destinations compare by value, so the graph id is what tells apart
    /// equal leaves declared in different graphs.
    pub fn full_path_of(&self, graph_id: &str, destination: &Destination) -> Option<&str> {
        self.targets
            .iter()
            .find(|target| target.graph_id == graph_id && *target.destination == *destination)
            .map(|target| target.full_path.as_str())
    }

    /// Full paths of every nested graph (the root's empty path excluded).
    pub fn graph_paths(&self) -> BTreeSet<String> {
        self.graph_starts
            .keys()
            .filter(|path| !path.is_empty())
            .cloned()
            .collect()
    }

    pub fn is_graph_path(&self, path: &str) -> bool {
        let path = normalize(path);
        !path.is_empty() && self.graph_starts.contains_key(&path)
    }

    /// Start destination of the root graph, the initial back stack entry.
    pub fn root_start(&self) -> Option<RouteResolution> {
        let index = (*self.graph_starts.get("")?)?;
        let target = &self.targets[index];
        Some(RouteResolution::new(
            target,
            target.full_path.clone(),
            Params::new(),
            ResolutionKind::GraphReference,
        ))
    }

    /// Bare routes declared by more than one leaf.
    pub fn ambiguous_bare_routes(&self) -> Vec<(&str, usize)> {
        let mut ambiguous: Vec<_> = self
            .bare_routes
            .iter()
            .filter(|(_, matches)| matches.len() > 1)
            .map(|(route, matches)| (route.as_str(), matches.len()))
            .collect();
        ambiguous.sort_unstable();
        ambiguous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> NavigationGraph {
        NavigationGraph::new("app")
            .start_route("home")
            .destination(Destination::screen("home"))
            .destination(Destination::screen("home/detail/{id}"))
            .destination(Destination::modal("confirm"))
            .graph(
                NavigationGraph::new("settings")
                    .start_graph("account")
                    .destination(Destination::screen("about"))
                    .graph(
                        NavigationGraph::new("account")
                            .start_route("overview")
                            .destination(Destination::screen("overview"))
                            .destination(Destination::screen("user/{userId}/posts/{postId}")),
                    ),
            )
            .graph(NavigationGraph::new("empty").destination(Destination::screen("lonely")))
    }

    #[test]
    fn parameterized_leaf_extracts_params() {
        let resolver = RouteResolver::new(&app()).unwrap();
        let resolution = resolver.resolve("home/detail/42").unwrap();

        assert_eq!(resolution.destination.route, "home/detail/{id}");
        assert_eq!(resolution.kind, ResolutionKind::Parameterized);
        assert_eq!(resolution.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(resolution.path, "home/detail/42");
    }

    #[test]
    fn full_paths_join_graph_ids() {
        let resolver = RouteResolver::new(&app()).unwrap();
        let about = resolver.resolve("settings/about").unwrap();
        assert_eq!(about.kind, ResolutionKind::Direct);
        assert_eq!(about.graph_id, "settings");

        let posts = resolver.resolve("settings/account/user/7/posts/9").unwrap();
        assert_eq!(posts.params["userId"], "7");
        assert_eq!(posts.params["postId"], "9");
    }

    #[test]
    fn graph_reference_chases_nested_start() {
        let resolver = RouteResolver::new(&app()).unwrap();
        let resolution = resolver.resolve("settings").unwrap();

        assert_eq!(resolution.kind, ResolutionKind::GraphReference);
        assert_eq!(resolution.full_path, "settings/account/overview");
        assert_eq!(resolution.path, "settings/account/overview");
    }

    #[test]
    fn graph_without_start_is_unresolvable() {
        let resolver = RouteResolver::new(&app()).unwrap();
        assert!(resolver.resolve("empty").is_none());

        let with_fallback = RouteResolver::new(&app().not_found("home")).unwrap();
        let resolution = with_fallback.resolve("empty").unwrap();
        assert_eq!(resolution.kind, ResolutionKind::NotFound);
        assert_eq!(resolution.destination.route, "home");
    }

    #[test]
    fn legacy_fallback_finds_unique_nested_leaf() {
        let resolver = RouteResolver::new(&app()).unwrap();
        let resolution = resolver.resolve("about").unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Legacy);
        assert_eq!(resolution.path, "settings/about");

        let strict_off = RouteResolver::with_options(
            &app(),
            ResolverOptions {
                legacy_route_fallback: false,
                strict_bare_routes: false,
            },
        )
        .unwrap();
        assert!(strict_off.resolve("about").is_none());
    }

    #[test]
    fn ambiguous_bare_route_resolves_to_nothing() {
        let graph = app()
            .graph(NavigationGraph::new("help").destination(Destination::screen("about")));
        let resolver = RouteResolver::new(&graph).unwrap();

        assert!(resolver.resolve("about").is_none());
        assert_eq!(resolver.ambiguous_bare_routes(), vec![("about", 2)]);
    }

    #[test]
    fn strict_mode_rejects_ambiguous_bare_route() {
        let graph = app()
            .graph(NavigationGraph::new("help").destination(Destination::screen("about")));
        let err = RouteResolver::with_options(
            &graph,
            ResolverOptions {
                legacy_route_fallback: true,
                strict_bare_routes: true,
            },
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            ConfigurationError::AmbiguousBareRoute { count: 2, .. }
        ));
    }

    #[test]
    fn colliding_full_paths_fail_construction() {
        let graph = NavigationGraph::new("app")
            .destination(Destination::screen("settings/about"))
            .graph(NavigationGraph::new("settings").destination(Destination::screen("about")));

        let err = RouteResolver::new(&graph).err().unwrap();
        match err {
            ConfigurationError::RouteCollision {
                path,
                first_graph,
                second_graph,
            } => {
                assert_eq!(path, "settings/about");
                assert_eq!(first_graph, "app");
                assert_eq!(second_graph, "settings");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_start_destination_fails_construction() {
        let graph = NavigationGraph::new("app")
            .start_route("nowhere")
            .destination(Destination::screen("home"));
        assert!(matches!(
            RouteResolver::new(&graph).err().unwrap(),
            ConfigurationError::MissingStartDestination { .. }
        ));

        let graph = NavigationGraph::new("app").start_graph("ghost");
        assert!(matches!(
            RouteResolver::new(&graph).err().unwrap(),
            ConfigurationError::MissingStartDestination { .. }
        ));
    }

    #[test]
    fn duplicate_graph_path_fails_construction() {
        let graph = NavigationGraph::new("app")
            .graph(NavigationGraph::new("shop"))
            .graph(NavigationGraph::new("shop"));
        assert!(matches!(
            RouteResolver::new(&graph).err().unwrap(),
            ConfigurationError::DuplicateGraph { .. }
        ));
    }

    #[test]
    fn every_leaf_round_trips() {
        let resolver = RouteResolver::new(&app()).unwrap();
        for target in resolver.targets() {
            let resolution = resolver.resolve(&target.full_path).unwrap();
            assert_eq!(resolution.destination, target.destination, "{}", target.full_path);
        }
    }

    #[test]
    fn root_start_and_graph_paths() {
        let resolver = RouteResolver::new(&app()).unwrap();
        assert_eq!(resolver.root_start().unwrap().path, "home");
        assert!(resolver.is_graph_path("settings/account"));
        assert!(!resolver.is_graph_path("home"));
        assert!(resolver.graph_paths().contains("settings"));
    }
}
