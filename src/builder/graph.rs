//! The target dependency graph.
//!
//! Targets live in a petgraph arena in declaration order, so a node index
//! is also the target's declaration position. An edge `u -> v` means `u`
//! depends on `v`. The graph is built once per invocation from the full,
//! flattened descriptor set and is read-only afterwards.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use miette::Diagnostic as MietteDiagnostic;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

use crate::builder::unit::object_collisions;
use crate::core::target::{TargetDescriptor, TargetKind};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// One problem found while validating the target set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DuplicateTarget {
        name: String,
    },
    UnresolvedDependency {
        target: String,
        dependency: String,
    },
    ExecutableDependency {
        target: String,
        dependency: String,
    },
    /// Names along the cycle, first name repeated at the end
    Cycle {
        chain: Vec<String>,
    },
    UnknownTarget {
        name: String,
    },
    ObjectCollision {
        target: String,
        first: String,
        second: String,
        object: String,
    },
    NoSources {
        target: String,
        kind: TargetKind,
    },
    /// `--all` together with explicit targets
    ConflictingSelection {
        targets: Vec<String>,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateTarget { name } => {
                write!(f, "target `{}` is defined more than once", name)
            }
            Violation::UnresolvedDependency { target, dependency } => write!(
                f,
                "target `{}` depends on unknown target `{}`",
                target, dependency
            ),
            Violation::ExecutableDependency { target, dependency } => write!(
                f,
                "target `{}` depends on executable `{}`",
                target, dependency
            ),
            Violation::Cycle { chain } => write!(f, "dependency cycle: {}", chain.join(" -> ")),
            Violation::UnknownTarget { name } => write!(f, "no target named `{}`", name),
            Violation::ObjectCollision {
                target,
                first,
                second,
                object,
            } => write!(
                f,
                "target `{}`: `{}` and `{}` both compile to `{}`",
                target, first, second, object
            ),
            Violation::NoSources { target, kind } => {
                write!(f, "{} target `{}` has no sources", kind, target)
            }
            Violation::ConflictingSelection { targets } => write!(
                f,
                "cannot build all targets and only [{}]",
                targets.join(", ")
            ),
        }
    }
}

/// The target set cannot be built. Carries every violation found.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("invalid build configuration: {}", summarize(.violations))]
#[diagnostic(code(clinker::config::invalid))]
pub struct ConfigurationError {
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigurationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        ConfigurationError { violations }
    }

    /// Cycles reported, as chains.
    pub fn cycles(&self) -> impl Iterator<Item = &[String]> {
        self.violations.iter().filter_map(|v| match v {
            Violation::Cycle { chain } => Some(chain.as_slice()),
            _ => None,
        })
    }

    /// Render for the terminal, one context line per violation.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error("invalid build configuration");
        for violation in &self.violations {
            diag = diag.with_note(violation.to_string());
        }
        if self
            .violations
            .iter()
            .any(|v| matches!(v, Violation::UnknownTarget { .. }))
        {
            diag = diag.with_help(suggestions::TARGET_NOT_FOUND);
        }
        diag
    }
}

/// Targets and their dependency edges, with a fixed topological order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<TargetDescriptor, ()>,
    by_name: HashMap<String, NodeIndex>,
    /// Dependencies before dependents, ties broken by declaration order
    order: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Build and validate the graph of `targets`.
    ///
    /// All violations are collected before failing.
    pub fn build(targets: Vec<TargetDescriptor>) -> Result<Self, ConfigurationError> {
        let mut violations = Vec::new();
        let mut graph = DiGraph::new();
        let mut by_name = HashMap::new();

        for target in targets {
            if by_name.contains_key(&target.name) {
                violations.push(Violation::DuplicateTarget {
                    name: target.name.clone(),
                });
                continue;
            }
            let name = target.name.clone();
            let ix = graph.add_node(target);
            by_name.insert(name, ix);
        }

        for ix in graph.node_indices() {
            violations.extend(check_target(&graph[ix]));
        }

        let mut edges = Vec::new();
        for ix in graph.node_indices() {
            let target = &graph[ix];
            for dep in &target.dependencies {
                match by_name.get(dep) {
                    None => violations.push(Violation::UnresolvedDependency {
                        target: target.name.clone(),
                        dependency: dep.clone(),
                    }),
                    Some(&dep_ix) if graph[dep_ix].kind == TargetKind::Executable => {
                        violations.push(Violation::ExecutableDependency {
                            target: target.name.clone(),
                            dependency: dep.clone(),
                        })
                    }
                    Some(&dep_ix) => edges.push((ix, dep_ix)),
                }
            }
        }
        for (from, to) in edges {
            graph.update_edge(from, to, ());
        }

        if has_cycle(&graph) {
            for cycle in simple_cycles(&graph) {
                let mut chain: Vec<String> =
                    cycle.iter().map(|&ix| graph[ix].name.clone()).collect();
                chain.push(graph[cycle[0]].name.clone());
                violations.push(Violation::Cycle { chain });
            }
        }

        if !violations.is_empty() {
            return Err(ConfigurationError::new(violations));
        }

        let order = topological_order(&graph);
        tracing::debug!(
            "build order: {}",
            order
                .iter()
                .map(|&ix| graph[ix].name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(DependencyGraph {
            graph,
            by_name,
            order,
        })
    }

    /// Nodes with dependencies before dependents.
    pub fn topological_order(&self) -> &[NodeIndex] {
        &self.order
    }

    pub fn target(&self, ix: NodeIndex) -> &TargetDescriptor {
        &self.graph[ix]
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = (NodeIndex, &TargetDescriptor)> {
        self.graph.node_indices().map(move |ix| (ix, &self.graph[ix]))
    }

    /// Direct dependencies of `ix`, in the order they were declared.
    pub fn dependencies(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        let mut deps = Vec::new();
        for name in &self.graph[ix].dependencies {
            if let Some(&dep) = self.by_name.get(name) {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
        deps
    }

    /// Targets that depend directly on `ix`, in declaration order.
    pub fn dependents(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        let mut dependents: Vec<_> = self
            .graph
            .neighbors_directed(ix, Direction::Incoming)
            .collect();
        dependents.sort();
        dependents
    }

    /// Every target `ix` depends on, directly or not, in topological order.
    pub fn transitive_dependencies(&self, ix: NodeIndex) -> Vec<NodeIndex> {
        let reachable = self.closure(&[ix]);
        self.order
            .iter()
            .copied()
            .filter(|&n| n != ix && reachable.contains(&n))
            .collect()
    }

    /// Roots plus their transitive dependencies, in topological order.
    ///
    /// Unknown root names are reported together.
    pub fn build_set(&self, roots: &[String]) -> Result<Vec<NodeIndex>, ConfigurationError> {
        let mut start = Vec::new();
        let mut violations = Vec::new();
        for name in roots {
            match self.by_name.get(name) {
                Some(&ix) => start.push(ix),
                None => violations.push(Violation::UnknownTarget { name: name.clone() }),
            }
        }
        if !violations.is_empty() {
            return Err(ConfigurationError::new(violations));
        }

        let reachable = self.closure(&start);
        Ok(self
            .order
            .iter()
            .copied()
            .filter(|n| reachable.contains(n))
            .collect())
    }

    fn closure(&self, start: &[NodeIndex]) -> HashSet<NodeIndex> {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut stack = start.to_vec();
        while let Some(ix) = stack.pop() {
            if seen.insert(ix) {
                stack.extend(self.graph.neighbors(ix));
            }
        }
        seen
    }

    /// Graphviz rendering, edges pointing from dependent to dependency.
    pub fn to_dot(&self) -> String {
        let labelled = self
            .graph
            .map(|_, target| target.name.clone(), |_, _| String::new());
        format!("{}", Dot::with_config(&labelled, &[Config::EdgeNoLabel]))
    }
}

fn check_target(target: &TargetDescriptor) -> Vec<Violation> {
    let mut violations = Vec::new();
    if target.kind.is_compiled() && target.sources.is_empty() {
        violations.push(Violation::NoSources {
            target: target.name.clone(),
            kind: target.kind,
        });
    }
    for (first, second, object) in object_collisions(target) {
        violations.push(Violation::ObjectCollision {
            target: target.name.clone(),
            first: first.display().to_string(),
            second: second.display().to_string(),
            object: object.display().to_string(),
        });
    }
    violations
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Three-colour depth-first search for a back edge.
fn has_cycle<N>(graph: &DiGraph<N, ()>) -> bool {
    let mut color = vec![Color::White; graph.node_count()];

    for start in graph.node_indices() {
        if color[start.index()] != Color::White {
            continue;
        }
        // (node, its remaining successors)
        let mut stack = vec![(start, graph.neighbors(start).collect::<Vec<_>>())];
        color[start.index()] = Color::Gray;

        while let Some((node, successors)) = stack.last_mut() {
            match successors.pop() {
                Some(next) => match color[next.index()] {
                    Color::Gray => return true,
                    Color::White => {
                        color[next.index()] = Color::Gray;
                        let succ = graph.neighbors(next).collect();
                        stack.push((next, succ));
                    }
                    Color::Black => {}
                },
                None => {
                    color[node.index()] = Color::Black;
                    stack.pop();
                }
            }
        }
    }
    false
}

/// Every simple cycle, each starting at its lowest-index node.
///
/// For each start node the search only visits nodes with a higher index,
/// so every cycle is found exactly once.
fn simple_cycles<N>(graph: &DiGraph<N, ()>) -> Vec<Vec<NodeIndex>> {
    fn sorted_successors<N>(graph: &DiGraph<N, ()>, ix: NodeIndex) -> Vec<NodeIndex> {
        let mut succ: Vec<_> = graph.neighbors(ix).collect();
        succ.sort();
        succ.dedup();
        succ
    }

    fn search<N>(
        graph: &DiGraph<N, ()>,
        start: NodeIndex,
        node: NodeIndex,
        path: &mut Vec<NodeIndex>,
        on_path: &mut [bool],
        cycles: &mut Vec<Vec<NodeIndex>>,
    ) {
        for next in sorted_successors(graph, node) {
            if next == start {
                cycles.push(path.clone());
            } else if next > start && !on_path[next.index()] {
                path.push(next);
                on_path[next.index()] = true;
                search(graph, start, next, path, on_path, cycles);
                on_path[next.index()] = false;
                path.pop();
            }
        }
    }

    let mut cycles = Vec::new();
    let mut on_path = vec![false; graph.node_count()];
    for start in graph.node_indices() {
        let mut path = vec![start];
        on_path[start.index()] = true;
        search(graph, start, start, &mut path, &mut on_path, &mut cycles);
        on_path[start.index()] = false;
    }
    cycles
}

/// Kahn's algorithm; the ready set is ordered by declaration index.
fn topological_order<N>(graph: &DiGraph<N, ()>) -> Vec<NodeIndex> {
    let mut remaining: Vec<usize> = graph
        .node_indices()
        .map(|ix| graph.neighbors(ix).count())
        .collect();
    let mut ready: BTreeSet<NodeIndex> = graph
        .node_indices()
        .filter(|ix| remaining[ix.index()] == 0)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(ix) = ready.pop_first() {
        order.push(ix);
        for dependent in graph.neighbors_directed(ix, Direction::Incoming) {
            remaining[dependent.index()] -= 1;
            if remaining[dependent.index()] == 0 {
                ready.insert(dependent);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, kind: TargetKind, deps: &[&str]) -> TargetDescriptor {
        let mut t = TargetDescriptor::new(name, kind, format!("/p/{}", name));
        if kind.is_compiled() {
            t = t.with_source(format!("/p/{}/{}.cpp", name, name));
        }
        for dep in deps {
            t = t.with_dependency(*dep);
        }
        t
    }

    fn lib(name: &str, deps: &[&str]) -> TargetDescriptor {
        target(name, TargetKind::StaticLibrary, deps)
    }

    fn names(graph: &DependencyGraph, nodes: &[NodeIndex]) -> Vec<String> {
        nodes.iter().map(|&ix| graph.target(ix).name.clone()).collect()
    }

    #[test]
    fn test_topological_order_puts_dependencies_first() {
        let graph = DependencyGraph::build(vec![
            target("app", TargetKind::Executable, &["net", "util"]),
            lib("net", &["util", "headers"]),
            lib("util", &[]),
            target("headers", TargetKind::HeaderOnly, &[]),
        ])
        .unwrap();

        let order = graph.topological_order();
        let pos = |name: &str| order.iter().position(|&ix| graph.target(ix).name == name);
        for (ix, target) in graph.targets() {
            for dep in graph.dependencies(ix) {
                assert!(pos(&graph.target(dep).name) < pos(&target.name));
            }
        }
        assert_eq!(names(&graph, order), vec!["util", "headers", "net", "app"]);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let graph = DependencyGraph::build(vec![lib("c", &[]), lib("a", &[]), lib("b", &[])])
            .unwrap();
        assert_eq!(names(&graph, graph.topological_order()), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_cycle_is_reported_as_chain() {
        let err = DependencyGraph::build(vec![
            lib("A", &["B"]),
            lib("B", &["C"]),
            lib("C", &["A"]),
        ])
        .unwrap_err();

        let cycles: Vec<_> = err.cycles().collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], ["A", "B", "C", "A"]);
        assert!(err.to_string().contains("A -> B -> C -> A"));
    }

    #[test]
    fn test_all_cycles_are_reported() {
        let err = DependencyGraph::build(vec![
            lib("a", &["b"]),
            lib("b", &["a", "c"]),
            lib("c", &["b"]),
            lib("d", &["d"]),
        ])
        .unwrap_err();

        let mut cycles: Vec<Vec<String>> = err.cycles().map(|c| c.to_vec()).collect();
        cycles.sort();
        assert_eq!(
            cycles,
            vec![
                vec!["a", "b", "a"],
                vec!["b", "c", "b"],
                vec!["d", "d"],
            ]
        );
    }

    #[test]
    fn test_unresolved_dependencies_reported_together() {
        let err = DependencyGraph::build(vec![
            lib("X", &["Y", "Z"]),
            target("app", TargetKind::Executable, &["W"]),
        ])
        .unwrap_err();

        assert_eq!(
            err.violations,
            vec![
                Violation::UnresolvedDependency {
                    target: "X".into(),
                    dependency: "Y".into()
                },
                Violation::UnresolvedDependency {
                    target: "X".into(),
                    dependency: "Z".into()
                },
                Violation::UnresolvedDependency {
                    target: "app".into(),
                    dependency: "W".into()
                },
            ]
        );
    }

    #[test]
    fn test_executable_cannot_be_a_dependency() {
        let err = DependencyGraph::build(vec![
            target("tool", TargetKind::Executable, &[]),
            lib("a", &["tool"]),
            lib("b", &["tool"]),
        ])
        .unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err
            .violations
            .iter()
            .all(|v| matches!(v, Violation::ExecutableDependency { dependency, .. } if dependency == "tool")));
    }

    #[test]
    fn test_mixed_violations_collected_in_one_pass() {
        let err = DependencyGraph::build(vec![
            lib("a", &["missing"]),
            lib("a", &[]),
            TargetDescriptor::new("empty", TargetKind::SharedLibrary, "/p/empty"),
        ])
        .unwrap_err();
        assert!(err
            .violations
            .contains(&Violation::DuplicateTarget { name: "a".into() }));
        assert!(err.violations.contains(&Violation::NoSources {
            target: "empty".into(),
            kind: TargetKind::SharedLibrary
        }));
        assert!(err
            .violations
            .iter()
            .any(|v| matches!(v, Violation::UnresolvedDependency { .. })));
        let rendered = err.to_diagnostic().render(false);
        assert!(rendered.contains("target `a` is defined more than once"));
    }

    #[test]
    fn test_build_set_is_closure_of_roots() {
        let graph = DependencyGraph::build(vec![
            target("app", TargetKind::Executable, &["net"]),
            lib("net", &["util"]),
            lib("util", &[]),
            target("other", TargetKind::Executable, &[]),
        ])
        .unwrap();

        let set = graph.build_set(&["app".to_string()]).unwrap();
        assert_eq!(names(&graph, &set), vec!["util", "net", "app"]);

        let net = graph.index_of("net").unwrap();
        assert_eq!(names(&graph, &graph.transitive_dependencies(net)), vec!["util"]);
        assert_eq!(names(&graph, &graph.dependents(net)), vec!["app"]);
    }

    #[test]
    fn test_build_set_unknown_target() {
        let graph = DependencyGraph::build(vec![lib("a", &[])]).unwrap();
        let err = graph
            .build_set(&["nope".to_string(), "gone".to_string()])
            .unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err.to_diagnostic().help.len() == 1);
    }

    #[test]
    fn test_dot_output() {
        let graph = DependencyGraph::build(vec![
            target("app", TargetKind::Executable, &["lib"]),
            lib("lib", &[]),
        ])
        .unwrap();
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("label = \"app\""));
        assert!(dot.contains("0 -> 1"));
    }
}
