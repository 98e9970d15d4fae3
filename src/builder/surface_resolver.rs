//! Flag and include propagation.
//!
//! Each target's effective compile flags, link flags and include
//! directories are computed once, in topological order, from its declared
//! surface and the exported surfaces of its direct dependencies. How much a
//! target takes and forwards depends on its kind:
//!
//! | kind           | applies to itself                    | exports                                  |
//! |----------------|--------------------------------------|------------------------------------------|
//! | header only    | nothing                              | everything declared + everything received |
//! | static library | declared + deps' public              | declared public, interface + deps' interface |
//! | executable/shared | declared + deps' public + interface | declared public, interface only          |
//!
//! Every effective list keeps the first occurrence of a duplicate.

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::builder::graph::DependencyGraph;
use crate::core::surface::{ExportedFlags, ScopedFlags};
use crate::core::target::Propagation;

/// Resolved flags of one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveFlags {
    /// Compile flags applied to the target's own sources
    pub compile: Vec<String>,
    /// Link flags applied to the target's own link
    pub link: Vec<String>,
    /// Include directories for the target's own sources
    pub include_dirs: Vec<PathBuf>,
    pub exported_compile: ExportedFlags,
    pub exported_link: ExportedFlags,
    /// Include directories dependents receive
    pub exported_includes: Vec<PathBuf>,
}

/// Effective flags of every target in a graph.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSurfaces {
    flags: HashMap<NodeIndex, EffectiveFlags>,
}

impl ResolvedSurfaces {
    pub fn get(&self, ix: NodeIndex) -> Option<&EffectiveFlags> {
        self.flags.get(&ix)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Computes [`EffectiveFlags`] for a whole graph.
pub struct SurfaceResolver;

impl SurfaceResolver {
    /// Resolve every target of `graph`.
    pub fn resolve(graph: &DependencyGraph) -> ResolvedSurfaces {
        let mut resolved = ResolvedSurfaces::default();

        for &ix in graph.topological_order() {
            let deps: Vec<&EffectiveFlags> = graph
                .dependencies(ix)
                .into_iter()
                .filter_map(|dep| resolved.flags.get(&dep))
                .collect();
            let flags = Self::resolve_target(graph, ix, &deps);
            tracing::trace!("{}: {:?}", graph.target(ix).name, flags);
            resolved.flags.insert(ix, flags);
        }

        resolved
    }

    fn resolve_target(
        graph: &DependencyGraph,
        ix: NodeIndex,
        deps: &[&EffectiveFlags],
    ) -> EffectiveFlags {
        let target = graph.target(ix);
        let surface = &target.surface;
        let propagation = target.rules().propagation;

        let (compile, exported_compile) =
            propagate(propagation, &surface.compile, deps.iter().map(|d| &d.exported_compile));
        let (link, exported_link) =
            propagate(propagation, &surface.link, deps.iter().map(|d| &d.exported_link));

        let mut include_dirs = Vec::new();
        extend_unique(&mut include_dirs, &surface.include.private);
        extend_unique(&mut include_dirs, &surface.include.public);
        for dep in deps {
            extend_unique(&mut include_dirs, &dep.exported_includes);
        }

        let exported_includes = match propagation {
            Propagation::PassThrough => include_dirs.clone(),
            _ => dedup(&surface.include.public),
        };

        // Header-only targets are never compiled
        let include_dirs = match propagation {
            Propagation::PassThrough => Vec::new(),
            _ => include_dirs,
        };

        EffectiveFlags {
            compile,
            link,
            include_dirs,
            exported_compile,
            exported_link,
            exported_includes,
        }
    }
}

/// Apply one propagation rule to one phase (compile or link).
///
/// Returns the flags the target uses and the flags it exports.
fn propagate<'a>(
    propagation: Propagation,
    declared: &ScopedFlags,
    deps: impl Iterator<Item = &'a ExportedFlags>,
) -> (Vec<String>, ExportedFlags) {
    let deps: Vec<&ExportedFlags> = deps.collect();
    let mut own = Vec::new();
    let mut exported = ExportedFlags::default();

    match propagation {
        Propagation::PassThrough => {
            extend_unique(&mut exported.public, &declared.public);
            extend_unique(&mut exported.public, &declared.private);
            extend_unique(&mut exported.interface, &declared.interface);
            for dep in &deps {
                extend_unique(&mut exported.public, &dep.public);
                extend_unique(&mut exported.interface, &dep.interface);
            }
        }
        Propagation::ConsumePublic => {
            extend_unique(&mut own, &declared.private);
            extend_unique(&mut own, &declared.public);
            extend_unique(&mut exported.public, &declared.public);
            extend_unique(&mut exported.interface, &declared.interface);
            for dep in &deps {
                extend_unique(&mut own, &dep.public);
                extend_unique(&mut exported.interface, &dep.interface);
            }
        }
        Propagation::Terminal => {
            extend_unique(&mut own, &declared.private);
            extend_unique(&mut own, &declared.public);
            for dep in &deps {
                extend_unique(&mut own, &dep.public);
                extend_unique(&mut own, &dep.interface);
            }
            extend_unique(&mut exported.public, &declared.public);
            extend_unique(&mut exported.interface, &declared.interface);
        }
    }

    (own, exported)
}

fn extend_unique<T: Clone + PartialEq>(out: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
}

fn dedup<T: Clone + PartialEq>(items: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    extend_unique(&mut out, items);
    out
}
