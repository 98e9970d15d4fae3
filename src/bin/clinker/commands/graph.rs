//! `clinker graph` command

use anyhow::Result;

use crate::cli::GraphArgs;
use clinker::ops::{resolve_project, ResolveOptions};
use clinker::util::GlobalContext;

pub fn execute(args: GraphArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let resolved = resolve_project(&ctx, &ResolveOptions::default())?;
    let graph = &resolved.graph;

    if args.dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    println!("# Build order for `{}`:", resolved.project.name);
    for (pos, &ix) in graph.topological_order().iter().enumerate() {
        let target = graph.target(ix);
        let deps: Vec<&str> = graph
            .dependencies(ix)
            .into_iter()
            .map(|dep| graph.target(dep).name.as_str())
            .collect();

        if deps.is_empty() {
            println!("{:>4}. {} ({})", pos + 1, target.name, target.kind.as_str());
        } else {
            println!(
                "{:>4}. {} ({}) <- {}",
                pos + 1,
                target.name,
                target.kind.as_str(),
                deps.join(", ")
            );
        }
    }

    Ok(())
}
