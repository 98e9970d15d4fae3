//! `clinker clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use clinker::ops::{clean, CleanOptions};
use clinker::util::GlobalContext;

pub fn execute(args: CleanArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let removed = clean(
        &ctx,
        &CleanOptions {
            build_type: args.build_type,
        },
    )?;

    if removed.is_empty() {
        eprintln!("     Nothing to clean");
    }
    for dir in &removed {
        eprintln!("     Removed {}", dir.display());
    }

    Ok(())
}
