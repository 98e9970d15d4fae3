//! `clinker flags` command
//!
//! Shows the flags a target ends up with after propagation. Toolchain
//! defaults for the build type are not included.

use anyhow::Result;

use crate::cli::FlagsArgs;
use clinker::ops::{resolve_project, ResolveOptions};
use clinker::util::GlobalContext;

pub fn execute(args: FlagsArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let resolved = resolve_project(
        &ctx,
        &ResolveOptions {
            build_type: args.build_type,
        },
    )?;

    let (target, flags) = resolved.target_flags(&args.target)?;

    if !args.link {
        println!("# Compile flags for `{}`:", target.name);
        for dir in &flags.include_dirs {
            println!("  -I{}", dir.display());
        }
        for flag in &flags.compile {
            println!("  {}", flag);
        }
    }

    if !args.compile && !args.link {
        println!();
    }

    if !args.compile {
        println!("# Link flags for `{}`:", target.name);
        for flag in &flags.link {
            println!("  {}", flag);
        }
    }

    if target.kind.is_header_only() && !args.compile && !args.link {
        println!();
        println!("# Exported by `{}`:", target.name);
        for dir in &flags.exported_includes {
            println!("  -I{}", dir.display());
        }
        for flag in flags
            .exported_compile
            .public
            .iter()
            .chain(&flags.exported_compile.interface)
        {
            println!("  {}", flag);
        }
    }

    Ok(())
}
