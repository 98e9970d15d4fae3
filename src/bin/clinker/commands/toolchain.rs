//! `clinker toolchain` command

use anyhow::Result;

use clinker::builder::{detect_toolchain, Toolchain};
use clinker::util::config::{global_config_path, load_config, Config};
use clinker::util::GlobalContext;

pub fn execute() -> Result<()> {
    let ctx = GlobalContext::new()?;

    // Outside a project only the global configuration applies
    let config = match ctx.find_project_root() {
        Ok(root) => ctx.load_config(&root),
        Err(_) => match global_config_path() {
            Some(path) => load_config(None, &path),
            None => Config::default(),
        },
    };

    let toolchain = detect_toolchain(&config.toolchain)?;

    println!("Toolchain:");
    println!();
    println!("  Family: {}", toolchain.platform());
    println!("  CC:     {}", toolchain.cc.display());
    println!("  CXX:    {}", toolchain.cxx.display());
    println!("  AR:     {}", toolchain.ar.display());
    match toolchain.cxx_standard() {
        Some(std) => println!("  C++:    {}", std.as_flag()),
        None => println!("  C++:    compiler default"),
    }
    println!("  OS:     {}", toolchain.os());

    let overrides: Vec<(&str, String)> = ["CC", "CXX", "AR"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key, value)))
        .collect();
    if !overrides.is_empty() {
        println!();
        println!("Environment:");
        for (key, value) in overrides {
            println!("  {}={}", key, value);
        }
    }

    Ok(())
}
