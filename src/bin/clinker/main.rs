//! Clinker CLI - an incremental build orchestrator for C and C++

use std::io::IsTerminal;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use clinker::builder::{ConfigurationError, ToolchainError};
use clinker::core::ManifestError;
use clinker::util::diagnostic::{emit, suggestions, Diagnostic};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && std::io::stderr().is_terminal();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("clinker=debug")
    } else {
        EnvFilter::new("clinker=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli, color) {
        emit(&diagnostic_for(&e), color);
        std::process::exit(1);
    }
}

fn run(cli: Cli, color: bool) -> Result<()> {
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, cli.verbose, color),
        Commands::Graph(args) => commands::graph::execute(args),
        Commands::Flags(args) => commands::flags::execute(args),
        Commands::Clean(args) => commands::clean::execute(args),
        Commands::Toolchain => commands::toolchain::execute(),
        Commands::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "clinker", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Turn an error into the diagnostic shown to the user.
fn diagnostic_for(err: &anyhow::Error) -> Diagnostic {
    if let Some(config) = err.downcast_ref::<ConfigurationError>() {
        return config.to_diagnostic();
    }

    if let Some(toolchain) = err.downcast_ref::<ToolchainError>() {
        return Diagnostic::error(toolchain.to_string()).with_help(suggestions::NO_COMPILER);
    }

    if let Some(failed) = err.downcast_ref::<commands::build::BuildFailed>() {
        return Diagnostic::error(failed.to_string()).with_help(suggestions::BUILD_FAILED);
    }

    let mut diagnostic = Diagnostic::error(err.to_string());
    if let Some(manifest) = err.downcast_ref::<ManifestError>() {
        for cause in err.chain().skip(1) {
            diagnostic = diagnostic.with_note(cause.to_string());
        }
        if matches!(manifest, ManifestError::Invalid { .. }) {
            diagnostic.notes.extend(manifest.messages());
        }
    } else if err.chain().len() > 1 {
        diagnostic = Diagnostic::error(format!("{:#}", err));
    }
    diagnostic
}
