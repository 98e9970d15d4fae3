//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use clinker::builder::MessageFormat;
use clinker::core::BuildType;

/// Clinker - an incremental build orchestrator for C and C++ targets
#[derive(Parser)]
#[command(name = "clinker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build targets and their dependencies
    Build(BuildArgs),

    /// Show the build order or the dependency graph
    Graph(GraphArgs),

    /// Show effective compile/link flags for a target
    Flags(FlagsArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Show the detected toolchain
    Toolchain,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Specific targets to build (defaults to the root project's targets)
    #[arg(short, long)]
    pub target: Vec<String>,

    /// Build every target, subprojects included
    #[arg(long, conflicts_with = "target")]
    pub all: bool,

    /// Number of parallel jobs
    #[arg(short, long, env = "CLINKER_JOBS")]
    pub jobs: Option<usize>,

    /// Build type (default, release, relwithdebinfo, debug, coverage)
    #[arg(short, long)]
    pub build_type: Option<BuildType>,

    /// Shorthand for `--build-type release`
    #[arg(short, long, conflicts_with = "build_type")]
    pub release: bool,

    /// Recompile and relink everything
    #[arg(long)]
    pub force: bool,

    /// Print the build plan as JSON instead of building
    #[arg(long)]
    pub plan: bool,

    /// Emit compile_commands.json into the build directory
    #[arg(long)]
    pub emit_compile_commands: bool,

    /// How progress is reported
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    pub message_format: FormatArg,
}

impl BuildArgs {
    pub fn build_type(&self) -> Option<BuildType> {
        if self.release {
            Some(BuildType::Release)
        } else {
            self.build_type
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Human,
    Json,
}

impl From<FormatArg> for MessageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Human => MessageFormat::Human,
            FormatArg::Json => MessageFormat::Json,
        }
    }
}

#[derive(Args)]
pub struct GraphArgs {
    /// Output Graphviz dot instead of the build order
    #[arg(long)]
    pub dot: bool,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Target name (`target` or `subproject.target`)
    pub target: String,

    /// Build type whose flag variants are shown
    #[arg(short, long)]
    pub build_type: Option<BuildType>,

    /// Show compile flags only
    #[arg(long, conflicts_with = "link")]
    pub compile: bool,

    /// Show link flags only
    #[arg(long)]
    pub link: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Only remove the output of this build type
    #[arg(short, long)]
    pub build_type: Option<BuildType>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
