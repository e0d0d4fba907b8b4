//! CLI argument parsing using clap derive macros

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    build::BuildCommand, plan::PlanCommand, platforms::PlatformsCommand, scan::ScanCommand,
};

/// buildmatrix - build-matrix orchestrator for the trace/retrace tree
///
/// Configures and builds every product for every platform and variant with
/// CMake and make, then runs the Android ndk-build pipeline.
#[derive(Parser, Debug)]
#[command(name = "buildmatrix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Root of the source tree
    #[arg(long, global = true, default_value = ".")]
    pub source: PathBuf,

    /// Matrix configuration file (default: <source>/buildmatrix.toml, else built-in)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root of per-job build directories (default: <source>/builds)
    #[arg(long, global = true)]
    pub build_dir: Option<PathBuf>,

    /// Root of per-job install directories (default: <source>/install)
    #[arg(long, global = true)]
    pub install_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the matrix and/or the Android products
    Build(BuildCommand),

    /// Show the jobs and commands a build would run
    Plan(PlanCommand),

    /// List the platform rule table
    Platforms(PlatformsCommand),

    /// Scan an existing build log for failure signatures
    Scan(ScanCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        if self.global.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        init_tracing(self.global.verbose);

        match self.command {
            Commands::Build(cmd) => cmd.execute(&self.global),
            Commands::Plan(cmd) => cmd.execute(&self.global),
            Commands::Platforms(cmd) => cmd.execute(&self.global),
            Commands::Scan(cmd) => cmd.execute(&self.global),
        }
    }
}

/// `RUST_LOG` wins; otherwise `warn`, or `debug` with `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "buildmatrix=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
