//! Plan command implementation
//!
//! Expands the matrix and composes every job's commands without spawning
//! anything.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;

use super::RunContext;
use crate::build::matrix::{MatrixDriver, MatrixFilter, PlannedJob};
use crate::build::Variant;
use crate::cli::GlobalArgs;

/// Show the jobs and commands a build would run
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Only plan these products (comma-separated)
    #[arg(long, short = 'p', value_delimiter = ',')]
    pub product: Vec<String>,

    /// Only plan these platforms (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub platform: Vec<String>,

    /// Only plan these variants (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub variant: Vec<Variant>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// One planned job as printed by `plan --json`
#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub product: String,
    pub platform: String,
    pub variant: Variant,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub log_file: PathBuf,
    pub configure: String,
    pub build: String,
}

impl From<PlannedJob> for PlanEntry {
    fn from(planned: PlannedJob) -> Self {
        let PlannedJob { job, commands } = planned;
        Self {
            product: job.product,
            platform: job.platform,
            variant: job.variant,
            build_dir: job.build_dir,
            install_dir: job.install_dir,
            log_file: job.log_file,
            configure: commands.configure.to_string(),
            build: commands.build.to_string(),
        }
    }
}

impl PlanCommand {
    /// Execute the plan command
    pub fn execute(self, global: &GlobalArgs) -> Result<()> {
        let ctx = RunContext::load(global)?;
        let filter = MatrixFilter {
            products: self.product,
            platforms: self.platform,
            variants: self.variant,
        };
        let (products, variants) = filter.apply(&ctx.config)?;

        let scanner = ctx.config.scanner()?;
        let driver = MatrixDriver::new(
            ctx.config.platform_table(),
            &ctx.config.build,
            &ctx.env,
            &ctx.layout,
            &scanner,
        );
        let entries: Vec<PlanEntry> = driver
            .plan(&products, &variants)?
            .into_iter()
            .map(PlanEntry::from)
            .collect();

        if self.json {
            let json = serde_json::to_string_pretty(&entries).context("Failed to serialize plan")?;
            println!("{}", json);
            return Ok(());
        }

        for (idx, entry) in entries.iter().enumerate() {
            println!(
                "{} {}/{}/{}",
                style(format!("[{}]", idx + 1)).dim(),
                style(&entry.product).bold(),
                entry.platform,
                entry.variant
            );
            println!("    build dir  : {}", entry.build_dir.display());
            println!("    install dir: {}", entry.install_dir.display());
            println!("    configure  : {}", entry.configure);
            println!("    build      : {}", entry.build);
        }
        println!("\n{} job(s)", entries.len());
        Ok(())
    }
}
