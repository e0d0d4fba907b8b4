//! Platforms command implementation

use anyhow::Result;
use clap::Args;
use console::style;

use super::RunContext;
use crate::build::toolchains::PlatformFamily;
use crate::cli::GlobalArgs;

/// List the platform rule table
#[derive(Args, Debug)]
pub struct PlatformsCommand {}

impl PlatformsCommand {
    /// Execute the platforms command
    pub fn execute(self, global: &GlobalArgs) -> Result<()> {
        let ctx = RunContext::load(global)?;
        let table = ctx.config.platform_table();
        if table.is_empty() {
            println!("No platforms configured");
            return Ok(());
        }

        println!(
            "{}",
            style(format!(
                "{:<24} {:<9} {:<6} {:<7} {}",
                "PLATFORM", "FAMILY", "32-BIT", "STATIC", "TOOLCHAIN"
            ))
            .bold()
        );
        for rule in table.iter() {
            let family = match rule.family {
                PlatformFamily::Generic => "generic",
                PlatformFamily::Legacy => "legacy",
                PlatformFamily::Windows => "windows",
                PlatformFamily::Android => "android",
            };
            let toolchain = match rule.family {
                PlatformFamily::Generic => rule.toolchain_file(),
                PlatformFamily::Legacy | PlatformFamily::Windows => "-".to_string(),
                PlatformFamily::Android => "ndk-build".to_string(),
            };
            println!(
                "{:<24} {:<9} {:<6} {:<7} {}",
                rule.name,
                family,
                yes_no(rule.is_32bit()),
                yes_no(rule.static_runtime),
                toolchain
            );
        }
        println!("\n{} platform(s)", table.len());
        Ok(())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
