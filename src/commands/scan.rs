//! Scan command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::RunContext;
use crate::build::diagnostics::report_findings;
use crate::cli::GlobalArgs;
use crate::utils::terminal;

/// Scan an existing build log for failure signatures
///
/// Findings are advisory: the command succeeds whether or not any are found.
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// Log file to scan
    pub log: PathBuf,
}

impl ScanCommand {
    /// Execute the scan command
    pub fn execute(self, global: &GlobalArgs) -> Result<()> {
        let ctx = RunContext::load(global)?;
        let scanner = ctx.config.scanner()?;

        let findings = scanner.scan(&self.log)?;
        if findings.is_empty() {
            terminal::print_success(&format!("No failure signatures in {}", self.log.display()));
        } else {
            report_findings(&self.log, &findings);
        }
        Ok(())
    }
}
