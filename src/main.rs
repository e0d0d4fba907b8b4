//! buildmatrix - build-matrix orchestrator for a multi-platform C/C++ tree
//!
//! Builds every product for every platform and variant through CMake and
//! make, then runs the Android products through ndk-build with version
//! stamping and artifact collection.
//!
//! ## Architecture
//!
//! ```text
//! CLI → config (matrix + environment) → build drivers → external tools
//! ```

mod build;
mod cli;
mod commands;
mod config;
mod error;
mod exec;
mod utils;
mod version;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;
use error::{BuildError, GENERIC_FAILURE};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = match err.chain().find_map(|e| e.downcast_ref::<BuildError>()) {
                Some(build_error) => {
                    for context in err.chain().take_while(|e| !e.is::<BuildError>()) {
                        eprintln!("{}", context);
                    }
                    build_error.display_with_hints();
                    build_error.exit_code()
                }
                None => {
                    utils::terminal::print_error(&format!("{:#}", err));
                    GENERIC_FAILURE
                }
            };
            // exit codes outside 1..=255 still report failure
            ExitCode::from(u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1))
        }
    }
}
