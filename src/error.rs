//! Error types and helpers for user-friendly error messages
//!
//! Every hard failure of a run is one of these variants. The top level turns
//! them into a process exit code: toolchain failures mirror the exit code of
//! the failing command, everything else exits with 1.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code used when no external command provided one
pub const GENERIC_FAILURE: i32 = 1;

/// Failures that stop a run
#[derive(Error, Debug)]
pub enum BuildError {
    /// Platform identifier missing from the rule table
    #[error("Unknown platform '{platform}'")]
    UnknownPlatform { platform: String },

    /// Platform known, but not buildable through the requested path
    #[error("Platform '{platform}' cannot be built here: {reason}")]
    UnsupportedPlatform { platform: String, reason: String },

    /// Invalid matrix configuration or filter
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        hint: Option<String>,
    },

    /// Expected build output missing at collection time
    #[error("Unable to copy file: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// External command exited nonzero (or was killed)
    #[error("The following command failed with error code {}:\n{command}", display_code(*exit_code))]
    ToolchainFailure {
        command: String,
        exit_code: Option<i32>,
    },

    /// Required external tool could not be located
    #[error("{tool} not found.")]
    MissingTool { tool: String, hint: String },

    /// Filesystem failure on a path the orchestrator manages
    #[error("Failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_code(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

impl BuildError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            hint: None,
        }
    }

    /// Create a configuration error with a hint
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::ToolchainFailure {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => GENERIC_FAILURE,
        }
    }

    /// Display error with formatting and hints
    pub fn display_with_hints(&self) {
        use console::style;

        eprintln!("\n{} {}", style("ERROR:").red().bold(), self);

        match self {
            BuildError::Config {
                hint: Some(hint), ..
            } => {
                eprintln!("\n{} {}", style("HINT:").yellow().bold(), hint);
            }
            BuildError::MissingTool { hint, .. } => {
                eprintln!("\n{}", hint);
            }
            BuildError::UnknownPlatform { .. } => {
                eprintln!(
                    "\n{} {}",
                    style("HINT:").yellow().bold(),
                    hints::unknown_platform()
                );
            }
            BuildError::ToolchainFailure { .. } => {
                eprintln!(
                    "\n{} {}",
                    style("HINT:").yellow().bold(),
                    hints::toolchain_failure()
                );
            }
            _ => {}
        }

        eprintln!();
    }
}

/// Common error hints
pub mod hints {
    /// Get hint for a missing ndk-build
    pub fn ndk_build() -> &'static str {
        "Make sure it is in your path or that the NDK environment variable is\n\
         set and pointed to the directory where ndk-build resides."
    }

    /// Get hint for an unknown platform identifier
    pub fn unknown_platform() -> &'static str {
        "Run `buildmatrix platforms` to list the configured platforms, or add a\n\
         [[platform]] entry to buildmatrix.toml."
    }

    /// Get hint for a failed toolchain command
    pub fn toolchain_failure() -> &'static str {
        "Refer to the log files under the install directory for more details."
    }
}
