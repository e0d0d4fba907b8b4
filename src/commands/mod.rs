//! Command implementations
//!
//! Each command module provides a clap-derived struct and execute method.

pub mod build;
pub mod plan;
pub mod platforms;
pub mod scan;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::build::Layout;
use crate::cli::GlobalArgs;
use crate::config::{BuildEnv, MatrixConfig};
use crate::utils::paths::absolutize;

/// Everything a command needs to know about the tree it works on
pub struct RunContext {
    pub source_root: PathBuf,
    pub config: MatrixConfig,
    pub layout: Layout,
    pub env: BuildEnv,
}

impl RunContext {
    /// Resolve the source root, configuration, directory layout and environment
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let source_root = absolutize(&global.source);
        if !source_root.is_dir() {
            anyhow::bail!("Source root {} is not a directory", source_root.display());
        }

        let config = MatrixConfig::resolve(global.config.as_deref(), &source_root)
            .context("Failed to load the build matrix")?;

        let defaults = Layout::under(&source_root);
        let layout = Layout::new(
            global
                .build_dir
                .as_deref()
                .map(absolutize)
                .unwrap_or(defaults.build_root),
            global
                .install_dir
                .as_deref()
                .map(absolutize)
                .unwrap_or(defaults.install_root),
        );

        let env = BuildEnv::from_process();
        tracing::debug!(
            source = %source_root.display(),
            revision = %env.revision,
            version_type = %env.version_type,
            "run context loaded"
        );

        Ok(Self {
            source_root,
            config,
            layout,
            env,
        })
    }
}
