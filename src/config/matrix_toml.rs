//! buildmatrix.toml configuration parsing
//!
//! The product registry, platform rule table, variants and Android targets
//! are configuration data. A default document describing the trace/retrace
//! tree is embedded in the binary; a `buildmatrix.toml` with the same schema
//! replaces it.
//!
//! ```toml
//! variants = ["release", "debug"]
//!
//! [[product]]
//! name = "patrace"
//! path = "patrace/project/cmake"
//! platforms = ["x11_x64", "rhe6_x32"]
//!
//! [[platform]]
//! name = "rhe6_x32"
//! family = "legacy"
//! static_runtime = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::validation::validate_config;
use crate::build::android::AndroidProduct;
use crate::build::diagnostics::{LogScanner, DEFAULT_SIGNATURES};
use crate::build::toolchains::{PlatformRule, PlatformTable};
use crate::build::{Product, Variant};
use crate::error::BuildError;

/// Name of the optional configuration file under the source root
pub const CONFIG_FILE_NAME: &str = "buildmatrix.toml";

/// Embedded default matrix
pub const DEFAULT_MATRIX: &str = include_str!("default_matrix.toml");

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// Variants every product is built in, in build order
    #[serde(default = "default_variants")]
    pub variants: Vec<Variant>,

    /// Settings shared by all make invocations
    #[serde(default)]
    pub build: BuildSettings,

    /// Log scanning signatures
    #[serde(default)]
    pub scanner: ScannerSettings,

    /// Desktop/embedded products, in build order
    #[serde(default, rename = "product")]
    pub products: Vec<Product>,

    /// Platform rule table
    #[serde(default, rename = "platform")]
    pub platforms: Vec<PlatformRule>,

    /// Android sub-pipeline
    pub android: Option<AndroidSettings>,
}

/// `[build]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    #[serde(default = "default_make_target")]
    pub make_target: String,
    #[serde(default = "default_jobs")]
    pub jobs: u32,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            make_target: default_make_target(),
            jobs: default_jobs(),
        }
    }
}

/// `[scanner]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerSettings {
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }
}

/// `[android]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AndroidSettings {
    /// Platform API level used for project metadata refresh
    #[serde(default = "default_api_target")]
    pub api_target: String,
    /// Prefix of the version variables (`<PREFIX>_VERSION_MAJOR`, ...)
    #[serde(default = "default_version_prefix")]
    pub version_prefix: String,
    #[serde(default = "default_jobs")]
    pub jobs: u32,
    #[serde(default, rename = "product")]
    pub products: Vec<AndroidProduct>,
}

fn default_variants() -> Vec<Variant> {
    vec![Variant::Release, Variant::Debug]
}

fn default_make_target() -> String {
    "install".to_string()
}

fn default_jobs() -> u32 {
    8
}

fn default_patterns() -> Vec<String> {
    DEFAULT_SIGNATURES.iter().map(|s| s.to_string()).collect()
}

fn default_api_target() -> String {
    "android-23".to_string()
}

fn default_version_prefix() -> String {
    "PATRACE".to_string()
}

impl MatrixConfig {
    /// The embedded default matrix
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_MATRIX).context("Built-in matrix is invalid")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        Self::parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse matrix configuration")?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Pick the configuration for a run and anchor its paths at `source_root`
    ///
    /// An explicit file wins, then `buildmatrix.toml` under the source root,
    /// then the built-in matrix.
    pub fn resolve(explicit: Option<&Path>, source_root: &Path) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let local = source_root.join(CONFIG_FILE_NAME);
                if local.is_file() {
                    tracing::debug!(path = %local.display(), "using local matrix configuration");
                    Self::load_from_path(&local)?
                } else {
                    Self::builtin()?
                }
            }
        };
        Ok(config.rebase(source_root))
    }

    /// Make every relative path absolute against `root`
    pub fn rebase(mut self, root: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };

        for product in &mut self.products {
            anchor(&mut product.path);
        }
        if let Some(android) = &mut self.android {
            for product in &mut android.products {
                anchor(&mut product.android_root);
                anchor(&mut product.source_root);
                anchor(&mut product.cmake_root);
            }
        }
        self
    }

    pub fn platform_table(&self) -> PlatformTable {
        PlatformTable::new(self.platforms.clone())
    }

    pub fn scanner(&self) -> Result<LogScanner, BuildError> {
        LogScanner::new(&self.scanner.patterns)
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name == name)
    }
}
