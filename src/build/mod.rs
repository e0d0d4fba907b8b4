//! Build orchestration
//!
//! ## Architecture
//!
//! ```text
//! MatrixDriver ──► toolchains::compose ──► CommandRunner ──► diagnostics::LogScanner
//! AndroidPipeline ──► version stamping ──► CommandRunner ──► artifact collection
//! ```
//!
//! ## Modules
//!
//! - `toolchains` - platform rule table and configure/build command composition
//! - `matrix` - product × platform × variant driver
//! - `android` - the Android sub-pipeline and NDK discovery
//! - `diagnostics` - failure-signature scanning of finished logs

pub mod android;
pub mod diagnostics;
pub mod matrix;
pub mod toolchains;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::paths::job_path;

/// Build configuration flavor
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Release,
    Debug,
}

impl Variant {
    /// Value passed as `CMAKE_BUILD_TYPE`
    pub fn cmake_build_type(&self) -> &'static str {
        match self {
            Variant::Release => "Release",
            Variant::Debug => "Debug",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Release => write!(f, "release"),
            Variant::Debug => write!(f, "debug"),
        }
    }
}

/// A buildable unit of the source tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
    pub name: String,
    /// Root of the product's build description (holds CMakeLists.txt)
    pub path: PathBuf,
    /// Platforms this product builds for, in build order
    pub platforms: Vec<String>,
    /// Extra `NAME=VALUE` configure options, in order
    #[serde(default)]
    pub defines: Vec<String>,
}

/// Root directories every job path is derived from
#[derive(Debug, Clone)]
pub struct Layout {
    pub build_root: PathBuf,
    pub install_root: PathBuf,
}

impl Layout {
    pub fn new(build_root: impl Into<PathBuf>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            build_root: build_root.into(),
            install_root: install_root.into(),
        }
    }

    /// `<source>/builds` and `<source>/install`
    pub fn under(source_root: &Path) -> Self {
        Self::new(source_root.join("builds"), source_root.join("install"))
    }

    /// `install/<product>/android/release`
    pub fn android_install_dir(&self, product: &str) -> PathBuf {
        job_path(&self.install_root, &[product, "android", "release"])
    }
}

/// One (product, platform, variant) unit of the matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildJob {
    pub product: String,
    pub platform: String,
    pub variant: Variant,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
    pub log_file: PathBuf,
}

impl BuildJob {
    pub fn new(layout: &Layout, product: &str, platform: &str, variant: Variant) -> Self {
        let variant_name = variant.to_string();
        let segments = [product, platform, variant_name.as_str()];
        let install_dir = job_path(&layout.install_root, &segments);
        let log_file = install_dir.join("log.txt");

        Self {
            product: product.to_string(),
            platform: platform.to_string(),
            variant,
            build_dir: job_path(&layout.build_root, &segments),
            install_dir,
            log_file,
        }
    }

    /// Short `product/platform/variant` label
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.product, self.platform, self.variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths() {
        let layout = Layout::new("/src/builds", "/src/install");
        let job = BuildJob::new(&layout, "patrace", "x11_x64", Variant::Debug);

        assert_eq!(job.build_dir, PathBuf::from("/src/builds/patrace/x11_x64/debug"));
        assert_eq!(job.install_dir, PathBuf::from("/src/install/patrace/x11_x64/debug"));
        assert_eq!(
            job.log_file,
            PathBuf::from("/src/install/patrace/x11_x64/debug/log.txt")
        );
        assert_eq!(job.label(), "patrace/x11_x64/debug");
    }

    #[test]
    fn test_android_install_dir() {
        let layout = Layout::new("/b", "/i");
        assert_eq!(
            layout.android_install_dir("patrace"),
            PathBuf::from("/i/patrace/android/release")
        );
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(Variant::Release.to_string(), "release");
        assert_eq!(Variant::Debug.cmake_build_type(), "Debug");
    }
}
