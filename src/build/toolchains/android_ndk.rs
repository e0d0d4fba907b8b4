//! Android NDK discovery
//!
//! The NDK is located once per run, either from the `NDK` variable or by
//! searching every directory of the search path for `ndk-build`. The result
//! is a plain value; commands that need it get `NDK=<dir>` as an environment
//! override instead of the process environment being modified.

use std::path::{Path, PathBuf};

use crate::config::env::{BuildEnv, NDK_VAR};
use crate::error::{hints, BuildError};

/// Entry point of the native build tool
pub const NDK_BUILD: &str = "ndk-build";

/// Where the NDK location came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdkSource {
    /// Pre-set `NDK` variable
    Environment,
    /// Found by scanning the search path
    SearchPath,
}

/// A located NDK installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdkLocation {
    dir: PathBuf,
    source: NdkSource,
}

impl NdkLocation {
    /// Use `dir` as the NDK without any lookup
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            source: NdkSource::Environment,
        }
    }

    /// Locate the NDK from the captured environment
    pub fn discover(env: &BuildEnv) -> Result<Self, BuildError> {
        if let Some(dir) = &env.ndk_dir {
            return Ok(Self::at(dir.clone()));
        }

        let found = env.search_path.as_ref().and_then(|paths| {
            let cwd = std::env::current_dir().unwrap_or_default();
            which::which_in(NDK_BUILD, Some(paths), cwd).ok()
        });

        match found.as_deref().and_then(Path::parent) {
            Some(dir) => {
                tracing::debug!(dir = %dir.display(), "found ndk-build on search path");
                Ok(Self {
                    dir: dir.to_path_buf(),
                    source: NdkSource::SearchPath,
                })
            }
            None => Err(BuildError::MissingTool {
                tool: NDK_BUILD.to_string(),
                hint: hints::ndk_build().to_string(),
            }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> NdkSource {
        self.source
    }

    /// Environment overrides for commands run under this NDK
    pub fn env_overrides(&self) -> Vec<(String, String)> {
        vec![(NDK_VAR.to_string(), self.dir.display().to_string())]
    }
}
