//! Environment-variable inputs, captured once per run
//!
//! Nothing downstream reads the process environment directly: the captured
//! [`BuildEnv`] is threaded through the composer, the drivers and NDK
//! discovery, so tests can inject any combination of inputs.

use std::ffi::OsString;
use std::path::PathBuf;

/// Test-library path forwarded to generic-platform configures
pub const TEST_LIBRARY_VAR: &str = "TEST_LIBRARY";
/// Revision identifier stamped into version strings
pub const REVISION_VAR: &str = "SVN_REVISION";
/// Free-form version label (release, dev, ...)
pub const VERSION_TYPE_VAR: &str = "VERSION_TYPE";
/// Directory holding ndk-build
pub const NDK_VAR: &str = "NDK";
/// Executable search path
pub const PATH_VAR: &str = "PATH";

/// Revision used when none is supplied
pub const UNOFFICIAL_REVISION: &str = "unofficial";
/// Version type used when none is supplied
pub const DEFAULT_VERSION_TYPE: &str = "dev";

/// Environment inputs of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildEnv {
    pub test_library: String,
    pub revision: String,
    pub version_type: String,
    pub ndk_dir: Option<PathBuf>,
    pub search_path: Option<OsString>,
}

impl Default for BuildEnv {
    fn default() -> Self {
        Self {
            test_library: String::new(),
            revision: UNOFFICIAL_REVISION.to_string(),
            version_type: DEFAULT_VERSION_TYPE.to_string(),
            ndk_dir: None,
            search_path: None,
        }
    }
}

impl BuildEnv {
    /// Capture from the process environment
    pub fn from_process() -> Self {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Capture through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let text = |name: &str| lookup(name).map(|v| v.to_string_lossy().into_owned());
        let defaults = Self::default();

        Self {
            test_library: text(TEST_LIBRARY_VAR).unwrap_or(defaults.test_library),
            revision: text(REVISION_VAR).unwrap_or(defaults.revision),
            version_type: text(VERSION_TYPE_VAR).unwrap_or(defaults.version_type),
            // An empty NDK counts as unset
            ndk_dir: lookup(NDK_VAR).filter(|v| !v.is_empty()).map(PathBuf::from),
            search_path: lookup(PATH_VAR),
        }
    }
}
