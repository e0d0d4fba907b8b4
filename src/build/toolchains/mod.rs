//! Platform rules and toolchain command composition
//!
//! Each platform identifier maps to a [`PlatformRule`]. [`compose`] turns a
//! (platform, variant, paths, defines) request into the configure and build
//! commands for that platform. The rule table is configuration data; an
//! identifier missing from it is an error, never a silent default.

pub mod android_ndk;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::build::Variant;
use crate::error::BuildError;
use crate::exec::ToolCommand;

/// Which configure/build recipe a platform uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// Linux/embedded targets described by a per-platform toolchain file
    #[default]
    Generic,
    /// Older enterprise distros: restricted build, no tools, explicit ARCH
    Legacy,
    /// Desktop Windows, built through a Visual Studio solution
    Windows,
    /// Built by the Android pipeline, not by the matrix
    Android,
}

impl std::fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformFamily::Generic => write!(f, "generic"),
            PlatformFamily::Legacy => write!(f, "legacy"),
            PlatformFamily::Windows => write!(f, "windows"),
            PlatformFamily::Android => write!(f, "android"),
        }
    }
}

/// Solution built on Windows when the rule does not name one
pub const DEFAULT_SOLUTION: &str = "patrace.sln";
/// Project built inside the solution when the rule does not name one
pub const DEFAULT_SOLUTION_PROJECT: &str = "eglretrace";

/// Static linker flags for targets without a matching C++ runtime
const STATIC_RUNTIME_FLAGS: &str = "-static-libgcc -static-libstdc++";

/// Fixed rule set for one platform identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformRule {
    pub name: String,
    #[serde(default)]
    pub family: PlatformFamily,
    /// Link libgcc/libstdc++ statically
    #[serde(default)]
    pub static_runtime: bool,
    /// Toolchain file override (generic family only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain_file: Option<String>,
    /// Solution file name (windows family only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Project inside the solution (windows family only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl PlatformRule {
    #[cfg(test)]
    /// Generic rule for `name`
    pub fn generic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: PlatformFamily::Generic,
            static_runtime: false,
            toolchain_file: None,
            solution: None,
            project: None,
        }
    }

    #[cfg(test)]
    pub fn with_family(mut self, family: PlatformFamily) -> Self {
        self.family = family;
        self
    }

    #[cfg(test)]
    pub fn with_static_runtime(mut self, static_runtime: bool) -> Self {
        self.static_runtime = static_runtime;
        self
    }

    /// 32-bit targets carry `x32` in their identifier
    pub fn is_32bit(&self) -> bool {
        self.name.contains("x32")
    }

    /// `toolchains/<platform>.cmake` unless overridden
    pub fn toolchain_file(&self) -> String {
        self.toolchain_file
            .clone()
            .unwrap_or_else(|| format!("toolchains/{}.cmake", self.name))
    }

    /// Architecture component: everything after the last underscore
    pub fn arch(&self) -> &str {
        self.name.rsplit('_').next().unwrap_or(&self.name)
    }

    fn solution(&self) -> &str {
        self.solution.as_deref().unwrap_or(DEFAULT_SOLUTION)
    }

    fn solution_project(&self) -> &str {
        self.project.as_deref().unwrap_or(DEFAULT_SOLUTION_PROJECT)
    }
}

/// Lookup table from platform identifier to its rule
#[derive(Debug, Clone, Default)]
pub struct PlatformTable {
    rules: Vec<PlatformRule>,
}

impl PlatformTable {
    pub fn new(rules: Vec<PlatformRule>) -> Self {
        Self { rules }
    }

    /// Rule for `platform`, or [`BuildError::UnknownPlatform`]
    pub fn get(&self, platform: &str) -> Result<&PlatformRule, BuildError> {
        self.rules
            .iter()
            .find(|r| r.name == platform)
            .ok_or_else(|| BuildError::UnknownPlatform {
                platform: platform.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Inputs for one configure/build pair
#[derive(Debug, Clone)]
pub struct ComposeRequest<'a> {
    pub platform: &'a str,
    pub variant: Variant,
    pub project_path: &'a Path,
    pub build_dir: &'a Path,
    pub install_dir: &'a Path,
    /// Extra `NAME=VALUE` options, appended in order
    pub defines: &'a [String],
    /// Forwarded as `TEST_LIBRARY` on generic platforms
    pub test_library: &'a str,
    pub make_target: &'a str,
    pub jobs: u32,
}

/// Configure and build commands for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedBuild {
    pub configure: ToolCommand,
    pub build: ToolCommand,
}

/// Compose the configure and build commands for `request`
///
/// Pure: the result depends only on the table and the request.
pub fn compose(table: &PlatformTable, request: &ComposeRequest<'_>) -> Result<ComposedBuild, BuildError> {
    let rule = table.get(request.platform)?;

    let project = request.project_path.display();
    let build_dir = request.build_dir.display();
    let install_dir = request.install_dir.display();

    let mut configure = ToolCommand::new("cmake").arg(format!("-H{}", project));
    configure = match rule.family {
        PlatformFamily::Windows => configure
            .define("CMAKE_INSTALL_PREFIX:PATH", &install_dir)
            .arg(format!("-B{}", build_dir))
            .define("ENABLE_TOOLS", "TRUE")
            .define("CMAKE_SYSTEM_NAME", "Windows")
            .define("WINDOWSYSTEM", "win"),
        PlatformFamily::Legacy => configure
            .define("CMAKE_INSTALL_PREFIX:PATH", &install_dir)
            .define("CMAKE_BUILD_TYPE", request.variant.cmake_build_type())
            .define("WINDOWSYSTEM", "fbdev")
            .define("ENABLE_TOOLS", "FALSE")
            .define("ENABLE_PYTHON_TOOLS", "FALSE")
            .define("ARCH", rule.arch())
            .define("CMAKE_VERBOSE_MAKEFILE", "TRUE")
            .arg(format!("-B{}", build_dir)),
        PlatformFamily::Generic => configure
            .define("CMAKE_TOOLCHAIN_FILE", rule.toolchain_file())
            .define("CMAKE_INSTALL_PREFIX:PATH", &install_dir)
            .define("CMAKE_BUILD_TYPE", request.variant.cmake_build_type())
            .define("TEST_LIBRARY", request.test_library)
            .arg(format!("-B{}", build_dir)),
        PlatformFamily::Android => {
            return Err(BuildError::UnsupportedPlatform {
                platform: rule.name.clone(),
                reason: "android targets are built by the android pipeline".to_string(),
            })
        }
    };

    for define in request.defines {
        configure = configure.define_raw(define);
    }

    if rule.family != PlatformFamily::Windows {
        if rule.is_32bit() {
            configure = configure
                .define("CMAKE_C_FLAGS", "-m32")
                .define("CMAKE_CXX_FLAGS", "-m32");
        }
        if rule.static_runtime {
            configure = configure.define("CMAKE_EXE_LINKER_FLAGS", STATIC_RUNTIME_FLAGS);
        }
    }

    let build = match rule.family {
        PlatformFamily::Windows => ToolCommand::new("devenv.com")
            .arg(format!("{}\\{}", build_dir, rule.solution()))
            .args(["/Build", request.variant.cmake_build_type()])
            .args(["/Project", rule.solution_project()]),
        _ => ToolCommand::new("make")
            .arg(request.make_target)
            .arg(format!("-j{}", request.jobs))
            .arg("-C")
            .arg(build_dir.to_string()),
    };

    Ok(ComposedBuild { configure, build })
}
