//! Version discovery and version stamping
//!
//! The version triple is declared in the native product's `CMakeLists.txt`;
//! revision and version type come from the environment. Stamping renders
//! that information into live files produced from `.template`-suffixed
//! siblings:
//! - `res/values/strings.xml` gets the display string inside
//!   `<string name="version">…</string>`
//! - `AndroidManifest.xml` gets the numeric `android:versionCode`
//! - the cmake path runs a version script that regenerates the headers the
//!   native library compiles in
//!
//! Stamping is idempotent and a missing template is not an error.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::config::BuildEnv;
use crate::error::BuildError;
use crate::exec::ToolCommand;

pub const STRINGS_TEMPLATE: &str = "res/values/.strings.xml.template";
pub const STRINGS_FILE: &str = "res/values/strings.xml";
pub const MANIFEST_TEMPLATE: &str = ".AndroidManifest.xml.template";
pub const MANIFEST_FILE: &str = "AndroidManifest.xml";

/// Version of the product being built, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub revision: String,
    pub version_type: String,
}

impl VersionInfo {
    pub fn new(
        major: u32,
        minor: u32,
        patch: u32,
        revision: impl Into<String>,
        version_type: impl Into<String>,
    ) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: revision.into(),
            version_type: version_type.into(),
        }
    }

    /// Read `<prefix>_VERSION_{MAJOR,MINOR,PATCH}` from a CMakeLists.txt
    pub fn from_cmake_lists(path: &Path, prefix: &str, env: &BuildEnv) -> Result<Self, BuildError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| BuildError::io("read", path, e))?;
        let sets = parse_cmake_sets(&content);

        let component = |name: &str| -> Result<u32, BuildError> {
            let key = format!("{}_VERSION_{}", prefix, name);
            let value = sets.get(&key).ok_or_else(|| {
                BuildError::config(format!("{} is not declared in {}", key, path.display()))
            })?;
            value.parse().map_err(|_| {
                BuildError::config(format!(
                    "{} in {} is not a number: '{}'",
                    key,
                    path.display(),
                    value
                ))
            })
        };

        Ok(Self::new(
            component("MAJOR")?,
            component("MINOR")?,
            component("PATCH")?,
            env.revision.clone(),
            env.version_type.clone(),
        ))
    }

    /// `r{major}p{minor}[.{patch}] {revision} {type}`; the patch is omitted when 0
    pub fn version_string(&self) -> String {
        let minor_patch = if self.patch != 0 {
            format!("{}.{}", self.minor, self.patch)
        } else {
            self.minor.to_string()
        };
        format!(
            "r{}p{} {} {}",
            self.major, minor_patch, self.revision, self.version_type
        )
    }

    /// `major * 10000 + minor * 100 + patch`
    ///
    /// Minor and patch must stay below 100, or distinct versions would share
    /// a code.
    pub fn version_code(&self) -> Result<u32, BuildError> {
        if self.minor >= 100 || self.patch >= 100 {
            return Err(BuildError::config_with_hint(
                format!("version {} has no android version code", self),
                "Minor and patch versions must be below 100.",
            ));
        }
        self.major
            .checked_mul(10_000)
            .and_then(|code| code.checked_add(self.minor * 100 + self.patch))
            .ok_or_else(|| {
                BuildError::config(format!("major version {} overflows the version code", self.major))
            })
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Two-token `set(NAME VALUE)` declarations of a CMake file
pub fn parse_cmake_sets(content: &str) -> HashMap<String, String> {
    static SET_RE: OnceLock<Regex> = OnceLock::new();
    let re = SET_RE.get_or_init(|| {
        Regex::new(r#"(?im)^\s*set\s*\(\s*([A-Za-z0-9_]+)\s+("[^"]*"|[^\s()]+)\s*\)"#)
            .expect("valid set() pattern")
    });

    re.captures_iter(content)
        .map(|cap| (cap[1].to_string(), cap[2].trim_matches('"').to_string()))
        .collect()
}

/// Result of one stamping step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampOutcome {
    Stamped,
    /// Neither the template nor a live file exists
    NothingToStamp,
}

/// Stamp the display version into `res/values/strings.xml`
pub fn stamp_strings(target_dir: &Path, version: &VersionInfo) -> Result<StampOutcome, BuildError> {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    let re = VERSION_RE.get_or_init(|| {
        Regex::new(r#"(<string\s+name\s*=\s*"version"\s*>)[^<]*(</string>)"#)
            .expect("valid version element pattern")
    });

    let text = xml_escape(&version.version_string());
    render_from_template(
        &target_dir.join(STRINGS_TEMPLATE),
        &target_dir.join(STRINGS_FILE),
        |content| {
            re.replace_all(content, |caps: &Captures| {
                format!("{}{}{}", &caps[1], text, &caps[2])
            })
            .into_owned()
        },
    )
}

/// Stamp the numeric version code into `AndroidManifest.xml`
pub fn stamp_manifest(target_dir: &Path, version: &VersionInfo) -> Result<StampOutcome, BuildError> {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    let re = CODE_RE.get_or_init(|| {
        Regex::new(r#"(android:versionCode\s*=\s*")[0-9]*(")"#).expect("valid versionCode pattern")
    });

    let code = version.version_code()?;
    render_from_template(
        &target_dir.join(MANIFEST_TEMPLATE),
        &target_dir.join(MANIFEST_FILE),
        |content| {
            re.replace_all(content, |caps: &Captures| {
                format!("{}{}{}", &caps[1], code, &caps[2])
            })
            .into_owned()
        },
    )
}

/// Command running the per-target cmake version script
pub fn cmake_stamp_command(
    version: &VersionInfo,
    prefix: &str,
    source_root: &Path,
    cmake_script: &Path,
    test_library: &str,
) -> ToolCommand {
    ToolCommand::new("cmake")
        .define("SRC_ROOT", source_root.display())
        .define(&format!("{}_VERSION_MAJOR", prefix), version.major)
        .define(&format!("{}_VERSION_MINOR", prefix), version.minor)
        .define(&format!("{}_VERSION_PATCH", prefix), version.patch)
        .define(&format!("{}_REVISION", prefix), &version.revision)
        .define(&format!("{}_VERSION_TYPE", prefix), &version.version_type)
        .define("TEST_LIBRARY", test_library)
        .define("CMAKE_VERBOSE_MAKEFILE", "TRUE")
        .arg("-P")
        .arg(cmake_script.display().to_string())
}

/// Copy `template` over `output` (when present), then apply `edit` to `output`
fn render_from_template<F>(template: &Path, output: &Path, edit: F) -> Result<StampOutcome, BuildError>
where
    F: Fn(&str) -> String,
{
    if template.is_file() {
        std::fs::copy(template, output).map_err(|e| BuildError::io("copy template to", output, e))?;
    }
    if !output.is_file() {
        tracing::debug!(template = %template.display(), "no template, nothing to stamp");
        return Ok(StampOutcome::NothingToStamp);
    }

    let content = std::fs::read_to_string(output).map_err(|e| BuildError::io("read", output, e))?;
    let stamped = edit(&content);
    if stamped != content {
        std::fs::write(output, stamped).map_err(|e| BuildError::io("write", output, e))?;
    }
    Ok(StampOutcome::Stamped)
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
