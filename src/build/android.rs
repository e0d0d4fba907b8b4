//! Android sub-pipeline
//!
//! Strictly sequential, stops at the first hard failure.
//!
//! 1. per product: discover the version from its CMakeLists.txt and apply
//!    every target's version stampers
//! 2. once: refresh project metadata of every directory holding a manifest
//! 3. per product: run the native build of every target and copy every
//!    expected binary into `install/<product>/android/release/<target>/`
//!
//! All stamping precedes the metadata refresh because the refresh reads the
//! stamped manifests of the whole tree. The NDK precondition is resolved before the pipeline is
//! constructed (see [`NdkLocation`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::build::diagnostics::{report_findings, Finding, LogScanner};
use crate::build::toolchains::android_ndk::{NdkLocation, NdkSource};
use crate::build::Layout;
use crate::config::{AndroidSettings, BuildEnv};
use crate::error::BuildError;
use crate::exec::{CommandRunner, LogSink, ToolCommand};
use crate::utils::paths::ensure_dir;
use crate::utils::terminal;
use crate::version::{self, StampOutcome, VersionInfo, MANIFEST_FILE};

/// Version stamping step applied to a target before the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stamper {
    /// Run the target's cmake version script
    Cmake,
    /// Stamp strings.xml and AndroidManifest.xml from their templates
    Manifest,
}

/// One Android build target of a product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AndroidTarget {
    pub name: String,
    /// Artifacts expected after the build, relative to the target directory
    pub binaries: Vec<String>,
    #[serde(default)]
    pub stampers: Vec<Stamper>,
}

/// A product built by the Android pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AndroidProduct {
    pub name: String,
    /// Holds one directory per target
    pub android_root: PathBuf,
    /// Native sources, passed to the cmake version scripts
    pub source_root: PathBuf,
    /// Holds CMakeLists.txt and `<target>/config.cmake`
    pub cmake_root: PathBuf,
    #[serde(default, rename = "target")]
    pub targets: Vec<AndroidTarget>,
}

impl AndroidProduct {
    pub fn target_dir(&self, target: &AndroidTarget) -> PathBuf {
        self.android_root.join(&target.name)
    }

    pub fn cmake_lists(&self) -> PathBuf {
        self.cmake_root.join("CMakeLists.txt")
    }

    pub fn version_script(&self, target: &AndroidTarget) -> PathBuf {
        self.cmake_root.join(&target.name).join("config.cmake")
    }
}

/// Outcome of one product's pipeline run
#[derive(Debug, Clone)]
pub struct AndroidProductReport {
    pub name: String,
    pub version: VersionInfo,
    pub log_file: PathBuf,
    pub artifacts: Vec<PathBuf>,
    pub findings: Vec<Finding>,
}

/// A product whose targets are stamped and whose log is open
struct StagedProduct<'a> {
    product: &'a AndroidProduct,
    install_dir: PathBuf,
    log_file: PathBuf,
    sink: LogSink,
    version: VersionInfo,
}

/// Drives the Android products of a configuration
pub struct AndroidPipeline<'a> {
    settings: &'a AndroidSettings,
    env: &'a BuildEnv,
    layout: &'a Layout,
    scanner: &'a LogScanner,
    source_root: PathBuf,
    ndk: NdkLocation,
}

impl<'a> AndroidPipeline<'a> {
    /// Build a pipeline around an already located NDK
    pub fn new(
        settings: &'a AndroidSettings,
        env: &'a BuildEnv,
        layout: &'a Layout,
        scanner: &'a LogScanner,
        source_root: impl Into<PathBuf>,
        ndk: NdkLocation,
    ) -> Self {
        Self {
            settings,
            env,
            layout,
            scanner,
            source_root: source_root.into(),
            ndk,
        }
    }

    /// Check the NDK precondition, then build the pipeline
    pub fn discover(
        settings: &'a AndroidSettings,
        env: &'a BuildEnv,
        layout: &'a Layout,
        scanner: &'a LogScanner,
        source_root: impl Into<PathBuf>,
    ) -> Result<Self, BuildError> {
        let ndk = NdkLocation::discover(env)?;
        let origin = match ndk.source() {
            NdkSource::Environment => "NDK",
            NdkSource::SearchPath => "PATH",
        };
        terminal::print_info(&format!("Using ndk-build: {} (from {})", ndk.dir().display(), origin));
        Ok(Self::new(settings, env, layout, scanner, source_root, ndk))
    }

    /// Run the selected products (all when `selection` is empty)
    ///
    /// Every selected product is stamped before the single metadata refresh,
    /// and nothing is built until the refresh is done.
    pub fn run(
        &self,
        runner: &mut dyn CommandRunner,
        selection: &[String],
    ) -> Result<Vec<AndroidProductReport>, BuildError> {
        let products = self.select(selection)?;
        let env = self.ndk.env_overrides();

        let mut staged = Vec::with_capacity(products.len());
        for product in products {
            staged.push(self.stage_product(runner, &env, product)?);
        }

        // the refresh output lands in the first product's log
        if let Some(first) = staged.first_mut() {
            self.refresh_projects(runner, &mut first.sink, &env)?;
        }

        let mut reports = Vec::with_capacity(staged.len());
        for stage in staged {
            reports.push(self.build_product(runner, &env, stage)?);
        }
        Ok(reports)
    }

    fn select(&self, selection: &[String]) -> Result<Vec<&'a AndroidProduct>, BuildError> {
        if selection.is_empty() {
            return Ok(self.settings.products.iter().collect());
        }
        selection
            .iter()
            .map(|name| {
                self.settings
                    .products
                    .iter()
                    .find(|p| &p.name == name)
                    .ok_or_else(|| {
                        BuildError::config(format!("unknown android product '{}'", name))
                    })
            })
            .collect()
    }

    /// Open the product's log, discover its version and stamp every target
    fn stage_product(
        &self,
        runner: &mut dyn CommandRunner,
        env: &[(String, String)],
        product: &'a AndroidProduct,
    ) -> Result<StagedProduct<'a>, BuildError> {
        let install_dir = self.layout.android_install_dir(&product.name);
        ensure_dir(&install_dir)?;
        let log_file = install_dir.join("log.txt");
        let mut sink = LogSink::create(&log_file)?;

        let version =
            VersionInfo::from_cmake_lists(&product.cmake_lists(), &self.settings.version_prefix, self.env)?;
        terminal::print_info(&format!(
            "{} version {} ({})",
            product.name,
            version,
            version.version_string()
        ));

        for target in &product.targets {
            self.stamp_target(runner, &mut sink, env, product, target, &version)?;
        }

        Ok(StagedProduct {
            product,
            install_dir,
            log_file,
            sink,
            version,
        })
    }

    fn build_product(
        &self,
        runner: &mut dyn CommandRunner,
        env: &[(String, String)],
        stage: StagedProduct<'a>,
    ) -> Result<AndroidProductReport, BuildError> {
        let StagedProduct {
            product,
            install_dir,
            log_file,
            mut sink,
            version,
        } = stage;

        let mut artifacts = Vec::new();
        for target in &product.targets {
            terminal::print_banner(&format!("Building {}/{}", product.name, target.name));
            let target_dir = product.target_dir(target);
            let build = ToolCommand::new("make")
                .arg(format!("-j{}", self.settings.jobs))
                .arg("-C")
                .arg(target_dir.display().to_string());
            runner.run(&build, &mut sink, env)?;

            artifacts.extend(collect_artifacts(
                &target_dir,
                &target.binaries,
                &install_dir.join(&target.name),
            )?);
        }
        drop(sink);

        let findings = self.scanner.scan(&log_file)?;
        report_findings(&log_file, &findings);

        Ok(AndroidProductReport {
            name: product.name.clone(),
            version,
            log_file,
            artifacts,
            findings,
        })
    }

    fn stamp_target(
        &self,
        runner: &mut dyn CommandRunner,
        sink: &mut LogSink,
        env: &[(String, String)],
        product: &AndroidProduct,
        target: &AndroidTarget,
        version: &VersionInfo,
    ) -> Result<(), BuildError> {
        let target_dir = product.target_dir(target);
        for stamper in &target.stampers {
            match stamper {
                Stamper::Cmake => {
                    let cmd = version::cmake_stamp_command(
                        version,
                        &self.settings.version_prefix,
                        &product.source_root,
                        &product.version_script(target),
                        &self.env.test_library,
                    );
                    runner.run(&cmd, sink, env)?;
                }
                Stamper::Manifest => {
                    for outcome in [
                        version::stamp_strings(&target_dir, version)?,
                        version::stamp_manifest(&target_dir, version)?,
                    ] {
                        if outcome == StampOutcome::NothingToStamp {
                            tracing::debug!(target = %target.name, "template missing, skipped");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn refresh_projects(
        &self,
        runner: &mut dyn CommandRunner,
        sink: &mut LogSink,
        env: &[(String, String)],
    ) -> Result<(), BuildError> {
        for dir in manifest_dirs(&self.source_root) {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let cmd = ToolCommand::new("android").args([
                "update".to_string(),
                "project".to_string(),
                "--name".to_string(),
                name,
                "--target".to_string(),
                self.settings.api_target.clone(),
                "--path".to_string(),
                dir.display().to_string(),
            ]);
            runner.run(&cmd, sink, env)?;
        }
        Ok(())
    }
}

/// Directories under `root` holding an AndroidManifest.xml, in walk order
pub fn manifest_dirs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect()
}

/// Copy each expected binary into `dest_dir`; a missing one is fatal
pub fn collect_artifacts(
    target_dir: &Path,
    binaries: &[String],
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, BuildError> {
    ensure_dir(dest_dir)?;

    let mut installed = Vec::with_capacity(binaries.len());
    for binary in binaries {
        let src = target_dir.join(binary);
        println!("Installing: {} -> {}", src.display(), dest_dir.display());

        let file_name = match src.file_name() {
            Some(name) if src.is_file() => name.to_owned(),
            _ => return Err(BuildError::MissingArtifact { path: src }),
        };
        let dest = dest_dir.join(file_name);
        std::fs::copy(&src, &dest).map_err(|e| BuildError::io("copy", &src, e))?;
        installed.push(dest);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Records commands; `make` creates the target's binaries unless told not to
    struct FakeRunner {
        commands: Vec<(String, Vec<(String, String)>)>,
        binaries: Vec<(PathBuf, Vec<String>)>,
        fail_on: Option<String>,
    }

    impl FakeRunner {
        fn new(binaries: Vec<(PathBuf, Vec<String>)>) -> Self {
            Self {
                commands: Vec::new(),
                binaries,
                fail_on: None,
            }
        }

        fn lines(&self) -> Vec<String> {
            self.commands.iter().map(|(c, _)| c.clone()).collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn execute(
            &mut self,
            command: &ToolCommand,
            sink: &mut LogSink,
            env: &[(String, String)],
        ) -> Result<Option<i32>, BuildError> {
            let line = command.to_string();
            self.commands.push((line.clone(), env.to_vec()));
            writeln!(sink, "ran {}", command.program()).unwrap();

            if self.fail_on.as_deref().map_or(false, |f| line.contains(f)) {
                return Ok(Some(2));
            }
            if command.program() == "make" {
                let dir = PathBuf::from(command.get_args().last().unwrap());
                for (target_dir, files) in &self.binaries {
                    if *target_dir == dir {
                        for file in files {
                            let path = dir.join(file);
                            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                            std::fs::write(path, b"\x7fELF").unwrap();
                        }
                    }
                }
            }
            Ok(Some(0))
        }
    }

    struct Tree {
        _temp: tempfile::TempDir,
        root: PathBuf,
        settings: AndroidSettings,
    }

    fn tree() -> Tree {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();
        let cmake_root = root.join("patrace/project/cmake");
        let android_root = root.join("patrace/project/android");
        std::fs::create_dir_all(&cmake_root).unwrap();
        std::fs::write(
            cmake_root.join("CMakeLists.txt"),
            "set(PATRACE_VERSION_MAJOR 4)\nset(PATRACE_VERSION_MINOR 1)\nset(PATRACE_VERSION_PATCH 2)\n",
        )
        .unwrap();

        let retrace = android_root.join("eglretrace");
        std::fs::create_dir_all(retrace.join("res/values")).unwrap();
        std::fs::write(
            retrace.join(version::MANIFEST_TEMPLATE),
            "<manifest android:versionCode=\"0\"/>\n",
        )
        .unwrap();
        std::fs::write(
            retrace.join(version::STRINGS_TEMPLATE),
            "<resources><string name=\"version\"></string></resources>\n",
        )
        .unwrap();
        std::fs::create_dir_all(android_root.join("egltrace")).unwrap();

        let settings = AndroidSettings {
            api_target: "android-23".to_string(),
            version_prefix: "PATRACE".to_string(),
            jobs: 8,
            products: vec![AndroidProduct {
                name: "patrace".to_string(),
                android_root,
                source_root: root.join("patrace/src"),
                cmake_root,
                targets: vec![
                    AndroidTarget {
                        name: "egltrace".to_string(),
                        binaries: vec!["libs/arm64-v8a/libinterceptor_patrace_arm64.so".to_string()],
                        stampers: vec![Stamper::Cmake],
                    },
                    AndroidTarget {
                        name: "eglretrace".to_string(),
                        binaries: vec!["bin/eglretrace-release.apk".to_string()],
                        stampers: vec![Stamper::Manifest],
                    },
                ],
            }],
        };

        Tree {
            _temp: temp,
            root,
            settings,
        }
    }

    fn binaries_for(settings: &AndroidSettings) -> Vec<(PathBuf, Vec<String>)> {
        settings
            .products
            .iter()
            .flat_map(|product| {
                product
                    .targets
                    .iter()
                    .map(move |t| (product.target_dir(t), t.binaries.clone()))
            })
            .collect()
    }

    /// Adds a second product with one manifest-stamped target
    fn add_second_product(tree: &mut Tree) {
        let cmake_root = tree.root.join("fastforward/project/cmake");
        let android_root = tree.root.join("fastforward/project/android");
        std::fs::create_dir_all(&cmake_root).unwrap();
        std::fs::write(
            cmake_root.join("CMakeLists.txt"),
            "set(PATRACE_VERSION_MAJOR 2)\nset(PATRACE_VERSION_MINOR 0)\nset(PATRACE_VERSION_PATCH 7)\n",
        )
        .unwrap();
        let app = android_root.join("ffapp");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(
            app.join(version::MANIFEST_TEMPLATE),
            "<manifest android:versionCode=\"0\"/>\n",
        )
        .unwrap();

        tree.settings.products.push(AndroidProduct {
            name: "fastforward".to_string(),
            android_root,
            source_root: tree.root.join("fastforward/src"),
            cmake_root,
            targets: vec![AndroidTarget {
                name: "ffapp".to_string(),
                binaries: vec!["bin/ffapp-release.apk".to_string()],
                stampers: vec![Stamper::Manifest],
            }],
        });
    }

    #[test]
    fn test_full_pipeline() {
        let tree = tree();
        let env = BuildEnv {
            revision: "r501".to_string(),
            version_type: "release".to_string(),
            ..BuildEnv::default()
        };
        let layout = Layout::under(&tree.root);
        let scanner = LogScanner::default();
        let pipeline = AndroidPipeline::new(
            &tree.settings,
            &env,
            &layout,
            &scanner,
            &tree.root,
            NdkLocation::at("/fake/ndk"),
        );
        let mut runner = FakeRunner::new(binaries_for(&tree.settings));

        let reports = pipeline.run(&mut runner, &[]).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.version, VersionInfo::new(4, 1, 2, "r501", "release"));
        assert!(report.findings.is_empty());

        // Stamp, refresh, then build, in that order
        let lines = runner.lines();
        assert!(lines[0].starts_with("cmake -DSRC_ROOT="));
        assert!(lines[0].contains("-DPATRACE_REVISION=r501"));
        assert!(lines[0].ends_with("egltrace/config.cmake"));
        assert!(lines[1].starts_with("android update project --name eglretrace --target android-23"));
        assert!(lines[2].starts_with("make -j8 -C "));
        assert!(lines[2].ends_with("egltrace"));
        assert!(lines[3].ends_with("eglretrace"));
        assert_eq!(lines.len(), 4);

        // Every command sees the discovered NDK
        for (_, env) in &runner.commands {
            assert_eq!(env, &vec![("NDK".to_string(), "/fake/ndk".to_string())]);
        }

        let install = tree.root.join("install/patrace/android/release");
        assert!(install.join("egltrace/libinterceptor_patrace_arm64.so").is_file());
        assert!(install.join("eglretrace/eglretrace-release.apk").is_file());
        assert_eq!(report.artifacts.len(), 2);

        let manifest = std::fs::read_to_string(
            tree.settings.products[0].android_root.join("eglretrace/AndroidManifest.xml"),
        )
        .unwrap();
        assert!(manifest.contains("android:versionCode=\"40102\""));

        let log = std::fs::read_to_string(install.join("log.txt")).unwrap();
        assert!(log.contains("Command : make -j8 -C"));
    }

    #[test]
    fn test_products_stamped_before_single_refresh() {
        let mut tree = tree();
        add_second_product(&mut tree);
        let env = BuildEnv::default();
        let layout = Layout::under(&tree.root);
        let scanner = LogScanner::default();
        let pipeline = AndroidPipeline::new(
            &tree.settings,
            &env,
            &layout,
            &scanner,
            &tree.root,
            NdkLocation::at("/fake/ndk"),
        );
        let mut runner = FakeRunner::new(binaries_for(&tree.settings));

        let reports = pipeline.run(&mut runner, &[]).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].version, VersionInfo::new(2, 0, 7, "unofficial", "dev"));

        // one refresh pass covers both manifests, then the four builds
        let lines = runner.lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("cmake "));
        assert!(lines[1].starts_with("android update project --name ffapp"));
        assert!(lines[2].starts_with("android update project --name eglretrace"));
        assert!(lines[3..].iter().all(|l| l.starts_with("make ")));
        assert!(lines[5].ends_with("ffapp"));

        // both manifests were stamped before the refresh read them
        let manifest = std::fs::read_to_string(
            tree.settings.products[1].android_root.join("ffapp/AndroidManifest.xml"),
        )
        .unwrap();
        assert!(manifest.contains("android:versionCode=\"20007\""));

        let first_log = std::fs::read_to_string(&reports[0].log_file).unwrap();
        assert!(first_log.contains("Command : android update project"));
        let second_log = std::fs::read_to_string(&reports[1].log_file).unwrap();
        assert!(!second_log.contains("android update project"));
        assert!(second_log.contains("Command : make -j8 -C"));
    }

    #[test]
    fn test_missing_artifact_is_fatal() {
        let tree = tree();
        let env = BuildEnv::default();
        let layout = Layout::under(&tree.root);
        let scanner = LogScanner::default();
        let pipeline = AndroidPipeline::new(
            &tree.settings,
            &env,
            &layout,
            &scanner,
            &tree.root,
            NdkLocation::at("/fake/ndk"),
        );
        // make produces nothing
        let mut runner = FakeRunner::new(Vec::new());

        let err = pipeline.run(&mut runner, &[]).unwrap_err();
        assert!(matches!(err, BuildError::MissingArtifact { path } if path.ends_with("libinterceptor_patrace_arm64.so")));
        // The first target's missing binary stops the pipeline before the second build
        assert_eq!(runner.lines().iter().filter(|l| l.starts_with("make")).count(), 1);
    }

    #[test]
    fn test_build_failure_stops_pipeline() {
        let tree = tree();
        let env = BuildEnv::default();
        let layout = Layout::under(&tree.root);
        let scanner = LogScanner::default();
        let pipeline = AndroidPipeline::new(
            &tree.settings,
            &env,
            &layout,
            &scanner,
            &tree.root,
            NdkLocation::at("/fake/ndk"),
        );
        let mut runner = FakeRunner::new(binaries_for(&tree.settings));
        runner.fail_on = Some("android/egltrace".to_string());

        let err = pipeline.run(&mut runner, &[]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!runner.lines().iter().any(|l| l.ends_with("eglretrace") && l.starts_with("make")));
    }

    #[test]
    fn test_unknown_product_selection() {
        let tree = tree();
        let env = BuildEnv::default();
        let layout = Layout::under(&tree.root);
        let scanner = LogScanner::default();
        let pipeline = AndroidPipeline::new(
            &tree.settings,
            &env,
            &layout,
            &scanner,
            &tree.root,
            NdkLocation::at("/fake/ndk"),
        );
        let mut runner = FakeRunner::new(Vec::new());

        let err = pipeline
            .run(&mut runner, &["retrace-only".to_string()])
            .unwrap_err();
        assert!(matches!(err, BuildError::Config { .. }));
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn test_discover_without_ndk_fails_before_any_command() {
        let tree = tree();
        let empty = tempfile::tempdir().unwrap();
        let env = BuildEnv {
            search_path: Some(empty.path().as_os_str().to_os_string()),
            ..BuildEnv::default()
        };
        let layout = Layout::under(&tree.root);
        let scanner = LogScanner::default();

        let result = AndroidPipeline::discover(&tree.settings, &env, &layout, &scanner, &tree.root);
        assert!(matches!(result, Err(BuildError::MissingTool { .. })));
    }

    #[test]
    fn test_manifest_dirs_sorted() {
        let temp_dir = tempfile::tempdir().unwrap();
        for dir in ["b/app", "a/lib", "c"] {
            let path = temp_dir.path().join(dir);
            std::fs::create_dir_all(&path).unwrap();
            if dir != "c" {
                std::fs::write(path.join(MANIFEST_FILE), "<manifest/>").unwrap();
            }
        }

        let dirs = manifest_dirs(temp_dir.path());
        assert_eq!(
            dirs,
            vec![temp_dir.path().join("a/lib"), temp_dir.path().join("b/app")]
        );
    }
}
