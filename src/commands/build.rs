//! Build command implementation

use anyhow::Result;
use clap::{Args, ValueEnum};

use super::RunContext;
use crate::build::android::AndroidPipeline;
use crate::build::matrix::{MatrixDriver, MatrixFilter, MatrixReport};
use crate::build::toolchains::PlatformFamily;
use crate::build::Variant;
use crate::cli::GlobalArgs;
use crate::config::MatrixConfig;
use crate::error::BuildError;
use crate::exec::ProcessRunner;
use crate::utils::terminal;

/// Which drivers to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BuildTarget {
    /// Desktop/embedded matrix, then Android
    #[default]
    All,
    /// Desktop/embedded matrix only
    Matrix,
    /// Android products only
    Android,
}

impl std::fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildTarget::All => write!(f, "all"),
            BuildTarget::Matrix => write!(f, "matrix"),
            BuildTarget::Android => write!(f, "android"),
        }
    }
}

/// Build the matrix and/or the Android products
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// What to build
    #[arg(value_enum, default_value_t = BuildTarget::All)]
    pub target: BuildTarget,

    /// Only build these products (comma-separated)
    #[arg(long, short = 'p', value_delimiter = ',')]
    pub product: Vec<String>,

    /// Only build these platforms (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub platform: Vec<String>,

    /// Only build these variants (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub variant: Vec<Variant>,
}

impl BuildCommand {
    /// Execute the build command
    pub fn execute(self, global: &GlobalArgs) -> Result<()> {
        let ctx = RunContext::load(global)?;
        let scanner = ctx.config.scanner()?;
        let mut runner = ProcessRunner::with_working_dir(&ctx.source_root);

        let (run_matrix, run_android) = self.drivers(&ctx.config)?;

        let matrix_report = if run_matrix {
            let filter = self.matrix_filter(&ctx.config);
            let (products, variants) = filter.apply(&ctx.config)?;
            let driver = MatrixDriver::new(
                ctx.config.platform_table(),
                &ctx.config.build,
                &ctx.env,
                &ctx.layout,
                &scanner,
            );
            Some(driver.run_all(&mut runner, &products, &variants)?)
        } else {
            None
        };

        let mut android_reports = Vec::new();
        if run_android {
            match &ctx.config.android {
                Some(settings) => {
                    let selection = self.android_selection(&ctx.config);
                    if self.product.is_empty() || !selection.is_empty() {
                        let pipeline = AndroidPipeline::discover(
                            settings,
                            &ctx.env,
                            &ctx.layout,
                            &scanner,
                            &ctx.source_root,
                        )?;
                        android_reports = pipeline.run(&mut runner, &selection)?;
                    }
                }
                None if self.target == BuildTarget::Android => {
                    terminal::print_warning("No [android] section configured; nothing to build");
                }
                None => {}
            }
        }

        if let Some(report) = &matrix_report {
            print_matrix_summary(report);
        }
        for report in &android_reports {
            println!(
                "  {} android {} ({} artifacts)",
                report.name,
                report.version,
                report.artifacts.len()
            );
            if !report.findings.is_empty() {
                terminal::print_warning(&format!(
                    "{} suspicious line(s) in {}",
                    report.findings.len(),
                    report.log_file.display()
                ));
            }
        }

        terminal::print_success("Build complete");
        Ok(())
    }

    /// Whether the matrix and the Android pipeline take part in this run
    ///
    /// A platform filter naming only android-family platforms selects the
    /// Android pipeline; one naming none of them leaves it out. `build matrix`
    /// rejects android-family platforms outright.
    fn drivers(&self, config: &MatrixConfig) -> Result<(bool, bool), BuildError> {
        let table = config.platform_table();
        let is_android = |name: &String| {
            table
                .get(name)
                .map(|rule| rule.family == PlatformFamily::Android)
                .unwrap_or(false)
        };
        let wants_android = self.platform.is_empty() || self.platform.iter().any(is_android);
        let wants_matrix = self.platform.is_empty() || !self.platform.iter().all(is_android);
        let wants_release = self.variant.is_empty() || self.variant.contains(&Variant::Release);

        Ok(match self.target {
            BuildTarget::All => (wants_matrix, wants_android && wants_release),
            BuildTarget::Matrix => {
                if let Some(platform) = self.platform.iter().find(|p| is_android(p)) {
                    return Err(BuildError::UnsupportedPlatform {
                        platform: platform.clone(),
                        reason: "android platforms are built by `buildmatrix build android`".to_string(),
                    });
                }
                (true, false)
            }
            BuildTarget::Android => (false, true),
        })
    }

    fn matrix_filter(&self, config: &MatrixConfig) -> MatrixFilter {
        let table = config.platform_table();
        MatrixFilter {
            products: self.product.clone(),
            // under `all`, android platform names are routed to the Android pipeline
            platforms: self
                .platform
                .iter()
                .filter(|p| {
                    self.target != BuildTarget::All
                        || table
                            .get(p)
                            .map(|rule| rule.family != PlatformFamily::Android)
                            .unwrap_or(true)
                })
                .cloned()
                .collect(),
            variants: self.variant.clone(),
        }
    }

    /// Android products named by `--product`
    ///
    /// For `build android` every name must be an Android product; for `all`
    /// names that only exist in the matrix are skipped.
    fn android_selection(&self, config: &MatrixConfig) -> Vec<String> {
        if self.target == BuildTarget::Android {
            return self.product.clone();
        }
        let known: Vec<&str> = config
            .android
            .iter()
            .flat_map(|a| a.products.iter().map(|p| p.name.as_str()))
            .collect();
        self.product
            .iter()
            .filter(|name| known.contains(&name.as_str()))
            .cloned()
            .collect()
    }
}

fn print_matrix_summary(report: &MatrixReport) {
    if report.jobs.is_empty() {
        terminal::print_warning("No matrix job matches the product and platform filters");
        return;
    }
    terminal::print_info(&format!("Built {} matrix job(s)", report.jobs.len()));
    for job in report.flagged() {
        terminal::print_warning(&format!(
            "{}: {} suspicious line(s) in {}",
            job.job.label(),
            job.findings.len(),
            job.job.log_file.display()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(target: BuildTarget, platforms: &[&str], variants: &[Variant]) -> BuildCommand {
        BuildCommand {
            target,
            product: Vec::new(),
            platform: platforms.iter().map(|p| p.to_string()).collect(),
            variant: variants.to_vec(),
        }
    }

    #[test]
    fn test_drivers_default_to_both() {
        let config = MatrixConfig::builtin().unwrap();
        assert_eq!(command(BuildTarget::All, &[], &[]).drivers(&config).unwrap(), (true, true));
        assert_eq!(command(BuildTarget::Matrix, &[], &[]).drivers(&config).unwrap(), (true, false));
        assert_eq!(command(BuildTarget::Android, &[], &[]).drivers(&config).unwrap(), (false, true));
    }

    #[test]
    fn test_platform_filter_routes_android() {
        let config = MatrixConfig::builtin().unwrap();
        assert_eq!(
            command(BuildTarget::All, &["android"], &[]).drivers(&config).unwrap(),
            (false, true)
        );
        assert_eq!(
            command(BuildTarget::All, &["x11_x64"], &[]).drivers(&config).unwrap(),
            (true, false)
        );
        assert_eq!(
            command(BuildTarget::All, &["x11_x64", "android"], &[]).drivers(&config).unwrap(),
            (true, true)
        );

        let filter = command(BuildTarget::All, &["x11_x64", "android"], &[]).matrix_filter(&config);
        assert_eq!(filter.platforms, vec!["x11_x64".to_string()]);
    }

    #[test]
    fn test_matrix_target_rejects_android_platform() {
        let config = MatrixConfig::builtin().unwrap();
        let err = command(BuildTarget::Matrix, &["android"], &[])
            .drivers(&config)
            .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedPlatform { platform, .. } if platform == "android"));

        let err = command(BuildTarget::Matrix, &["x11_x64", "android"], &[])
            .drivers(&config)
            .unwrap_err();
        assert!(err.to_string().contains("build android"));

        assert_eq!(
            command(BuildTarget::Matrix, &["x11_x64"], &[]).drivers(&config).unwrap(),
            (true, false)
        );
    }

    #[test]
    fn test_debug_only_skips_android() {
        let config = MatrixConfig::builtin().unwrap();
        assert_eq!(
            command(BuildTarget::All, &[], &[Variant::Debug]).drivers(&config).unwrap(),
            (true, false)
        );
    }

    #[test]
    fn test_android_selection_in_all_mode() {
        let config = MatrixConfig::builtin().unwrap();
        let mut cmd = command(BuildTarget::All, &[], &[]);
        cmd.product = vec!["fastforward".to_string(), "patrace".to_string()];
        assert_eq!(cmd.android_selection(&config), vec!["patrace".to_string()]);

        cmd.target = BuildTarget::Android;
        assert_eq!(cmd.android_selection(&config).len(), 2);
    }
}
