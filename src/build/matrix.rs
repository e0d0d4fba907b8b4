//! Product × platform × variant driver
//!
//! Jobs run strictly one after another in a fixed nested order: product,
//! then platform, then variant. Every job's commands are composed before the
//! first process is spawned, so an unknown platform never leaves a partially
//! built matrix behind. The first failing command stops the run; scanner
//! findings only produce warnings.

use crate::build::diagnostics::{report_findings, Finding, LogScanner};
use crate::build::toolchains::{compose, ComposeRequest, ComposedBuild, PlatformTable};
use crate::build::{BuildJob, Layout, Product, Variant};
use crate::config::matrix_toml::BuildSettings;
use crate::config::{BuildEnv, MatrixConfig};
use crate::error::BuildError;
use crate::exec::{CommandRunner, LogSink};
use crate::utils::paths::ensure_dir;
use crate::utils::terminal;

/// Narrows the configured matrix; empty lists select everything
#[derive(Debug, Clone, Default)]
pub struct MatrixFilter {
    pub products: Vec<String>,
    pub platforms: Vec<String>,
    pub variants: Vec<Variant>,
}

impl MatrixFilter {
    /// Products (with their platform lists narrowed) and variants to build
    ///
    /// A filter never adds a platform a product does not list.
    pub fn apply(&self, config: &MatrixConfig) -> Result<(Vec<Product>, Vec<Variant>), BuildError> {
        let table = config.platform_table();
        for platform in &self.platforms {
            table.get(platform)?;
        }
        for name in &self.products {
            if config.product(name).is_none() {
                return Err(BuildError::config(format!("unknown product '{}'", name)));
            }
        }
        for variant in &self.variants {
            if !config.variants.contains(variant) {
                return Err(BuildError::config(format!(
                    "variant '{}' is not configured",
                    variant
                )));
            }
        }

        let products = config
            .products
            .iter()
            .filter(|p| self.products.is_empty() || self.products.contains(&p.name))
            .map(|p| {
                let mut product = p.clone();
                if !self.platforms.is_empty() {
                    product.platforms.retain(|pl| self.platforms.contains(pl));
                }
                product
            })
            .filter(|p| !p.platforms.is_empty())
            .collect();

        let variants = config
            .variants
            .iter()
            .copied()
            .filter(|v| self.variants.is_empty() || self.variants.contains(v))
            .collect();

        Ok((products, variants))
    }
}

/// Every (product, platform, variant) job paired with its product, in build order
pub fn expand<'p>(
    layout: &Layout,
    products: &'p [Product],
    variants: &[Variant],
) -> Vec<(&'p Product, BuildJob)> {
    let mut jobs = Vec::new();
    for product in products {
        for platform in &product.platforms {
            for variant in variants {
                jobs.push((product, BuildJob::new(layout, &product.name, platform, *variant)));
            }
        }
    }
    jobs
}

/// A job together with its composed commands
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub job: BuildJob,
    pub commands: ComposedBuild,
}

/// Result of one finished job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: BuildJob,
    pub findings: Vec<Finding>,
}

/// Result of a finished matrix run
#[derive(Debug, Clone, Default)]
pub struct MatrixReport {
    pub jobs: Vec<JobReport>,
}

impl MatrixReport {
    /// Jobs whose logs had advisory findings
    pub fn flagged(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| !j.findings.is_empty())
    }
}

/// Drives the desktop/embedded matrix
pub struct MatrixDriver<'a> {
    table: PlatformTable,
    settings: &'a BuildSettings,
    env: &'a BuildEnv,
    layout: &'a Layout,
    scanner: &'a LogScanner,
}

impl<'a> MatrixDriver<'a> {
    pub fn new(
        table: PlatformTable,
        settings: &'a BuildSettings,
        env: &'a BuildEnv,
        layout: &'a Layout,
        scanner: &'a LogScanner,
    ) -> Self {
        Self {
            table,
            settings,
            env,
            layout,
            scanner,
        }
    }

    /// Expand the matrix and compose every job's commands
    pub fn plan(&self, products: &[Product], variants: &[Variant]) -> Result<Vec<PlannedJob>, BuildError> {
        expand(self.layout, products, variants)
            .into_iter()
            .map(|(product, job)| {
                let commands = compose(
                    &self.table,
                    &ComposeRequest {
                        platform: &job.platform,
                        variant: job.variant,
                        project_path: &product.path,
                        build_dir: &job.build_dir,
                        install_dir: &job.install_dir,
                        defines: &product.defines,
                        test_library: &self.env.test_library,
                        make_target: &self.settings.make_target,
                        jobs: self.settings.jobs,
                    },
                )?;
                Ok(PlannedJob { job, commands })
            })
            .collect()
    }

    /// Build every job of the matrix, stopping at the first failure
    pub fn run_all(
        &self,
        runner: &mut dyn CommandRunner,
        products: &[Product],
        variants: &[Variant],
    ) -> Result<MatrixReport, BuildError> {
        let planned = self.plan(products, variants)?;
        tracing::debug!(jobs = planned.len(), "matrix planned");

        let mut report = MatrixReport::default();
        for (idx, planned_job) in planned.into_iter().enumerate() {
            terminal::print_info(&format!(
                "[{}] Building {}",
                idx + 1,
                planned_job.job.label()
            ));
            report.jobs.push(self.run_job(runner, planned_job)?);
        }
        Ok(report)
    }

    fn run_job(&self, runner: &mut dyn CommandRunner, planned: PlannedJob) -> Result<JobReport, BuildError> {
        let PlannedJob { job, commands } = planned;

        ensure_dir(&job.install_dir)?;
        let mut sink = LogSink::create(&job.log_file)?;
        ensure_dir(&job.build_dir)?;

        runner.run(&commands.configure, &mut sink, &[])?;
        runner.run(&commands.build, &mut sink, &[])?;
        drop(sink);

        let findings = self.scanner.scan(&job.log_file)?;
        report_findings(&job.log_file, &findings);

        Ok(JobReport { job, findings })
    }
}
