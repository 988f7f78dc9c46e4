//! `turbines build` command implementation.

use std::path::PathBuf;

use clap::Args;
use turbines_config::Config;
use turbines_site::{BuildReport, FsSiteBuilder, SiteBuilder};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover turbines.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output (per-page logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the build fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), None)?;
        let site = &config.site_resolved;
        output.field("project", site.project_dir.display());

        let mut builder = FsSiteBuilder::from_config(&config);
        builder.load()?;
        let report = builder.build_site(false)?;

        output.success(&summary(&report));
        output.link("output", site.output_dir.display());
        Ok(())
    }
}

fn summary(report: &BuildReport) -> String {
    format!(
        "Built {} {} and copied {} {} in {} ms",
        report.pages_rendered,
        plural(report.pages_rendered, "page", "pages"),
        report.assets_copied,
        plural(report.assets_copied, "asset", "assets"),
        report.elapsed.as_millis()
    )
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
