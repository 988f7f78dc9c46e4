//! `turbines serve` command implementation.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;
use turbines_config::{CliSettings, Config};
use turbines_server::{run_server, server_config_from_config};
use turbines_site::FsSiteBuilder;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover turbines.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long, env = "TURBINES_HOST")]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long, env = "TURBINES_PORT")]
    port: Option<u16>,

    /// Watch the project and live reload browsers (default: from config).
    #[arg(long)]
    watch: bool,

    /// Serve the initial build only, without watching.
    #[arg(long, conflicts_with = "watch")]
    no_watch: bool,

    /// Enable verbose output (build timings and request logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            live_reload_enabled: self.resolve_watch_enabled(),
            host: self.host,
            port: self.port,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let site = &config.site_resolved;

        output.field("project", site.project_dir.display());
        output.field("output", site.output_dir.display());
        if config.live_reload.enabled {
            output.field(
                "live reload",
                format!("on, {} ms debounce", config.live_reload.debounce_ms),
            );
        } else {
            output.field("live reload", "off");
        }

        let builder = FsSiteBuilder::from_config(&config);
        run_server(server_config_from_config(&config), Box::new(builder), |addr| {
            output.link("serving", serving_url(addr));
        })
        .await?;

        Ok(())
    }

    /// Resolve `live_reload_enabled` from --watch/--no-watch flags.
    fn resolve_watch_enabled(&self) -> Option<bool> {
        if self.no_watch {
            Some(false)
        } else {
            self.watch.then_some(true)
        }
    }
}

fn serving_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
