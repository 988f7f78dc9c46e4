//! Development server for Turbines.
//!
//! Serves the built site over HTTP, watches the project for changes, rebuilds
//! and tells connected browsers to reload.
//!
//! # Quick Start
//!
//! ```ignore
//! use turbines_config::Config;
//! use turbines_server::{run_server, server_config_from_config};
//! use turbines_site::FsSiteBuilder;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load(None, None).unwrap();
//!     let builder = FsSiteBuilder::from_config(&config);
//!
//!     run_server(server_config_from_config(&config), Box::new(builder), |addr| {
//!         println!("Serving on http://{addr}");
//!     })
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! notify thread ──blocking_send──► FileChangeWatcher (debounce, one scope)
//!                                        │ ChangeEvent
//!                                        ▼
//!                                  RebuildCoordinator ──spawn_blocking──► SiteBuilder
//!                                        │ on success                        │ writes
//!                                        ▼                                   ▼
//! Browser ◄──WebSocket "reload"── ReloadBroadcastHub            output directory
//!    │                                                                       ▲
//!    └───────────────HTTP GET/HEAD──────► StaticAssetServer ──tokio::fs──────┘
//! ```

mod app;
mod coordinator;
mod debouncer;
mod error;
mod hub;
mod live_reload;
mod middleware;
mod state;
mod static_files;
mod watcher;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use turbines_site::SiteBuilder;

pub use coordinator::{BuildEpoch, RebuildCoordinator};
pub use error::ServerError;
pub use hub::{ClientId, RELOAD_MESSAGE, ReloadBroadcastHub, ReloadReceiver};
pub use live_reload::{RELOAD_SCRIPT_PATH, RELOAD_SCRIPT_TAG, RELOAD_SOCKET_PATH};
pub use watcher::{ChangeEvent, DEFAULT_IGNORE_PATTERNS, FileChangeWatcher, WatchOptions};

use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. `0` picks a free port.
    pub port: u16,
    /// Watch the project, rebuild on change and inject the reload script.
    pub live_reload_enabled: bool,
    /// Quiet period before a burst of changes triggers a rebuild.
    pub debounce: Duration,
    /// Extra glob patterns excluded from watching.
    pub ignore_patterns: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            live_reload_enabled: true,
            debounce: Duration::from_millis(300),
            ignore_patterns: Vec::new(),
        }
    }
}

/// Create server configuration from Turbines config.
#[must_use]
pub fn server_config_from_config(config: &turbines_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        live_reload_enabled: config.live_reload.enabled,
        debounce: Duration::from_millis(config.live_reload.debounce_ms),
        ignore_patterns: config.live_reload.ignore_patterns.clone(),
    }
}

/// Development server, not yet started.
pub struct DevServer {
    config: ServerConfig,
    builder: Box<dyn SiteBuilder>,
}

impl DevServer {
    /// Create a server that builds with `builder`.
    #[must_use]
    pub fn new(config: ServerConfig, builder: Box<dyn SiteBuilder>) -> Self {
        Self { config, builder }
    }

    /// Build the site once, then start serving.
    ///
    /// The initial build runs to completion before the listener is bound. A
    /// failed initial build is logged and the server starts anyway, serving
    /// whatever output already exists; with watching enabled the next
    /// successful rebuild fixes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder cannot be loaded, the address cannot
    /// be bound or the watcher cannot be started.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        let Self {
            config,
            mut builder,
        } = self;

        let (builder, initial_epoch) = tokio::task::spawn_blocking(move || {
            builder.load().map_err(ServerError::Load)?;
            let epoch = initial_build(builder.as_mut());
            Ok::<_, ServerError>((builder, epoch))
        })
        .await??;

        let output_dir = builder.output_dir().to_path_buf();
        let watch_options = WatchOptions {
            root: builder.build_path().to_path_buf(),
            output_dir: output_dir.clone(),
            static_dir: builder.static_dir().to_path_buf(),
            debounce: config.debounce,
            ignore_patterns: config.ignore_patterns.clone(),
        };

        let listener = bind(&config.host, config.port).await?;
        let local_addr = listener.local_addr()?;

        let hub = Arc::new(ReloadBroadcastHub::new());
        let coordinator = RebuildCoordinator::spawn(builder, Arc::clone(&hub), initial_epoch);

        let watcher = if config.live_reload_enabled {
            match FileChangeWatcher::start(&watch_options, coordinator.trigger_sender()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    coordinator.shutdown().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        let state = Arc::new(AppState {
            output_dir: output_dir.clone(),
            hub: Arc::clone(&hub),
            live_reload: config.live_reload_enabled,
        });
        let app = app::create_router(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            address = %local_addr,
            output = %output_dir.display(),
            live_reload = config.live_reload_enabled,
            "Starting server"
        );

        Ok(RunningServer {
            local_addr,
            output_dir,
            hub,
            coordinator,
            watcher,
            shutdown: shutdown_tx,
            server,
        })
    }
}

/// Run the first full build. Returns the epoch reached.
fn initial_build(builder: &mut dyn SiteBuilder) -> BuildEpoch {
    let started = Instant::now();
    match builder.build_site(false) {
        Ok(report) => {
            tracing::info!(
                pages = report.pages_rendered,
                assets = report.assets_copied,
                elapsed_ms = started.elapsed().as_millis(),
                "Initial build finished"
            );
            BuildEpoch::ZERO.next()
        }
        Err(e) => {
            tracing::error!(error = %e, "Initial build failed, serving existing output");
            BuildEpoch::ZERO
        }
    }
}

async fn bind(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let invalid = || ServerError::InvalidAddress {
        host: host.to_owned(),
        port,
    };
    let addr = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)?;

    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Handle to a started [`DevServer`].
pub struct RunningServer {
    local_addr: SocketAddr,
    output_dir: PathBuf,
    hub: Arc<ReloadBroadcastHub>,
    coordinator: RebuildCoordinator,
    watcher: Option<FileChangeWatcher>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Directory being served.
    #[must_use]
    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    /// Current build epoch.
    #[must_use]
    pub fn epoch(&self) -> BuildEpoch {
        self.coordinator.epoch()
    }

    /// Receiver that observes every epoch change.
    #[must_use]
    pub fn subscribe_epoch(&self) -> watch::Receiver<BuildEpoch> {
        self.coordinator.subscribe_epoch()
    }

    /// Connected reload clients.
    #[must_use]
    pub fn hub(&self) -> &Arc<ReloadBroadcastHub> {
        &self.hub
    }

    /// Request a rebuild as if `event` had come from the watcher.
    pub fn trigger(&self, event: ChangeEvent) -> bool {
        self.coordinator.trigger(event)
    }

    /// Stop the server.
    ///
    /// Cancels a pending debounced change, stops watching, closes the
    /// listener and reload connections, then waits for an in-flight rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server failed while running.
    pub async fn stop(self) -> Result<(), ServerError> {
        if let Some(watcher) = self.watcher {
            watcher.stop();
        }

        let _ = self.shutdown.send(());
        self.hub.disconnect_all();
        let served = self.server.await;

        self.coordinator.shutdown().await;
        tracing::info!("Server stopped");

        served??;
        Ok(())
    }
}

/// Run the server until Ctrl-C.
///
/// `on_ready` receives the bound address once the listener is up, so a
/// configured port of 0 is reported as the port actually chosen.
///
/// # Errors
///
/// Returns an error if the server fails to start or fails while running.
pub async fn run_server(
    config: ServerConfig,
    builder: Box<dyn SiteBuilder>,
    on_ready: impl FnOnce(SocketAddr),
) -> Result<(), ServerError> {
    let server = DevServer::new(config, builder).start().await?;
    on_ready(server.local_addr());

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C, stopping server");
    }
    tracing::info!("Shutdown signal received, stopping server...");

    server.stop().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use turbines_site::MockSiteBuilder;

    fn config() -> ServerConfig {
        ServerConfig {
            port: 0,
            live_reload_enabled: false,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_server_config_from_config() {
        let mut config = turbines_config::Config::default_with_base(std::path::Path::new("/p"));
        config.server.port = 9000;
        config.live_reload.debounce_ms = 150;
        config.live_reload.ignore_patterns = vec!["tmp/**".to_owned()];

        let server = server_config_from_config(&config);

        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 9000);
        assert!(server.live_reload_enabled);
        assert_eq!(server.debounce, Duration::from_millis(150));
        assert_eq!(server.ignore_patterns, vec!["tmp/**".to_owned()]);
    }

    #[tokio::test]
    async fn test_start_runs_initial_build() {
        let tmp = TempDir::new().unwrap();
        let builder = MockSiteBuilder::new(tmp.path());
        let control = builder.control();

        let server = DevServer::new(config(), Box::new(builder)).start().await.unwrap();

        assert_eq!(server.epoch(), BuildEpoch::ZERO.next());
        assert_eq!(control.builds(), vec![false]);
        assert_ne!(server.local_addr().port(), 0);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_initial_build_still_starts() {
        let tmp = TempDir::new().unwrap();
        let builder = MockSiteBuilder::new(tmp.path());
        builder.control().set_failing(true);

        let server = DevServer::new(config(), Box::new(builder)).start().await.unwrap();

        assert_eq!(server.epoch(), BuildEpoch::ZERO);
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_error_is_reported() {
        let tmp = TempDir::new().unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let result = DevServer::new(
            ServerConfig { port, ..config() },
            Box::new(MockSiteBuilder::new(tmp.path())),
        )
        .start()
        .await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_invalid_host_is_reported() {
        let tmp = TempDir::new().unwrap();

        let result = DevServer::new(
            ServerConfig {
                host: "not a host".to_owned(),
                ..config()
            },
            Box::new(MockSiteBuilder::new(tmp.path())),
        )
        .start()
        .await;

        assert!(matches!(result, Err(ServerError::InvalidAddress { .. })));
    }
}
