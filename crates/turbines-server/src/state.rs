//! Application state.
//!
//! Shared state for all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::hub::ReloadBroadcastHub;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Build output served over HTTP.
    pub(crate) output_dir: PathBuf,
    /// Connected reload clients.
    pub(crate) hub: Arc<ReloadBroadcastHub>,
    /// Inject the reload script and expose the reload endpoints.
    pub(crate) live_reload: bool,
}
