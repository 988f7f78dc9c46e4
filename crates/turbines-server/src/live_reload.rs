//! Live reload endpoint and browser client.
//!
//! Browsers load [`RELOAD_SCRIPT_PATH`], which opens a WebSocket to
//! [`RELOAD_SOCKET_PATH`]. The server only ever sends the text `reload`;
//! anything the browser sends is read and ignored.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::header;
use axum::response::IntoResponse;

use crate::hub::ReloadBroadcastHub;
use crate::state::AppState;

/// WebSocket endpoint for reload clients.
pub const RELOAD_SOCKET_PATH: &str = "/_turbines/livereload";

/// Path of the browser bootstrap script.
pub const RELOAD_SCRIPT_PATH: &str = "/_turbines/livereload.js";

/// Tag injected into HTML responses.
pub const RELOAD_SCRIPT_TAG: &str = r#"<script src="/_turbines/livereload.js"></script>"#;

const RELOAD_SCRIPT: &str = include_str!("assets/livereload.js");

/// Serve the browser bootstrap script.
pub(crate) async fn serve_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        RELOAD_SCRIPT,
    )
}

/// Handle WebSocket upgrade for live reload.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Forward reload signals to one client until either side goes away.
async fn handle_socket(mut socket: WebSocket, hub: Arc<ReloadBroadcastHub>) {
    let (id, mut signals) = hub.register();

    loop {
        tokio::select! {
            signal = signals.recv() => {
                let Some(text) = signal else {
                    // Hub dropped us, e.g. on shutdown
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if socket.send(Message::Text(text.to_owned().into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.unregister(id);
}
