//! Static file serving from the build output.
//!
//! Reads go straight to the filesystem and never wait on a rebuild. The
//! builder replaces output files atomically, so a response carries either
//! the previous or the new version of a file.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use mime_guess::Mime;
use percent_encoding::percent_decode_str;

use crate::live_reload::RELOAD_SCRIPT_TAG;
use crate::state::AppState;

/// File served for directory requests.
const INDEX_FILE: &str = "index.html";

/// Optional page served with 404 responses.
const NOT_FOUND_FILE: &str = "404.html";

/// Serve a file from the output directory.
pub(crate) async fn serve_file(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
        )
            .into_response();
    }

    let Some(relative) = resolve_request_path(uri.path()) else {
        tracing::warn!(path = %uri.path(), "Rejected path outside output directory");
        return not_found(&state, &method).await;
    };

    let full_path = state.output_dir.join(&relative);
    match tokio::fs::metadata(&full_path).await {
        Ok(meta) if meta.is_dir() => return redirect_to_directory(&uri),
        Ok(_) => {}
        Err(_) => return not_found(&state, &method).await,
    }

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => file_response(&state, &method, StatusCode::OK, &relative, bytes),
        Err(e) => {
            tracing::debug!(path = %full_path.display(), error = %e, "Failed to read file");
            not_found(&state, &method).await
        }
    }
}

/// Map a URL path to a path relative to the output directory.
///
/// The path is percent-decoded. An empty path or one ending in `/` maps to
/// `index.html` in that directory. Returns `None` for paths that are not
/// valid UTF-8 or that contain parent, root or prefix components.
pub(crate) fn resolve_request_path(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded[..]);

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if trimmed.is_empty() || trimmed.ends_with('/') {
        relative.push(INDEX_FILE);
    }
    Some(relative)
}

/// Insert the reload bootstrap before the last `</body>`, or append it.
///
/// Documents that already reference the script are returned unchanged.
pub(crate) fn inject_reload_script(html: &str) -> String {
    if html.contains(RELOAD_SCRIPT_TAG) {
        return html.to_owned();
    }

    // ASCII lowercasing keeps byte offsets aligned with the original
    let lower = html.to_ascii_lowercase();
    let Some(at) = lower.rfind("</body>") else {
        return format!("{html}{RELOAD_SCRIPT_TAG}");
    };

    let mut out = String::with_capacity(html.len() + RELOAD_SCRIPT_TAG.len());
    out.push_str(&html[..at]);
    out.push_str(RELOAD_SCRIPT_TAG);
    out.push_str(&html[at..]);
    out
}

fn is_html(mime: &Mime) -> bool {
    mime.type_() == mime_guess::mime::TEXT && mime.subtype() == mime_guess::mime::HTML
}

fn content_type(mime: &Mime) -> HeaderValue {
    let value = if is_html(mime) {
        "text/html; charset=utf-8".to_owned()
    } else {
        mime.essence_str().to_owned()
    };
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

fn file_response(
    state: &AppState,
    method: &Method,
    status: StatusCode,
    relative: &Path,
    bytes: Vec<u8>,
) -> Response {
    let mime = mime_guess::from_path(relative).first_or_octet_stream();

    let body = if state.live_reload && is_html(&mime) {
        match String::from_utf8(bytes) {
            Ok(html) => inject_reload_script(&html).into_bytes(),
            Err(e) => e.into_bytes(),
        }
    } else {
        bytes
    };

    let length = body.len();
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(body)
    };

    (
        status,
        [
            (header::CONTENT_TYPE, content_type(&mime)),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response()
}

fn redirect_to_directory(uri: &Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{}/?{query}", uri.path()),
        None => format!("{}/", uri.path()),
    };
    (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response()
}

async fn not_found(state: &AppState, method: &Method) -> Response {
    let page = Path::new(NOT_FOUND_FILE);
    match tokio::fs::read(state.output_dir.join(page)).await {
        Ok(bytes) => file_response(state, method, StatusCode::NOT_FOUND, page, bytes),
        Err(_) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}
