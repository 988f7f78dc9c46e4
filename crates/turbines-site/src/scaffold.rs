//! Starter project layout for `turbines create`.

use std::path::{Path, PathBuf};

use crate::BuildError;

const CONFIG: &str = r#"[server]
host = "127.0.0.1"
port = 8000

[site]
pages_dir = "pages"
templates_dir = "templates"
static_dir = "static"
output_dir = ".site"
url = "http://localhost:8000"

[live_reload]
enabled = true
debounce_ms = 300
"#;

const INDEX_PAGE: &str = "# Welcome to Turbines\n\n\
Edit `pages/index.md` while `turbines serve` is running and this page reloads.\n";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<main>
{{ content }}
</main>
</body>
</html>
"#;

const STYLESHEET: &str = "body {\n  font-family: system-ui, sans-serif;\n  \
max-width: 48rem;\n  margin: 2rem auto;\n  padding: 0 1rem;\n  line-height: 1.6;\n}\n";

const FILES: &[(&str, &str)] = &[
    ("turbines.toml", CONFIG),
    ("pages/index.md", INDEX_PAGE),
    ("templates/page.html", PAGE_TEMPLATE),
    ("static/style.css", STYLESHEET),
];

/// Create a starter project at `root`.
///
/// Existing files are left untouched. Returns the files that were written.
///
/// # Errors
///
/// Returns [`BuildError::Io`] if a directory or file cannot be created.
pub fn scaffold(root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut created = Vec::new();

    for (rel, contents) in FILES {
        let path = root.join(rel);
        if path.exists() {
            tracing::debug!(path = %path.display(), "Keeping existing file");
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        std::fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))?;
        created.push(path);
    }

    Ok(created)
}
