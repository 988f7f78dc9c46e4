//! Static site builder for Turbines.
//!
//! This crate is the build side of Turbines. The dev server only talks to it
//! through the [`SiteBuilder`] trait:
//!
//! - [`SiteBuilder::load`] prepares state once before the first build
//! - [`SiteBuilder::build_site`] produces or updates the output tree
//! - [`SiteBuilder::build_path`], [`SiteBuilder::output_dir`] and
//!   [`SiteBuilder::static_dir`] expose the layout the server needs to watch
//!   and serve
//!
//! [`FsSiteBuilder`] is the filesystem implementation: markdown and HTML pages
//! from `pages/`, an optional `templates/page.html` layout (or one named in a
//! page's front matter, see [`PageMetadata`]), and verbatim copy of `static/`. [`BuildHook`]s observe and transform each build.
//!
//! # Example
//!
//! ```ignore
//! use turbines_config::Config;
//! use turbines_site::{FsSiteBuilder, SiteBuilder};
//!
//! let config = Config::load(None, None)?;
//! let mut builder = FsSiteBuilder::from_config(&config);
//! builder.load()?;
//! let report = builder.build_site(false)?;
//! println!("{} pages", report.pages_rendered);
//! ```

mod builder;
mod fs;
mod hooks;
mod metadata;
#[cfg(feature = "mock")]
mod mock;
mod render;
mod scaffold;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use builder::FsSiteBuilder;
pub use hooks::{BuildHook, PageContext, SitemapHook};
pub use metadata::PageMetadata;
#[cfg(feature = "mock")]
pub use mock::{MockControl, MockSiteBuilder};
pub use scaffold::scaffold;

/// Narrow interface between the dev server and whatever produces the site.
///
/// Implementations own the output tree: nothing else writes to
/// [`output_dir`](Self::output_dir).
pub trait SiteBuilder: Send {
    /// Parse configuration and prepare state. Called once before any build.
    fn load(&mut self) -> Result<(), BuildError>;

    /// Produce or update the output tree.
    ///
    /// With `incremental` set only static assets are refreshed.
    fn build_site(&mut self, incremental: bool) -> Result<BuildReport, BuildError>;

    /// Project root that the build reads from.
    fn build_path(&self) -> &Path;

    /// Directory that the build writes to.
    fn output_dir(&self) -> &Path;

    /// Directory holding static assets, a subdirectory of the build path.
    fn static_dir(&self) -> &Path;
}

/// Summary of a successful build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Whether this was an asset-only build.
    pub incremental: bool,
    /// Pages rendered into the output tree.
    pub pages_rendered: usize,
    /// Static files copied into the output tree.
    pub assets_copied: usize,
    /// Wall-clock duration of the build.
    pub elapsed: Duration,
}

/// Error returned by a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Reading a source or writing an output failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A page source is not valid UTF-8.
    #[error("Page is not valid UTF-8: {}", .0.display())]
    Encoding(PathBuf),

    /// A page's front matter is not valid YAML metadata.
    #[error("Invalid front matter in {}: {message}", path.display())]
    Metadata {
        /// Page source.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A page names a template outside the templates directory.
    #[error("Page {} names invalid template {name:?}", path.display())]
    Template {
        /// Page source.
        path: PathBuf,
        /// Template name as written.
        name: String,
    },

    /// The layout template cannot be used.
    #[error("Layout template {} is missing the {{{{ content }}}} placeholder", .0.display())]
    Layout(PathBuf),

    /// A build hook refused the build.
    #[error("Hook {hook} failed: {message}")]
    Hook {
        /// Hook name.
        hook: &'static str,
        /// Failure description.
        message: String,
    },

    /// `build_site` was called before `load`.
    #[error("Site builder used before load()")]
    NotLoaded,
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
