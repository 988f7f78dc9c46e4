//! Build hooks.
//!
//! Hooks observe a build from the outside: they run before and after the
//! whole build, transform each page before and after rendering, and are told
//! when a build fails.

use std::path::PathBuf;

use turbines_config::SiteConfig;

use crate::PageMetadata;
use crate::fs::write_atomic;
use crate::render::escape_html;
use crate::{BuildError, BuildReport};

/// Default `robots.txt` body when the config enables robots without content.
pub(crate) const DEFAULT_ROBOTS: &str = "User-agent: *\nAllow: /";

/// Page being rendered, as seen by hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageContext {
    /// Source path relative to the pages directory.
    pub source: PathBuf,
    /// URL path of the rendered page (e.g. `/blog/post.html`).
    pub url_path: String,
    /// Page title.
    pub title: String,
    /// Front matter of the page (defaults when it has none).
    pub metadata: PageMetadata,
}

/// Observer and transformer of builds.
///
/// Hooks run in registration order. Every method has a no-op default, so a
/// hook only overrides what it cares about.
///
/// # Example
///
/// ```
/// use turbines_site::{BuildHook, PageContext};
///
/// struct Banner;
///
/// impl BuildHook for Banner {
///     fn name(&self) -> &'static str { "banner" }
///
///     fn after_page_render(&mut self, _page: &PageContext, html: String) -> String {
///         html.replacen("<body>", "<body><div class=\"banner\">draft</div>", 1)
///     }
/// }
/// ```
pub trait BuildHook: Send {
    /// Hook name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Called before anything is written. An error aborts the build.
    fn before_build(&mut self, _site: &SiteConfig, _incremental: bool) -> Result<(), BuildError> {
        Ok(())
    }

    /// Transform the page source before it is rendered.
    fn before_page_render(&mut self, _page: &PageContext, source: String) -> String {
        source
    }

    /// Transform the rendered HTML before it is written.
    fn after_page_render(&mut self, _page: &PageContext, html: String) -> String {
        html
    }

    /// Called once the output tree is complete.
    fn after_build(&mut self, _site: &SiteConfig, _report: &BuildReport) -> Result<(), BuildError> {
        Ok(())
    }

    /// Called when the build failed, with the error about to be returned.
    fn on_build_error(&mut self, _error: &BuildError) {}
}

/// Writes `sitemap.xml` and `robots.txt` from the pages of a full build.
///
/// Pages marked `noindex` are left out. Asset-only builds leave both files
/// untouched.
#[derive(Debug)]
pub struct SitemapHook {
    base_url: String,
    sitemap: bool,
    use_index: bool,
    robots: Option<String>,
    collecting: bool,
    urls: Vec<String>,
}

impl SitemapHook {
    /// Create a hook writing a sitemap for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            sitemap: true,
            use_index: false,
            robots: None,
            collecting: false,
            urls: Vec::new(),
        }
    }

    /// Enable or disable `sitemap.xml`.
    #[must_use]
    pub fn with_sitemap(mut self, enabled: bool) -> Self {
        self.sitemap = enabled;
        self
    }

    /// Keep `index.html` in listed URLs instead of collapsing `dir/index.html`
    /// to `dir/`.
    #[must_use]
    pub fn with_use_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }

    /// Write `robots.txt` with the given body.
    #[must_use]
    pub fn with_robots(mut self, content: Option<String>) -> Self {
        self.robots = content;
        self
    }

    fn location(&self, url_path: &str) -> String {
        let path = if self.use_index {
            url_path
        } else {
            url_path.strip_suffix("index.html").unwrap_or(url_path)
        };
        format!("{}{path}", self.base_url)
    }

    fn render_sitemap(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for url in &self.urls {
            xml.push_str("  <url><loc>");
            xml.push_str(&escape_html(&self.location(url)));
            xml.push_str("</loc></url>\n");
        }
        xml.push_str("</urlset>\n");
        xml
    }

    fn render_robots(&self, content: &str) -> String {
        let mut body = content.trim_end().to_owned();
        if self.sitemap {
            body.push_str(&format!("\n\nSitemap: {}/sitemap.xml", self.base_url));
        }
        body.push('\n');
        body
    }
}

impl BuildHook for SitemapHook {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    fn before_build(&mut self, _site: &SiteConfig, incremental: bool) -> Result<(), BuildError> {
        self.urls.clear();
        self.collecting = !incremental;
        Ok(())
    }

    fn after_page_render(&mut self, page: &PageContext, html: String) -> String {
        if self.collecting && !page.metadata.noindex {
            self.urls.push(page.url_path.clone());
        }
        html
    }

    fn after_build(&mut self, site: &SiteConfig, report: &BuildReport) -> Result<(), BuildError> {
        if report.incremental {
            return Ok(());
        }

        if self.sitemap {
            self.urls.sort();
            write_atomic(
                &site.output_dir.join("sitemap.xml"),
                self.render_sitemap().as_bytes(),
            )?;
        }
        if let Some(content) = &self.robots {
            write_atomic(
                &site.output_dir.join("robots.txt"),
                self.render_robots(content).as_bytes(),
            )?;
        }

        tracing::debug!(urls = self.urls.len(), "Wrote sitemap");
        Ok(())
    }

    fn on_build_error(&mut self, _error: &BuildError) {
        self.urls.clear();
        self.collecting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn site(out: &std::path::Path) -> SiteConfig {
        SiteConfig {
            output_dir: out.to_path_buf(),
            ..SiteConfig::default()
        }
    }

    fn page(url_path: &str) -> PageContext {
        PageContext {
            source: PathBuf::from("x.md"),
            url_path: url_path.to_owned(),
            title: "X".to_owned(),
            metadata: PageMetadata::default(),
        }
    }

    fn report(incremental: bool) -> BuildReport {
        BuildReport {
            incremental,
            pages_rendered: 0,
            assets_copied: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_default_methods_pass_through() {
        struct Noop;
        impl BuildHook for Noop {
            fn name(&self) -> &'static str {
                "noop"
            }
        }

        let mut hook = Noop;
        let ctx = page("/a.html");

        assert_eq!(hook.before_page_render(&ctx, "src".to_owned()), "src");
        assert_eq!(hook.after_page_render(&ctx, "html".to_owned()), "html");
    }

    #[test]
    fn test_sitemap_written_after_full_build() {
        let tmp = TempDir::new().unwrap();
        let site = site(tmp.path());
        let mut hook = SitemapHook::new("https://example.com/");

        hook.before_build(&site, false).unwrap();
        hook.after_page_render(&page("/index.html"), String::new());
        hook.after_page_render(&page("/blog/a&b.html"), String::new());
        hook.after_build(&site, &report(false)).unwrap();

        let xml = std::fs::read_to_string(tmp.path().join("sitemap.xml")).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n  \
             <url><loc>https://example.com/blog/a&amp;b.html</loc></url>\n  \
             <url><loc>https://example.com/</loc></url>\n\
             </urlset>\n"
        );
    }

    #[test]
    fn test_noindex_page_left_out_of_sitemap() {
        let tmp = TempDir::new().unwrap();
        let site = site(tmp.path());
        let mut hook = SitemapHook::new("https://example.com");
        let hidden = PageContext {
            metadata: PageMetadata {
                noindex: true,
                ..PageMetadata::default()
            },
            ..page("/drafts/wip.html")
        };

        hook.before_build(&site, false).unwrap();
        hook.after_page_render(&page("/about.html"), String::new());
        hook.after_page_render(&hidden, String::new());
        hook.after_build(&site, &report(false)).unwrap();

        let xml = std::fs::read_to_string(tmp.path().join("sitemap.xml")).unwrap();
        assert!(xml.contains("https://example.com/about.html"));
        assert!(!xml.contains("wip"));
    }

    #[test]
    fn test_sitemap_collapses_index_by_default() {
        let hook = SitemapHook::new("https://example.com");
        assert_eq!(hook.location("/index.html"), "https://example.com/");
        assert_eq!(hook.location("/docs/index.html"), "https://example.com/docs/");
        assert_eq!(hook.location("/docs/a.html"), "https://example.com/docs/a.html");
    }

    #[test]
    fn test_sitemap_use_index_keeps_file_name() {
        let hook = SitemapHook::new("https://example.com").with_use_index(true);
        assert_eq!(hook.location("/docs/index.html"), "https://example.com/docs/index.html");
    }

    #[test]
    fn test_incremental_build_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let site = site(tmp.path());
        let mut hook = SitemapHook::new("https://example.com");

        hook.before_build(&site, true).unwrap();
        hook.after_build(&site, &report(true)).unwrap();

        assert!(!tmp.path().join("sitemap.xml").exists());
    }

    #[test]
    fn test_robots_references_sitemap() {
        let tmp = TempDir::new().unwrap();
        let site = site(tmp.path());
        let mut hook =
            SitemapHook::new("https://example.com").with_robots(Some(DEFAULT_ROBOTS.to_owned()));

        hook.before_build(&site, false).unwrap();
        hook.after_build(&site, &report(false)).unwrap();

        let robots = std::fs::read_to_string(tmp.path().join("robots.txt")).unwrap();
        assert_eq!(
            robots,
            "User-agent: *\nAllow: /\n\nSitemap: https://example.com/sitemap.xml\n"
        );
    }

    #[test]
    fn test_robots_without_sitemap() {
        let tmp = TempDir::new().unwrap();
        let site = site(tmp.path());
        let mut hook = SitemapHook::new("https://example.com")
            .with_sitemap(false)
            .with_robots(Some("User-agent: *\nDisallow: /\n".to_owned()));

        hook.before_build(&site, false).unwrap();
        hook.after_build(&site, &report(false)).unwrap();

        assert!(!tmp.path().join("sitemap.xml").exists());
        let robots = std::fs::read_to_string(tmp.path().join("robots.txt")).unwrap();
        assert_eq!(robots, "User-agent: *\nDisallow: /\n");
    }

    #[test]
    fn test_failed_build_resets_collected_urls() {
        let tmp = TempDir::new().unwrap();
        let site = site(tmp.path());
        let mut hook = SitemapHook::new("https://example.com");

        hook.before_build(&site, false).unwrap();
        hook.after_page_render(&page("/a.html"), String::new());
        hook.on_build_error(&BuildError::NotLoaded);

        assert!(hook.urls.is_empty());
    }
}
