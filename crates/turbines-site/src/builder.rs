//! Filesystem site builder.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use turbines_config::{Config, SiteConfig};

use crate::fs::{copy_tree, list_files, write_atomic};
use crate::hooks::{BuildHook, DEFAULT_ROBOTS, PageContext, SitemapHook};
use crate::metadata::split_front_matter;
use crate::render::{Layout, markdown_to_html, page_title, title_from_filename};
use crate::{BuildError, BuildReport, PageMetadata, SiteBuilder};

/// How a page source is turned into HTML.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PageKind {
    Markdown,
    Html,
}

impl PageKind {
    fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

/// Builds a site from `pages/`, `templates/` and `static/` into the output
/// directory.
///
/// Static assets land in `<output>/static/`. Pages keep their directory
/// structure with an `.html` extension.
pub struct FsSiteBuilder {
    site: SiteConfig,
    hooks: Vec<Box<dyn BuildHook>>,
    loaded: bool,
}

impl FsSiteBuilder {
    /// Create a builder without hooks.
    #[must_use]
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            hooks: Vec::new(),
            loaded: false,
        }
    }

    /// Create a builder from loaded configuration.
    ///
    /// Registers a [`SitemapHook`] when sitemap or robots generation is on.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let builder = Self::new(config.site_resolved.clone());
        if !config.sitemap.enabled && !config.robots.enabled {
            return builder;
        }

        let robots = config.robots.enabled.then(|| {
            config
                .robots
                .content
                .clone()
                .unwrap_or_else(|| DEFAULT_ROBOTS.to_owned())
        });
        let hook = SitemapHook::new(config.site_resolved.url.as_str())
            .with_sitemap(config.sitemap.enabled)
            .with_use_index(config.sitemap.use_index)
            .with_robots(robots);
        builder.with_hook(Box::new(hook))
    }

    /// Append a hook. Hooks run in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn BuildHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Resolved site layout.
    #[must_use]
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn run(&mut self, incremental: bool, started: Instant) -> Result<BuildReport, BuildError> {
        for hook in &mut self.hooks {
            hook.before_build(&self.site, incremental)
                .inspect_err(|e| {
                    tracing::debug!(hook = hook.name(), error = %e, "Hook refused build");
                })?;
        }

        let assets_copied = copy_tree(&self.site.static_dir, &self.site.output_dir.join("static"))?;
        let pages_rendered = if incremental {
            0
        } else {
            self.render_pages()?
        };

        let report = BuildReport {
            incremental,
            pages_rendered,
            assets_copied,
            elapsed: started.elapsed(),
        };

        for hook in &mut self.hooks {
            hook.after_build(&self.site, &report)
                .inspect_err(|e| {
                    tracing::debug!(hook = hook.name(), error = %e, "Hook failed after build");
                })?;
        }

        Ok(report)
    }

    fn render_pages(&mut self) -> Result<usize, BuildError> {
        // Layouts are re-read on every full build
        let layout = Layout::load(&self.site.templates_dir)?;
        let mut named_layouts: HashMap<PathBuf, Layout> = HashMap::new();
        let mut rendered = 0;

        for rel in list_files(&self.site.pages_dir, true)? {
            let Some(kind) = PageKind::detect(&rel) else {
                tracing::debug!(path = %rel.display(), "Skipping non-page file");
                continue;
            };

            let source_path = self.site.pages_dir.join(&rel);
            let bytes = std::fs::read(&source_path).map_err(|e| BuildError::io(&source_path, e))?;
            let source =
                String::from_utf8(bytes).map_err(|_| BuildError::Encoding(source_path.clone()))?;
            let (metadata, body) = match kind {
                PageKind::Markdown => read_front_matter(&source_path, &source)?,
                PageKind::Html => (PageMetadata::default(), source.as_str()),
            };

            let page_layout = match metadata.template_file() {
                None => &layout,
                Some(Err(name)) => {
                    return Err(BuildError::Template {
                        path: source_path,
                        name,
                    });
                }
                Some(Ok(file)) => match named_layouts.entry(file) {
                    Entry::Occupied(entry) => &*entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let named = Layout::load_named(&self.site.templates_dir, entry.key())?;
                        &*entry.insert(named)
                    }
                },
            };

            let target = output_path(&rel);
            let page = PageContext {
                title: match kind {
                    PageKind::Markdown => metadata
                        .title
                        .clone()
                        .unwrap_or_else(|| page_title(body, &rel)),
                    PageKind::Html => title_from_filename(&rel),
                },
                url_path: url_path(&target),
                source: rel,
                metadata,
            };

            let html = self.render_page(page_layout, kind, &page, body.to_owned());
            write_atomic(&self.site.output_dir.join(&target), html.as_bytes())?;
            tracing::debug!(path = %page.url_path, "Rendered page");
            rendered += 1;
        }

        Ok(rendered)
    }

    fn render_page(
        &mut self,
        layout: &Layout,
        kind: PageKind,
        page: &PageContext,
        source: String,
    ) -> String {
        let source = self
            .hooks
            .iter_mut()
            .fold(source, |acc, hook| hook.before_page_render(page, acc));

        let html = match kind {
            PageKind::Markdown => layout.render(&page.title, &markdown_to_html(&source)),
            PageKind::Html => source,
        };

        self.hooks
            .iter_mut()
            .fold(html, |acc, hook| hook.after_page_render(page, acc))
    }
}

impl SiteBuilder for FsSiteBuilder {
    fn load(&mut self) -> Result<(), BuildError> {
        std::fs::create_dir_all(&self.site.output_dir)
            .map_err(|e| BuildError::io(&self.site.output_dir, e))?;
        self.loaded = true;
        tracing::debug!(
            pages = %self.site.pages_dir.display(),
            output = %self.site.output_dir.display(),
            "Site builder loaded"
        );
        Ok(())
    }

    fn build_site(&mut self, incremental: bool) -> Result<BuildReport, BuildError> {
        if !self.loaded {
            return Err(BuildError::NotLoaded);
        }

        let started = Instant::now();
        match self.run(incremental, started) {
            Ok(report) => {
                tracing::debug!(
                    incremental,
                    pages = report.pages_rendered,
                    assets = report.assets_copied,
                    elapsed_ms = report.elapsed.as_millis(),
                    "Site built"
                );
                Ok(report)
            }
            Err(e) => {
                for hook in &mut self.hooks {
                    hook.on_build_error(&e);
                }
                Err(e)
            }
        }
    }

    fn build_path(&self) -> &Path {
        &self.site.project_dir
    }

    fn output_dir(&self) -> &Path {
        &self.site.output_dir
    }

    fn static_dir(&self) -> &Path {
        &self.site.static_dir
    }
}

/// Split off and parse a markdown page's front matter.
fn read_front_matter<'a>(
    path: &Path,
    source: &'a str,
) -> Result<(PageMetadata, &'a str), BuildError> {
    let (front_matter, body) = split_front_matter(source);
    let metadata = match front_matter {
        Some(yaml) => PageMetadata::from_yaml(yaml).map_err(|e| BuildError::Metadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?,
        None => PageMetadata::default(),
    };
    Ok((metadata, body))
}

/// `blog/post.html` → `/blog/post.html`, with `/` separators on every platform.
fn url_path(target: &Path) -> String {
    let mut url = String::new();
    for component in target.components() {
        if let Component::Normal(part) = component {
            url.push('/');
            url.push_str(&part.to_string_lossy());
        }
    }
    url
}

/// Output path of a page source relative to the output directory.
fn output_path(source: &Path) -> PathBuf {
    source.with_extension("html")
}
