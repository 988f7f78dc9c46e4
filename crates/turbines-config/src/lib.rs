//! Configuration for Turbines projects.
//!
//! A project is configured by a `turbines.toml` at its root. When no path is
//! given, the file is looked up in the working directory and then in each
//! parent. Directories in `[site]` are relative to the file's directory, and
//! a project without any config file is rooted at the working directory.
//!
//! Command-line overrides arrive as [`CliSettings`] and win over file values.
//!
//! ## Environment Variable Expansion
//!
//! `server.host` and `site.url` accept `${VAR}` (error when unset) and
//! `${VAR:-fallback}`.

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "turbines.toml";

const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Values from the command line that replace configured ones.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Listen host.
    pub host: Option<String>,
    /// Listen port.
    pub port: Option<u16>,
    /// Watch and live reload toggle.
    pub live_reload_enabled: Option<bool>,
}

/// Project configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[server]` table.
    pub server: ServerConfig,
    /// `[site]` table as written, before path resolution.
    site: SiteConfigRaw,
    /// `[live_reload]` table.
    pub live_reload: LiveReloadConfig,
    /// `[sitemap]` table.
    pub sitemap: SitemapConfig,
    /// `[robots]` table.
    pub robots: RobotsConfig,

    /// Site layout with absolute paths.
    #[serde(skip)]
    pub site_resolved: SiteConfig,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Listen address of the dev server.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SiteConfigRaw {
    pages_dir: Option<String>,
    templates_dir: Option<String>,
    static_dir: Option<String>,
    output_dir: Option<String>,
    url: Option<String>,
}

/// Resolved site layout with absolute paths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SiteConfig {
    /// Project root (directory containing `turbines.toml`).
    pub project_dir: PathBuf,
    /// Page sources (`.md`, `.html`).
    pub pages_dir: PathBuf,
    /// Layout templates.
    pub templates_dir: PathBuf,
    /// Static assets copied verbatim to `<output>/static`.
    pub static_dir: PathBuf,
    /// Generated output served by the dev server.
    pub output_dir: PathBuf,
    /// Public base URL of the site.
    pub url: String,
}

impl SiteConfig {
    fn resolve(base: &Path, raw: &SiteConfigRaw) -> Self {
        let dir = |value: &Option<String>, fallback: &str| {
            base.join(value.as_deref().unwrap_or(fallback))
        };

        Self {
            project_dir: base.to_path_buf(),
            pages_dir: dir(&raw.pages_dir, "pages"),
            templates_dir: dir(&raw.templates_dir, "templates"),
            static_dir: dir(&raw.static_dir, "static"),
            output_dir: dir(&raw.output_dir, ".site"),
            url: raw
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:8000".to_owned()),
        }
    }
}

/// File watching and browser reload.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Watch the project and inject the reload client.
    pub enabled: bool,
    /// Quiet period before a burst of changes triggers a rebuild.
    pub debounce_ms: u64,
    /// Extra glob patterns (relative to the project root) to ignore.
    pub ignore_patterns: Vec<String>,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 300,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Sitemap configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    /// Write `sitemap.xml` after every full build.
    pub enabled: bool,
    /// Keep `/index.html` in URLs instead of collapsing to `/`.
    pub use_index: bool,
}

/// `robots.txt` configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    /// Write `robots.txt` after every full build.
    pub enabled: bool,
    /// Rules written before the `Sitemap:` line.
    pub content: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Config file {} does not exist", .0.display())]
    NotFound(PathBuf),
    /// The file or working directory could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("Invalid turbines.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range or inconsistent with another.
    #[error("Invalid configuration: {0}")]
    Validation(String),
    /// `${VAR}` expansion failed.
    #[error("Cannot expand {field}: {message}")]
    EnvVar {
        /// Dotted field name, e.g. `site.url`.
        field: String,
        /// What went wrong.
        message: String,
    },
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

/// Nearest `turbines.toml` in `start` or one of its ancestors.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
}

impl Config {
    /// Load the project configuration and apply `cli_settings` on top.
    ///
    /// `config_path` names the file explicitly. Without it the nearest
    /// `turbines.toml` from the working directory upwards is used, or
    /// defaults rooted at the working directory when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, a file cannot be read
    /// or parsed, or its values are invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Self::from_file(path)?,
            None => {
                let cwd = std::env::current_dir()?;
                match find_config_file(&cwd) {
                    Some(found) => Self::from_file(&found)?,
                    None => Self::default_with_base(&cwd),
                }
            }
        };

        if let Some(settings) = cli_settings {
            config.apply_overrides(settings);
        }
        Ok(config)
    }

    /// Defaults with the project rooted at `base`.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        let site = SiteConfigRaw::default();
        Self {
            server: ServerConfig::default(),
            site_resolved: SiteConfig::resolve(base, &site),
            site,
            live_reload: LiveReloadConfig::default(),
            sitemap: SitemapConfig::default(),
            robots: RobotsConfig::default(),
            config_path: None,
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(&std::fs::read_to_string(path)?)?;
        config.expand_env_vars()?;

        let base = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => std::env::current_dir()?,
        };
        config.site_resolved = SiteConfig::resolve(&base, &config.site);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = enabled;
        }
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        if let Some(url) = &self.site.url {
            self.site.url = Some(expand::expand_env(url, "site.url")?);
        }
        Ok(())
    }

    /// Check value ranges and cross-field consistency.
    ///
    /// Runs on every file load. Command-line overrides are not checked, so a
    /// port of `0` from the command line binds a free port.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(invalid("server.host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port cannot be 0"));
        }

        let debounce = self.live_reload.debounce_ms;
        if !(1..=MAX_DEBOUNCE_MS).contains(&debounce) {
            return Err(invalid(format!(
                "live_reload.debounce_ms must be between 1 and {MAX_DEBOUNCE_MS}, got {debounce}"
            )));
        }
        if let Some((pattern, e)) = self
            .live_reload
            .ignore_patterns
            .iter()
            .find_map(|p| glob::Pattern::new(p).err().map(|e| (p, e)))
        {
            return Err(invalid(format!(
                "live_reload.ignore_patterns: {pattern:?} is not a valid glob: {e}"
            )));
        }

        let site = &self.site_resolved;
        // The watcher skips the output tree, so it must not cover the sources
        if site.output_dir == site.project_dir {
            return Err(invalid("site.output_dir cannot be the project directory"));
        }
        if site.output_dir == site.pages_dir {
            return Err(invalid("site.output_dir cannot be the same as site.pages_dir"));
        }

        let publishes_urls = self.sitemap.enabled || self.robots.enabled;
        if publishes_urls && !(site.url.starts_with("http://") || site.url.starts_with("https://"))
        {
            return Err(invalid(format!(
                "site.url must be an http(s) URL when sitemap or robots is enabled, got {:?}",
                site.url
            )));
        }

        Ok(())
    }
}
