//! Page metadata from YAML front matter.
//!
//! A markdown page may start with a block delimited by `---` lines:
//!
//! ```text
//! ---
//! title: Release notes
//! template: post
//! noindex: true
//! ---
//! # 1.0
//! ```
//!
//! Unknown keys are ignored. A page without a closed block has no metadata and
//! its whole source is the body.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

const DELIMITER: &str = "---";

/// Per-page settings read from front matter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PageMetadata {
    /// Page title (overrides the first heading).
    #[serde(default)]
    pub title: Option<String>,

    /// Layout in `templates/` used instead of `page.html`.
    #[serde(default)]
    pub template: Option<String>,

    /// Leave the page out of `sitemap.xml`.
    #[serde(default)]
    pub noindex: bool,
}

impl PageMetadata {
    /// Parse metadata from YAML. Empty content yields the defaults.
    pub(crate) fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(trimmed)
    }

    /// Template file relative to the templates directory.
    ///
    /// `post` and `post.html` both name `post.html`. Returns `None` when no
    /// template is set, and the name as an error when it is empty or leaves the
    /// templates directory.
    pub(crate) fn template_file(&self) -> Option<Result<PathBuf, String>> {
        let name = self.template.as_deref()?;
        let path = Path::new(name);
        let inside = !name.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !inside {
            return Some(Err(name.to_owned()));
        }

        Some(Ok(if path.extension().is_some() {
            path.to_path_buf()
        } else {
            path.with_extension("html")
        }))
    }
}

/// Split a page into its front matter and body.
///
/// Returns `None` as front matter when the page does not open with a closed
/// `---` block.
pub(crate) fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let Some(rest) = source.strip_prefix(DELIMITER) else {
        return (None, source);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn with_template(name: &str) -> PageMetadata {
        PageMetadata {
            template: Some(name.to_owned()),
            ..PageMetadata::default()
        }
    }

    #[test]
    fn test_split_front_matter() {
        let (meta, body) = split_front_matter("---\ntitle: Hi\n---\n# Body\n");
        assert_eq!(meta, Some("title: Hi\n"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_split_front_matter_crlf() {
        let (meta, body) = split_front_matter("---\r\nnoindex: true\r\n---\r\nbody");
        assert_eq!(meta, Some("noindex: true\r\n"));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_without_front_matter() {
        assert_eq!(split_front_matter("# Title\n"), (None, "# Title\n"));
        assert_eq!(split_front_matter("---- rule\n"), (None, "---- rule\n"));
    }

    #[test]
    fn test_unclosed_front_matter_is_body() {
        let source = "---\ntitle: Hi\n\n# Body";
        assert_eq!(split_front_matter(source), (None, source));
    }

    #[test]
    fn test_empty_front_matter() {
        let (meta, body) = split_front_matter("---\n---\nbody");
        assert_eq!(meta, Some(""));
        assert_eq!(body, "body");
        assert_eq!(PageMetadata::from_yaml("").unwrap(), PageMetadata::default());
    }

    #[test]
    fn test_from_yaml_fields() {
        let meta =
            PageMetadata::from_yaml("title: \"Notes: 2024\"\ntemplate: post\nnoindex: true\nauthor: me")
                .unwrap();

        assert_eq!(meta.title.as_deref(), Some("Notes: 2024"));
        assert_eq!(meta.template.as_deref(), Some("post"));
        assert!(meta.noindex);
    }

    #[test]
    fn test_from_yaml_invalid() {
        assert!(PageMetadata::from_yaml("title: [unclosed").is_err());
        assert!(PageMetadata::from_yaml("noindex: maybe").is_err());
    }

    #[test]
    fn test_template_file() {
        assert_eq!(PageMetadata::default().template_file(), None);
        assert_eq!(
            with_template("post").template_file(),
            Some(Ok(PathBuf::from("post.html")))
        );
        assert_eq!(
            with_template("blog/post.htm").template_file(),
            Some(Ok(PathBuf::from("blog/post.htm")))
        );
    }

    #[test]
    fn test_template_file_outside_templates_dir() {
        for name in ["", "../secret", "/etc/passwd", "a/../../b"] {
            assert_eq!(
                with_template(name).template_file(),
                Some(Err(name.to_owned())),
                "{name}"
            );
        }
    }
}
