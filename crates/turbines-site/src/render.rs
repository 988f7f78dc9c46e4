//! Page rendering: markdown conversion, titles and the page layout.

use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};

use crate::BuildError;

const TITLE_PLACEHOLDER: &str = "{{ title }}";
const CONTENT_PLACEHOLDER: &str = "{{ content }}";

/// Layout used when the project has no `templates/page.html`.
const BUILTIN_LAYOUT: &str = "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{{ title }}</title>\n\
<link rel=\"stylesheet\" href=\"/static/style.css\">\n\
</head>\n\
<body>\n\
<main>\n\
{{ content }}\n\
</main>\n\
</body>\n\
</html>\n";

/// Convert markdown to an HTML fragment.
pub(crate) fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(markdown, options);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Page title: first level-one heading, else derived from the file name.
pub(crate) fn page_title(markdown: &str, source: &Path) -> String {
    first_h1(markdown)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| title_from_filename(source))
}

/// Plain text of the first level-one heading. Code blocks are skipped.
fn first_h1(markdown: &str) -> Option<String> {
    let mut in_heading = false;
    let mut title = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_heading = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_heading => {
                return Some(title.trim().to_owned());
            }
            Event::Text(text) | Event::Code(text) if in_heading => title.push_str(&text),
            _ => {}
        }
    }
    None
}

/// `getting-started.md` → `Getting Started`.
pub(crate) fn title_from_filename(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Page layout with `{{ title }}` and `{{ content }}` placeholders.
///
/// Substitution is literal; there is no template language.
#[derive(Debug)]
pub(crate) struct Layout {
    source: String,
}

impl Layout {
    /// Read `page.html` from `templates_dir`, or fall back to the built-in layout.
    pub(crate) fn load(templates_dir: &Path) -> Result<Self, BuildError> {
        let path: PathBuf = templates_dir.join("page.html");
        match std::fs::read_to_string(&path) {
            Ok(source) => Self::parse(path, source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::builtin()),
            Err(e) => Err(BuildError::io(path, e)),
        }
    }

    /// Read a layout a page asked for by name. It must exist.
    pub(crate) fn load_named(templates_dir: &Path, file: &Path) -> Result<Self, BuildError> {
        let path = templates_dir.join(file);
        let source = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        Self::parse(path, source)
    }

    fn parse(path: PathBuf, source: String) -> Result<Self, BuildError> {
        if !source.contains(CONTENT_PLACEHOLDER) {
            return Err(BuildError::Layout(path));
        }
        Ok(Self { source })
    }

    pub(crate) fn builtin() -> Self {
        Self {
            source: BUILTIN_LAYOUT.to_owned(),
        }
    }

    /// Fill the layout. The title is escaped; the content is inserted as-is.
    pub(crate) fn render(&self, title: &str, content: &str) -> String {
        // Content last so placeholders written inside the page body survive
        self.source
            .replace(TITLE_PLACEHOLDER, &escape_html(title))
            .replacen(CONTENT_PLACEHOLDER, content, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_markdown_to_html_basic() {
        let html = markdown_to_html("# Hello\n\nSome *text*.");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_markdown_to_html_tables() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_page_title_from_heading() {
        let title = page_title("intro\n\n# Example Page\n\nbody", Path::new("x.md"));
        assert_eq!(title, "Example Page");
    }

    #[test]
    fn test_page_title_closing_hashes_stripped() {
        let title = page_title("# Closed #\n", Path::new("x.md"));
        assert_eq!(title, "Closed");
    }

    #[test]
    fn test_page_title_skips_code_block_comments() {
        let markdown = "```sh\n# install first\nmake\n```\n\n# Setup Guide\n";
        assert_eq!(page_title(markdown, Path::new("x.md")), "Setup Guide");
    }

    #[test]
    fn test_page_title_keeps_inline_code() {
        let title = page_title("# The `serve` command", Path::new("x.md"));
        assert_eq!(title, "The serve command");
    }

    #[test]
    fn test_page_title_from_filename() {
        let title = page_title("no heading", Path::new("blog/getting-started.md"));
        assert_eq!(title, "Getting Started");
    }

    #[test]
    fn test_h2_is_not_a_title() {
        let title = page_title("## Section", Path::new("notes_page.md"));
        assert_eq!(title, "Notes Page");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_builtin_layout_render() {
        let page = Layout::builtin().render("A & B", "<p>body</p>");
        assert!(page.contains("<title>A &amp; B</title>"));
        assert!(page.contains("<p>body</p>"));
        assert!(page.contains("</body>"));
    }

    #[test]
    fn test_layout_load_custom() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("page.html"),
            "<h1>{{ title }}</h1><div>{{ content }}</div>",
        )
        .unwrap();

        let layout = Layout::load(tmp.path()).unwrap();

        assert_eq!(
            layout.render("T", "<p>c</p>"),
            "<h1>T</h1><div><p>c</p></div>"
        );
    }

    #[test]
    fn test_layout_load_named() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("post.html"), "<article>{{ content }}</article>").unwrap();

        let layout = Layout::load_named(tmp.path(), Path::new("post.html")).unwrap();

        assert_eq!(layout.render("T", "c"), "<article>c</article>");
    }

    #[test]
    fn test_layout_load_named_missing_is_error() {
        let tmp = TempDir::new().unwrap();

        let err = Layout::load_named(tmp.path(), Path::new("post.html")).unwrap_err();

        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn test_layout_load_missing_uses_builtin() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::load(tmp.path()).unwrap();
        assert!(layout.render("T", "c").starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_layout_without_content_placeholder_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("page.html"), "<h1>{{ title }}</h1>").unwrap();

        let err = Layout::load(tmp.path()).unwrap_err();

        assert!(matches!(err, BuildError::Layout(_)));
    }

    #[test]
    fn test_layout_content_placeholder_in_page_survives() {
        let page = Layout::builtin().render("T", "<code>{{ content }}</code>");
        assert!(page.contains("<code>{{ content }}</code>"));
    }
}
