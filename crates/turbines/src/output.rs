//! Styled stderr output for CLI commands.

use std::fmt::Display;
use std::path::Path;

use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    label: Style,
    green: Style,
    yellow: Style,
    red: Style,
    link: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            label: Style::new().dim(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            link: Style::new().cyan().bold(),
        }
    }

    fn line(&self, line: &str) {
        let _ = self.term.write_line(line);
    }

    /// Print an aligned `label  value` line.
    pub(crate) fn field(&self, label: &str, value: impl Display) {
        self.line(&format!("{:>12}  {value}", self.label.apply_to(label)));
    }

    /// Print a file the command wrote.
    pub(crate) fn created(&self, path: &Path) {
        self.field("created", path.display());
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        self.line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        self.line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        self.line(&self.red.apply_to(msg).to_string());
    }

    /// Print something the user will open or run next (cyan bold).
    pub(crate) fn link(&self, label: &str, target: impl Display) {
        self.field(label, self.link.apply_to(target));
    }
}
