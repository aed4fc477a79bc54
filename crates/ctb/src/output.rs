//! Colored terminal output utilities.

use std::fmt::Display;
use std::path::Path;

use console::{Style, Term};
use ctb_markdown::Document;

/// Terminal output formatter writing to stderr.
pub(crate) struct Output {
    term: Term,
    green: Style,
    red: Style,
    node: Style,
    field: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green().for_stderr(),
            red: Style::new().red().for_stderr(),
            node: Style::new().cyan().bold().for_stderr(),
            field: Style::new().dim().for_stderr(),
        }
    }

    /// Print the document tree, node headers highlighted and fields dimmed.
    pub(crate) fn tree(&self, doc: &Document<'_>) {
        let _ = self.term.write_str(&self.format_tree(&doc.dump()));
    }

    /// Report a written destination (green).
    pub(crate) fn wrote(&self, path: &Path, bytes: u64) {
        let msg = format!("Wrote {} ({bytes} bytes)", path.display());
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, err: &dyn Display) {
        let msg = format!("Error: {err}");
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    fn format_tree(&self, dump: &str) -> String {
        let mut out = String::with_capacity(dump.len());
        for line in dump.lines() {
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];
            let style = if body.ends_with('{') || body == "}" {
                &self.node
            } else {
                &self.field
            };
            out.push_str(indent);
            out.push_str(&style.apply_to(body).to_string());
            out.push('\n');
        }
        out
    }
}
