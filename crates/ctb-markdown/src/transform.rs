//! Tree transforms applied before HTML rendering.
//!
//! Each transform takes a document and returns a new, decorated one. The
//! input tree is never modified.

use std::collections::HashMap;

use crate::ast::{Document, Node, NodeValue};
use crate::util::{is_external_url, slugify};

/// Give every heading without an explicit `id` an anchor derived from its
/// text. Repeated anchors get `-1`, `-2`, ... suffixes.
#[must_use]
pub fn assign_heading_ids<'src>(doc: &Document<'src>) -> Document<'src> {
    let mut root = doc.root().clone();
    let mut ids = HeadingIds::default();

    // Explicit ids are claimed first so generated ones never collide.
    visit_headings(&root, &mut |node| {
        if let Some(id) = node.attributes.get("id") {
            ids.claim(id);
        }
    });
    assign_ids(&mut root, &mut ids);

    Document::new(doc.source(), root)
}

/// Mark links to external web pages with `rel="noreferrer"` and
/// `target="_blank"`.
///
/// Applies to links and URL autolinks whose destination starts with
/// `http://` or `https://`. Email autolinks and relative links are left alone.
#[must_use]
pub fn secure_links<'src>(doc: &Document<'src>) -> Document<'src> {
    let mut root = doc.root().clone();
    let count = mark_links(&mut root);
    tracing::debug!(links = count, "Marked external links");
    Document::new(doc.source(), root)
}

#[derive(Default)]
struct HeadingIds {
    counts: HashMap<String, usize>,
}

impl HeadingIds {
    fn claim(&mut self, id: &str) {
        *self.counts.entry(id.to_owned()).or_default() += 1;
    }

    fn generate(&mut self, text: &str) -> String {
        let base = slugify(text);
        let base = if base.is_empty() {
            "section".to_owned()
        } else {
            base
        };
        let mut id = base.clone();
        loop {
            let count = self.counts.entry(id.clone()).or_default();
            if *count == 0 {
                *count = 1;
                return id;
            }
            let n = *count;
            *count += 1;
            id = format!("{base}-{n}");
        }
    }
}

fn visit_headings(node: &Node, f: &mut impl FnMut(&Node)) {
    if matches!(node.value, NodeValue::Heading { .. }) {
        f(node);
    }
    for child in &node.children {
        visit_headings(child, f);
    }
}

fn assign_ids(node: &mut Node, ids: &mut HeadingIds) {
    if matches!(node.value, NodeValue::Heading { .. }) && !node.attributes.contains("id") {
        let id = ids.generate(&node.plain_text());
        node.attributes.set("id", id);
    }
    for child in &mut node.children {
        assign_ids(child, ids);
    }
}

fn mark_links(node: &mut Node) -> usize {
    let external = match &node.value {
        NodeValue::Link(link) => Some(is_external_url(&link.destination)),
        NodeValue::AutoLink { url, email } => Some(!email && is_external_url(url)),
        _ => None,
    };
    match external {
        Some(true) => {
            node.attributes.set("rel", "noreferrer");
            node.attributes.set("target", "_blank");
            1
        }
        // Links do not nest.
        Some(false) => 0,
        None => node.children.iter_mut().map(mark_links).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ParseOptions, parse};

    fn heading_ids(doc: &Document<'_>) -> Vec<String> {
        let mut ids = Vec::new();
        visit_headings(doc.root(), &mut |node| {
            ids.push(node.attributes.get("id").unwrap_or_default().to_owned());
        });
        ids
    }

    #[test]
    fn test_heading_ids_deduplicated() {
        let doc = parse("# Intro\n\n## Intro\n\n# Intro\n", &ParseOptions::html());
        let doc = assign_heading_ids(&doc);
        assert_eq!(heading_ids(&doc), ["intro", "intro-1", "intro-2"]);
    }

    #[test]
    fn test_explicit_heading_id_kept() {
        let doc = parse("# Intro {#intro}\n\n# Intro\n", &ParseOptions::html());
        let doc = assign_heading_ids(&doc);
        assert_eq!(heading_ids(&doc), ["intro", "intro-1"]);
    }

    #[test]
    fn test_input_tree_untouched() {
        let doc = parse("# Title\n\n[a](https://x.org)\n", &ParseOptions::html());
        let before = doc.root().clone();
        let _ = secure_links(&assign_heading_ids(&doc));
        assert_eq!(doc.root(), &before);
    }

    fn first_inline(doc: &Document<'_>) -> Node {
        doc.root().children[0].children[0].clone()
    }

    #[test]
    fn test_external_link_secured() {
        let doc = secure_links(&parse("[a](https://x.org)", &ParseOptions::html()));
        let link = first_inline(&doc);
        assert_eq!(link.attributes.get("rel"), Some("noreferrer"));
        assert_eq!(link.attributes.get("target"), Some("_blank"));
    }

    #[test]
    fn test_relative_link_untouched() {
        let doc = secure_links(&parse("[a](/docs/page)", &ParseOptions::html()));
        assert!(first_inline(&doc).attributes.is_empty());
    }

    #[test]
    fn test_autolinks() {
        let doc = secure_links(&parse("<http://x.org>", &ParseOptions::html()));
        assert_eq!(first_inline(&doc).attributes.get("target"), Some("_blank"));

        let doc = secure_links(&parse("<me@x.org>", &ParseOptions::html()));
        assert!(first_inline(&doc).attributes.is_empty());
    }
}
