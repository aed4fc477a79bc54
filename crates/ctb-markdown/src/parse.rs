//! Document tree construction from pulldown-cmark's offset event stream.
//!
//! pulldown-cmark does the CommonMark parsing. This module folds its events
//! into [`Node`]s and recovers the source facts renderers need but the event
//! stream only carries implicitly: list tightness and markers, item offsets,
//! blank lines before lists, HTML block closure lines, code span delimiters
//! and linkified bare URLs.

use std::ops::Range;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::ast::{
    Alignment, Attributes, Document, LinkData, ListData, Node, NodeKind, NodeValue, Segment,
    TextData,
};
use crate::util::heading_level_to_num;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").unwrap());

/// Parser extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ParseOptions {
    /// `{#id .class key=value}` after heading text.
    pub heading_attributes: bool,
    /// GFM pipe tables.
    pub tables: bool,
    /// `term` / `: details` definition lists.
    pub definition_lists: bool,
    /// Turn bare `http://` and `https://` URLs into autolinks.
    pub linkify: bool,
    /// Curly quotes and dashes. Off for the Markdown target so the source
    /// text is kept as written.
    pub smart_punctuation: bool,
}

impl ParseOptions {
    /// Options for the Markdown target.
    #[must_use]
    pub fn markdown() -> Self {
        Self {
            heading_attributes: true,
            tables: true,
            definition_lists: true,
            linkify: true,
            smart_punctuation: false,
        }
    }

    /// Options for the HTML target.
    #[must_use]
    pub fn html() -> Self {
        Self {
            smart_punctuation: true,
            ..Self::markdown()
        }
    }

    fn parser_options(self) -> Options {
        let mut options = Options::empty();
        options.set(Options::ENABLE_HEADING_ATTRIBUTES, self.heading_attributes);
        options.set(Options::ENABLE_TABLES, self.tables);
        options.set(Options::ENABLE_DEFINITION_LIST, self.definition_lists);
        options.set(Options::ENABLE_SMART_PUNCTUATION, self.smart_punctuation);
        options
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::markdown()
    }
}

/// Parse `source` into a document tree.
#[must_use]
pub fn parse<'src>(source: &'src str, options: &ParseOptions) -> Document<'src> {
    let mut builder = TreeBuilder::new(source, options.linkify);
    for (event, range) in Parser::new_ext(source, options.parser_options()).into_offset_iter() {
        builder.event(event, range);
    }
    let root = builder.finish();
    tracing::debug!(
        bytes = source.len(),
        blocks = root.children.len(),
        "Parsed document"
    );
    Document::new(source, root)
}

/// A node under construction.
struct Open {
    node: Node,
    /// Text pieces not yet turned into nodes: source range and decoded text.
    run: Vec<(Segment, String)>,
    /// Verbatim content of code and HTML blocks.
    buffer: String,
    /// A list item or details block contained a real paragraph; a list that
    /// saw a loose item.
    loose: bool,
    /// Column where list item content starts.
    content_column: usize,
    /// Unsupported container: children move to the parent on close.
    transparent: bool,
}

impl Open {
    fn new(node: Node) -> Self {
        Self {
            node,
            run: Vec::new(),
            buffer: String::new(),
            loose: false,
            content_column: 0,
            transparent: false,
        }
    }
}

struct TreeBuilder<'src> {
    source: &'src str,
    linkify: bool,
    stack: Vec<Open>,
}

impl<'src> TreeBuilder<'src> {
    fn new(source: &'src str, linkify: bool) -> Self {
        let root = Node::new(NodeValue::Document, 0..source.len());
        Self {
            source,
            linkify,
            stack: vec![Open::new(root)],
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        self.flush_top(None);
        match self.stack.pop() {
            Some(open) => open.node,
            None => Node::new(NodeValue::Document, 0..self.source.len()),
        }
    }

    fn top(&mut self) -> &mut Open {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn top_kind(&self) -> NodeKind {
        self.stack
            .last()
            .map_or(NodeKind::Document, |open| open.node.kind())
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(tag) => self.end(&tag),
            Event::Text(text) => match self.top_kind() {
                NodeKind::CodeBlock | NodeKind::FencedCodeBlock => {
                    let open = self.top();
                    open.buffer.push_str(&text);
                    if let NodeValue::FencedCodeBlock { content_end, .. } = &mut open.node.value {
                        *content_end = range.end;
                    }
                }
                _ => self.top().run.push((range, text.into_string())),
            },
            Event::Code(code) => self.code_span(&code, range),
            Event::Html(html) if self.top_kind() == NodeKind::HtmlBlock => {
                self.top().buffer.push_str(&html);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let node = Node::new(
                    NodeValue::RawHtml {
                        segments: vec![html.into_string()],
                    },
                    range,
                );
                self.append(node);
            }
            Event::SoftBreak => self.line_break(range, false),
            Event::HardBreak => self.line_break(range, true),
            Event::Rule => self.append(Node::new(NodeValue::ThematicBreak, range)),
            Event::FootnoteReference(_)
            | Event::InlineMath(_)
            | Event::DisplayMath(_)
            | Event::TaskListMarker(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        let source = self.source;
        let value = match tag {
            Tag::Paragraph => {
                if matches!(
                    self.top_kind(),
                    NodeKind::ListItem | NodeKind::DefinitionDetails
                ) {
                    self.top().loose = true;
                }
                NodeValue::Paragraph
            }
            Tag::Heading {
                level,
                id,
                classes,
                attrs,
            } => {
                let mut attributes = Attributes::new();
                if let Some(id) = id {
                    attributes.push("id", Some(id.into_string()));
                }
                for class in classes {
                    attributes.push("class", Some(class.into_string()));
                }
                for (name, value) in attrs {
                    attributes.push(name.into_string(), value.map(|v| v.into_string()));
                }
                let mut node = Node::new(
                    NodeValue::Heading {
                        level: heading_level_to_num(level),
                    },
                    range,
                );
                node.attributes = attributes;
                self.open(node);
                return;
            }
            Tag::BlockQuote(_) => NodeValue::Blockquote,
            Tag::CodeBlock(CodeBlockKind::Indented) => NodeValue::CodeBlock { lines: Vec::new() },
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => NodeValue::FencedCodeBlock {
                info: info.trim().to_owned(),
                lines: Vec::new(),
                content_end: line_end(source, range.start).min(range.end),
            },
            Tag::HtmlBlock => NodeValue::HtmlBlock {
                lines: Vec::new(),
                closure: None,
            },
            Tag::List(start) => NodeValue::List(ListData {
                start,
                marker: list_marker(source, range.start, start.is_some()),
                tight: true,
                blank_before: blank_line_before(source, range.start),
            }),
            Tag::Item => {
                let base = self.enclosing_item_column();
                let layout = item_layout(source, range.start);
                let mut open = Open::new(Node::new(
                    NodeValue::ListItem {
                        offset: layout.column.saturating_sub(base) + layout.marker + 1,
                    },
                    range,
                ));
                open.content_column = layout.column + layout.marker + layout.spaces;
                self.push_open(open);
                return;
            }
            Tag::DefinitionList => NodeValue::DefinitionList,
            Tag::DefinitionListTitle => NodeValue::DefinitionTerm,
            Tag::DefinitionListDefinition => NodeValue::DefinitionDetails { tight: true },
            Tag::Table(alignments) => NodeValue::Table {
                alignments: alignments.into_iter().map(convert_alignment).collect(),
            },
            Tag::TableHead => NodeValue::TableHead,
            Tag::TableRow => NodeValue::TableRow,
            Tag::TableCell => NodeValue::TableCell,
            Tag::Emphasis => NodeValue::Emphasis { level: 1 },
            Tag::Strong => NodeValue::Emphasis { level: 2 },
            Tag::Link {
                link_type: link_type @ (LinkType::Autolink | LinkType::Email),
                dest_url,
                ..
            } => NodeValue::AutoLink {
                url: dest_url.into_string(),
                email: link_type == LinkType::Email,
            },
            Tag::Link {
                dest_url, title, ..
            } => NodeValue::Link(link_data(dest_url.into_string(), title.into_string())),
            Tag::Image {
                dest_url, title, ..
            } => NodeValue::Image(link_data(dest_url.into_string(), title.into_string())),
            _ => {
                let mut open = Open::new(Node::new(NodeValue::Paragraph, range));
                open.transparent = true;
                self.push_open(open);
                return;
            }
        };
        self.open(Node::new(value, range));
    }

    fn end(&mut self, _tag: &TagEnd) {
        if self.stack.len() > 1 {
            self.close();
        }
    }

    fn open(&mut self, node: Node) {
        self.push_open(Open::new(node));
    }

    fn push_open(&mut self, open: Open) {
        self.flush_top(None);
        self.stack.push(open);
    }

    fn close(&mut self) {
        self.flush_top(None);
        let Some(open) = self.stack.pop() else {
            return;
        };
        let loose = open.loose;
        let transparent = open.transparent;
        let mut node = open.node;

        match &mut node.value {
            NodeValue::CodeBlock { lines } | NodeValue::FencedCodeBlock { lines, .. } => {
                *lines = split_lines(&open.buffer);
            }
            NodeValue::HtmlBlock { lines, closure } => {
                *lines = split_lines(&open.buffer);
                *closure = split_closure(lines);
            }
            NodeValue::List(list) => list.tight = !loose,
            NodeValue::ListItem { .. } => {
                node.children = wrap_inlines(std::mem::take(&mut node.children));
            }
            NodeValue::DefinitionDetails { tight } => {
                *tight = !loose;
                node.children = wrap_inlines(std::mem::take(&mut node.children));
            }
            _ => {}
        }

        if node.kind() == NodeKind::ListItem && loose {
            self.top().loose = true;
        }

        if transparent {
            for child in node.children {
                self.append(child);
            }
        } else {
            self.append(node);
        }
    }

    /// Append a finished node to the open node on top of the stack.
    fn append(&mut self, node: Node) {
        self.flush_top(None);
        self.top().node.children.push(node);
    }

    fn code_span(&mut self, code: &str, range: Range<usize>) {
        let raw = self.source.get(range.clone()).unwrap_or_default();
        let delimiter = raw.bytes().take_while(|&b| b == b'`').count().max(1);
        let inner = (range.start + delimiter)..range.end.saturating_sub(delimiter).max(range.start + delimiter);
        let body = self.source.get(inner.clone()).unwrap_or_default();

        // Continuation lines carry container prefixes in the source; use the
        // parser's normalized text for spans that cross a line.
        let child = if body.contains('\n') {
            Node::new(NodeValue::String(code.to_owned()), inner)
        } else {
            Node::new(
                NodeValue::Text(TextData {
                    segment: inner.clone(),
                    literal: code.to_owned(),
                    raw: true,
                    soft_break: false,
                    hard_break: false,
                }),
                inner,
            )
        };
        let node = Node::new(NodeValue::CodeSpan { delimiter }, range).with_children(vec![child]);
        self.append(node);
    }

    fn line_break(&mut self, range: Range<usize>, hard: bool) {
        self.flush_top(Some((range, hard)));
    }

    fn enclosing_item_column(&self) -> usize {
        self.stack
            .iter()
            .rev()
            .find(|open| {
                matches!(
                    open.node.kind(),
                    NodeKind::ListItem | NodeKind::Blockquote | NodeKind::DefinitionDetails
                )
            })
            .filter(|open| open.node.kind() == NodeKind::ListItem)
            .map_or(0, |open| open.content_column)
    }

    fn in_link(&self) -> bool {
        self.stack.iter().any(|open| {
            matches!(
                open.node.kind(),
                NodeKind::Link | NodeKind::Image | NodeKind::AutoLink
            )
        })
    }

    /// Turn the pending text run of the top node into text nodes.
    fn flush_top(&mut self, line_break: Option<(Range<usize>, bool)>) {
        let linkify = self.linkify && !self.in_link();
        let last = self.stack.len() - 1;
        let run = std::mem::take(&mut self.stack[last].run);
        if run.is_empty() && line_break.is_none() {
            return;
        }
        let nodes = text_nodes(self.source, &run, linkify, line_break);
        self.stack[last].node.children.extend(nodes);
    }
}

/// Build text (and linkified autolink) nodes from a run of text pieces.
fn text_nodes(
    source: &str,
    run: &[(Segment, String)],
    linkify: bool,
    line_break: Option<(Range<usize>, bool)>,
) -> Vec<Node> {
    let mut nodes = Vec::new();
    if let (Some((first, _)), Some((last, _))) = (run.first(), run.last()) {
        let start = first.start;
        let end = last.end.max(start);
        let mut cursor = start;

        if linkify {
            for (url_start, url_end) in find_urls(source, start..end) {
                let Some(url) = literal_between(source, run, url_start, url_end) else {
                    continue;
                };
                let Some(before) = literal_between(source, run, cursor, url_start) else {
                    continue;
                };
                if url_start > cursor {
                    nodes.push(text_node(cursor..url_start, before));
                }
                let label = text_node(url_start..url_end, url.clone());
                nodes.push(
                    Node::new(NodeValue::AutoLink { url, email: false }, url_start..url_end)
                        .with_children(vec![label]),
                );
                cursor = url_end;
            }
        }

        if cursor < end || nodes.is_empty() {
            let literal = literal_between(source, run, cursor, end).unwrap_or_else(|| {
                run.iter()
                    .filter(|(segment, _)| segment.start >= cursor)
                    .map(|(_, literal)| literal.as_str())
                    .collect()
            });
            nodes.push(text_node(cursor..end, literal));
        }
    }

    if let Some((range, hard)) = line_break {
        let needs_carrier = !matches!(nodes.last().map(|n| &n.value), Some(NodeValue::Text(_)));
        if needs_carrier {
            nodes.push(text_node(range.start..range.start, String::new()));
        }
        if let Some(NodeValue::Text(text)) = nodes.last_mut().map(|n| &mut n.value) {
            if hard {
                text.hard_break = true;
            } else {
                text.soft_break = true;
            }
        }
    }
    nodes
}

fn text_node(segment: Segment, literal: String) -> Node {
    Node::new(
        NodeValue::Text(TextData {
            segment: segment.clone(),
            literal,
            raw: false,
            soft_break: false,
            hard_break: false,
        }),
        segment,
    )
}

/// Decoded text of the source bytes `start..end` covered by `run`.
///
/// Returns `None` when the boundary falls inside a piece whose decoded text
/// differs from its source (an entity or escape), since it cannot be split.
fn literal_between(
    source: &str,
    run: &[(Segment, String)],
    start: usize,
    end: usize,
) -> Option<String> {
    let mut out = String::new();
    for (segment, literal) in run {
        let from = segment.start.max(start);
        let to = segment.end.min(end);
        if from >= to {
            continue;
        }
        if from == segment.start && to == segment.end {
            out.push_str(literal);
        } else if source.get(segment.clone()) == Some(literal.as_str()) {
            out.push_str(literal.get(from - segment.start..to - segment.start)?);
        } else {
            return None;
        }
    }
    Some(out)
}

/// Bare URLs in `range`, trailing punctuation excluded.
fn find_urls(source: &str, range: Range<usize>) -> Vec<(usize, usize)> {
    let Some(text) = source.get(range.clone()) else {
        return Vec::new();
    };
    URL_RE
        .find_iter(text)
        .filter(|m| {
            text[..m.start()]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric() && c != '/' && c != '<')
        })
        .filter_map(|m| {
            let url = trim_url(m.as_str());
            let scheme_len = if url.starts_with("https") { 8 } else { 7 };
            (url.len() > scheme_len)
                .then(|| (range.start + m.start(), range.start + m.start() + url.len()))
        })
        .collect()
}

fn trim_url(mut url: &str) -> &str {
    loop {
        let Some(last) = url.chars().next_back() else {
            return url;
        };
        let unbalanced_paren =
            last == ')' && url.matches('(').count() < url.matches(')').count();
        if matches!(last, '?' | '!' | '.' | ',' | ':' | ';' | '*' | '_' | '~' | '\'' | '"')
            || unbalanced_paren
        {
            url = &url[..url.len() - last.len_utf8()];
        } else {
            return url;
        }
    }
}

/// Group runs of inline children into paragraphs (tight list items).
fn wrap_inlines(children: Vec<Node>) -> Vec<Node> {
    if children.iter().all(|child| child.kind().is_block()) {
        return children;
    }
    let mut out = Vec::new();
    let mut inlines: Vec<Node> = Vec::new();
    for child in children {
        if child.kind().is_block() {
            if !inlines.is_empty() {
                out.push(paragraph(std::mem::take(&mut inlines)));
            }
            out.push(child);
        } else {
            inlines.push(child);
        }
    }
    if !inlines.is_empty() {
        out.push(paragraph(inlines));
    }
    out
}

fn paragraph(children: Vec<Node>) -> Node {
    let start = children.first().map_or(0, |c| c.span.start);
    let end = children.last().map_or(start, |c| c.span.end.max(start));
    Node::new(NodeValue::Paragraph, start..end).with_children(children)
}

fn split_lines(buffer: &str) -> Vec<String> {
    buffer.split_inclusive('\n').map(str::to_owned).collect()
}

/// Detach the closing line of HTML blocks that end on an explicit
/// condition (`</script>`, `-->`, `?>`, `]]>`, `>` of a declaration).
fn split_closure(lines: &mut Vec<String>) -> Option<String> {
    const RAW_TAGS: [&str; 4] = ["script", "pre", "style", "textarea"];

    if lines.len() < 2 {
        return None;
    }
    let first = lines[0].trim_start().to_ascii_lowercase();
    let closes = |line: &str| -> bool {
        let line = line.to_ascii_lowercase();
        if let Some(rest) = first.strip_prefix('<')
            && RAW_TAGS.iter().any(|tag| {
                rest.strip_prefix(tag).is_some_and(|after| {
                    after.is_empty() || after.starts_with([' ', '\t', '>', '\n'])
                })
            })
        {
            return RAW_TAGS
                .iter()
                .any(|tag| line.contains(&format!("</{tag}>")));
        }
        if first.starts_with("<!--") {
            line.contains("-->")
        } else if first.starts_with("<?") {
            line.contains("?>")
        } else if first.starts_with("<![cdata[") {
            line.contains("]]>")
        } else if first
            .strip_prefix("<!")
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_alphabetic())
        {
            line.contains('>')
        } else {
            false
        }
    };
    if lines.last().is_some_and(|last| closes(last)) {
        lines.pop()
    } else {
        None
    }
}

fn link_data(destination: String, title: String) -> LinkData {
    LinkData {
        destination,
        title: (!title.is_empty()).then_some(title),
    }
}

fn convert_alignment(alignment: pulldown_cmark::Alignment) -> Alignment {
    match alignment {
        pulldown_cmark::Alignment::None => Alignment::None,
        pulldown_cmark::Alignment::Left => Alignment::Left,
        pulldown_cmark::Alignment::Center => Alignment::Center,
        pulldown_cmark::Alignment::Right => Alignment::Right,
    }
}

/// Offset just past the line containing `pos`.
fn line_end(source: &str, pos: usize) -> usize {
    source
        .get(pos..)
        .and_then(|rest| rest.find('\n'))
        .map_or(source.len(), |i| pos + i + 1)
}

/// Column of `pos` within its line, not counting blockquote markers.
fn column(source: &str, pos: usize) -> usize {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..pos];
    match prefix.rfind('>') {
        Some(i) => {
            let rest = &prefix[i + 1..];
            rest.strip_prefix(' ').unwrap_or(rest).chars().count()
        }
        None => prefix.chars().count(),
    }
}

struct ItemLayout {
    /// Column of the marker.
    column: usize,
    /// Width of the marker.
    marker: usize,
    /// Spaces between marker and content.
    spaces: usize,
}

fn item_layout(source: &str, start: usize) -> ItemLayout {
    let rest = source.get(start..).unwrap_or_default();
    let indent = rest.len() - rest.trim_start_matches(' ').len();
    let marker_start = start + indent;
    let rest = &rest[indent..];

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let marker = if digits > 0 { digits + 1 } else { 1 };
    let after = rest.get(marker..).unwrap_or_default();
    let line = after.split('\n').next().unwrap_or_default();
    let spaces = line.len() - line.trim_start_matches(' ').len();
    // Blank item lines and indented code start one space after the marker.
    let spaces = if spaces == 0 || spaces >= 5 || line.trim().is_empty() {
        1
    } else {
        spaces
    };

    ItemLayout {
        column: column(source, marker_start),
        marker,
        spaces,
    }
}

fn list_marker(source: &str, start: usize, ordered: bool) -> char {
    let rest = source.get(start..).unwrap_or_default().trim_start_matches(' ');
    if ordered {
        rest.trim_start_matches(|c: char| c.is_ascii_digit())
            .chars()
            .next()
            .filter(|c| matches!(c, '.' | ')'))
            .unwrap_or('.')
    } else {
        rest.chars()
            .next()
            .filter(|c| matches!(c, '-' | '+' | '*'))
            .unwrap_or('-')
    }
}

/// Whether the line before the one containing `pos` is blank (quote
/// markers ignored).
fn blank_line_before(source: &str, pos: usize) -> bool {
    let mut lines = source[..pos].rsplit('\n');
    lines.next();
    lines
        .next()
        .is_some_and(|prev| prev.trim_matches(|c: char| c.is_whitespace() || c == '>').is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_md(source: &str) -> Document<'_> {
        parse(source, &ParseOptions::markdown())
    }

    fn kinds(node: &Node) -> Vec<NodeKind> {
        node.children.iter().map(Node::kind).collect()
    }

    #[test]
    fn test_tight_list() {
        let doc = parse_md("* one\n* two\n");
        let list = &doc.root().children[0];
        let NodeValue::List(data) = &list.value else {
            panic!("expected list, got {:?}", list.kind());
        };
        assert!(data.tight);
        assert_eq!(data.marker, '*');
        assert_eq!(data.start, None);
        assert_eq!(kinds(list), [NodeKind::ListItem, NodeKind::ListItem]);
        assert_eq!(kinds(&list.children[0]), [NodeKind::Paragraph]);
    }

    #[test]
    fn test_loose_list() {
        let doc = parse_md("1) one\n\n2) two\n");
        let NodeValue::List(data) = &doc.root().children[0].value else {
            panic!("expected list");
        };
        assert!(!data.tight);
        assert_eq!(data.marker, ')');
        assert_eq!(data.start, Some(1));
    }

    #[test]
    fn test_definition_details_tightness() {
        fn details(source: &str) -> Node {
            parse_md(source).root().children[0].children[1].clone()
        }

        let tight = details("term\n: tight\n");
        assert_eq!(tight.value, NodeValue::DefinitionDetails { tight: true });
        assert_eq!(kinds(&tight), [NodeKind::Paragraph]);

        let loose = details("term\n\n: loose\n");
        assert_eq!(loose.value, NodeValue::DefinitionDetails { tight: false });
    }

    #[test]
    fn test_item_offset_includes_indentation() {
        let doc = parse_md("  - item\n");
        let item = &doc.root().children[0].children[0];
        assert_eq!(item.value, NodeValue::ListItem { offset: 4 });
    }

    #[test]
    fn test_nested_item_offset_is_relative() {
        let doc = parse_md("- a\n  - b\n");
        let nested = &doc.root().children[0].children[0].children[1];
        assert_eq!(nested.kind(), NodeKind::List);
        assert_eq!(nested.children[0].value, NodeValue::ListItem { offset: 2 });
    }

    #[test]
    fn test_blank_line_before_list() {
        let doc = parse_md("para\n\n- item\n");
        let NodeValue::List(data) = &doc.root().children[1].value else {
            panic!("expected list");
        };
        assert!(data.blank_before);

        let doc = parse_md("para\n- item\n");
        let NodeValue::List(data) = &doc.root().children[1].value else {
            panic!("expected list");
        };
        assert!(!data.blank_before);
    }

    #[test]
    fn test_text_keeps_escapes_in_segment() {
        let doc = parse_md(r"a \*b\* c");
        let para = &doc.root().children[0];
        assert_eq!(kinds(para), [NodeKind::Text]);
        let NodeValue::Text(text) = &para.children[0].value else {
            panic!("expected text");
        };
        assert_eq!(doc.slice(&text.segment), r"a \*b\* c");
        assert_eq!(text.literal, "a *b* c");
    }

    #[test]
    fn test_soft_break_flag() {
        let doc = parse_md("one\ntwo");
        let para = &doc.root().children[0];
        let NodeValue::Text(first) = &para.children[0].value else {
            panic!("expected text");
        };
        assert!(first.soft_break);
        assert_eq!(doc.slice(&first.segment), "one");
    }

    #[test]
    fn test_hard_break_after_emphasis_gets_carrier() {
        let doc = parse_md("*one*\\\ntwo");
        let para = &doc.root().children[0];
        assert_eq!(
            kinds(para),
            [NodeKind::Emphasis, NodeKind::Text, NodeKind::Text]
        );
        let NodeValue::Text(carrier) = &para.children[1].value else {
            panic!("expected text");
        };
        assert!(carrier.hard_break);
        assert!(carrier.literal.is_empty());
    }

    #[test]
    fn test_code_span_delimiter() {
        let doc = parse_md("``a ` b``");
        let span = &doc.root().children[0].children[0];
        assert_eq!(span.value, NodeValue::CodeSpan { delimiter: 2 });
        let NodeValue::Text(text) = &span.children[0].value else {
            panic!("expected raw text");
        };
        assert!(text.raw);
        assert_eq!(doc.slice(&text.segment), "a ` b");
    }

    #[test]
    fn test_fenced_code_lines() {
        let doc = parse_md("~~~rust\nfn main() {}\n\nlet x = 1;\n~~~\n");
        let NodeValue::FencedCodeBlock {
            info,
            lines,
            content_end,
        } = &doc.root().children[0].value
        else {
            panic!("expected fenced code");
        };
        assert_eq!(info, "rust");
        assert_eq!(lines, &["fn main() {}\n", "\n", "let x = 1;\n"]);
        assert_eq!(&doc.source()[*content_end..], "~~~\n");
    }

    #[test]
    fn test_html_block_closure() {
        let doc = parse_md("<!--\ncomment\n-->\n");
        let NodeValue::HtmlBlock { lines, closure } = &doc.root().children[0].value else {
            panic!("expected html block");
        };
        assert_eq!(lines, &["<!--\n", "comment\n"]);
        assert_eq!(closure.as_deref(), Some("-->\n"));
    }

    #[test]
    fn test_html_block_without_closure() {
        let doc = parse_md("<div>\nhello\n</div>\n");
        let NodeValue::HtmlBlock { lines, closure } = &doc.root().children[0].value else {
            panic!("expected html block");
        };
        assert_eq!(lines.len(), 3);
        assert!(closure.is_none());
    }

    #[test]
    fn test_heading_attributes_in_order() {
        let doc = parse_md("# Title {#intro .wide}\n");
        let heading = &doc.root().children[0];
        let attrs: Vec<_> = heading
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_deref()))
            .collect();
        assert_eq!(attrs, [("id", Some("intro")), ("class", Some("wide"))]);
    }

    #[test]
    fn test_linkify_bare_url() {
        let doc = parse_md("see https://example.com/a_b. ok");
        let para = &doc.root().children[0];
        assert_eq!(
            kinds(para),
            [NodeKind::Text, NodeKind::AutoLink, NodeKind::Text]
        );
        let link = &para.children[1];
        assert_eq!(
            link.value,
            NodeValue::AutoLink {
                url: "https://example.com/a_b".to_owned(),
                email: false
            }
        );
        assert_eq!(doc.slice(&link.span), "https://example.com/a_b");
    }

    #[test]
    fn test_linkify_skips_link_text() {
        let doc = parse_md("[https://example.com](https://example.com)");
        let link = &doc.root().children[0].children[0];
        assert_eq!(link.kind(), NodeKind::Link);
        assert_eq!(kinds(link), [NodeKind::Text]);
    }

    #[test]
    fn test_bracketed_autolink() {
        let doc = parse_md("<https://example.com>");
        let link = &doc.root().children[0].children[0];
        assert_eq!(link.kind(), NodeKind::AutoLink);
        assert_eq!(doc.slice(&link.span), "<https://example.com>");
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(trim_url("https://a.com/x)."), "https://a.com/x");
        assert_eq!(trim_url("https://a.com/(x)"), "https://a.com/(x)");
    }

    #[test]
    fn test_table_structure() {
        let doc = parse_md("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        let table = &doc.root().children[0];
        assert_eq!(
            table.value,
            NodeValue::Table {
                alignments: vec![Alignment::Left, Alignment::Right]
            }
        );
        assert_eq!(kinds(table), [NodeKind::TableHead, NodeKind::TableRow]);
    }
}
