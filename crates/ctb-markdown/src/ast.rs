//! Document tree produced by [`parse`](crate::parse) and consumed by renderers.
//!
//! Nodes never own source text. Verbatim content is referenced by byte ranges
//! into the source held by [`Document`], so the source must outlive the tree.

use std::fmt::{self, Write};
use std::ops::Range;

/// Byte range into the document source.
pub type Segment = Range<usize>;

/// Node kind tag with a dense ordinal, used to index dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Heading,
    Paragraph,
    Blockquote,
    List,
    ListItem,
    CodeBlock,
    FencedCodeBlock,
    HtmlBlock,
    ThematicBreak,
    Table,
    TableHead,
    TableRow,
    TableCell,
    DefinitionList,
    DefinitionTerm,
    DefinitionDetails,
    Text,
    String,
    Emphasis,
    CodeSpan,
    Link,
    Image,
    AutoLink,
    RawHtml,
}

impl NodeKind {
    /// Number of kinds; the length of a dense dispatch table.
    pub const COUNT: usize = 25;

    /// Every kind in ordinal order.
    pub const ALL: [NodeKind; Self::COUNT] = [
        NodeKind::Document,
        NodeKind::Heading,
        NodeKind::Paragraph,
        NodeKind::Blockquote,
        NodeKind::List,
        NodeKind::ListItem,
        NodeKind::CodeBlock,
        NodeKind::FencedCodeBlock,
        NodeKind::HtmlBlock,
        NodeKind::ThematicBreak,
        NodeKind::Table,
        NodeKind::TableHead,
        NodeKind::TableRow,
        NodeKind::TableCell,
        NodeKind::DefinitionList,
        NodeKind::DefinitionTerm,
        NodeKind::DefinitionDetails,
        NodeKind::Text,
        NodeKind::String,
        NodeKind::Emphasis,
        NodeKind::CodeSpan,
        NodeKind::Link,
        NodeKind::Image,
        NodeKind::AutoLink,
        NodeKind::RawHtml,
    ];

    /// Position of this kind in [`NodeKind::ALL`].
    #[must_use]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Whether the kind is a block (receives separators between siblings).
    #[must_use]
    pub fn is_block(self) -> bool {
        matches!(
            self,
            NodeKind::Document
                | NodeKind::Heading
                | NodeKind::Paragraph
                | NodeKind::Blockquote
                | NodeKind::List
                | NodeKind::ListItem
                | NodeKind::CodeBlock
                | NodeKind::FencedCodeBlock
                | NodeKind::HtmlBlock
                | NodeKind::ThematicBreak
                | NodeKind::Table
                | NodeKind::TableHead
                | NodeKind::TableRow
                | NodeKind::DefinitionList
                | NodeKind::DefinitionTerm
                | NodeKind::DefinitionDetails
        )
    }

    /// Name used in dumps and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Document => "Document",
            NodeKind::Heading => "Heading",
            NodeKind::Paragraph => "Paragraph",
            NodeKind::Blockquote => "Blockquote",
            NodeKind::List => "List",
            NodeKind::ListItem => "ListItem",
            NodeKind::CodeBlock => "CodeBlock",
            NodeKind::FencedCodeBlock => "FencedCodeBlock",
            NodeKind::HtmlBlock => "HTMLBlock",
            NodeKind::ThematicBreak => "ThematicBreak",
            NodeKind::Table => "Table",
            NodeKind::TableHead => "TableHead",
            NodeKind::TableRow => "TableRow",
            NodeKind::TableCell => "TableCell",
            NodeKind::DefinitionList => "DefinitionList",
            NodeKind::DefinitionTerm => "DefinitionTerm",
            NodeKind::DefinitionDetails => "DefinitionDetails",
            NodeKind::Text => "Text",
            NodeKind::String => "String",
            NodeKind::Emphasis => "Emphasis",
            NodeKind::CodeSpan => "CodeSpan",
            NodeKind::Link => "Link",
            NodeKind::Image => "Image",
            NodeKind::AutoLink => "AutoLink",
            NodeKind::RawHtml => "RawHTML",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// List attributes read by list items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListData {
    /// Start number for ordered lists, `None` for bullet lists.
    pub start: Option<u64>,
    /// Bullet (`-`, `+`, `*`) or ordered delimiter (`.`, `)`).
    pub marker: char,
    /// No blank lines between items or inside them.
    pub tight: bool,
    /// The source has a blank line right before the list.
    pub blank_before: bool,
}

impl ListData {
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.start.is_some()
    }
}

/// Inline text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextData {
    /// Source bytes of the run, escapes and entities included.
    pub segment: Segment,
    /// Decoded text as the parser delivered it.
    pub literal: String,
    /// Content is verbatim (code span body), not Markdown.
    pub raw: bool,
    pub soft_break: bool,
    pub hard_break: bool,
}

/// Destination and title of links and images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkData {
    pub destination: String,
    pub title: Option<String>,
}

/// Column alignment of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    None,
    Left,
    Center,
    Right,
}

/// Kind-specific node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeValue {
    Document,
    Heading {
        level: u8,
    },
    Paragraph,
    Blockquote,
    List(ListData),
    ListItem {
        /// Width from the line start (relative to the enclosing item) to the
        /// item content.
        offset: usize,
    },
    CodeBlock {
        lines: Vec<String>,
    },
    FencedCodeBlock {
        info: String,
        lines: Vec<String>,
        /// Offset right after the last content line (or the opening fence
        /// line when the block is empty).
        content_end: usize,
    },
    HtmlBlock {
        lines: Vec<String>,
        closure: Option<String>,
    },
    ThematicBreak,
    Table {
        alignments: Vec<Alignment>,
    },
    TableHead,
    TableRow,
    TableCell,
    DefinitionList,
    DefinitionTerm,
    DefinitionDetails {
        /// Content is not wrapped in paragraphs (no blank line before it).
        tight: bool,
    },
    Text(TextData),
    String(String),
    Emphasis {
        level: u8,
    },
    CodeSpan {
        /// Length of the backtick run used in the source.
        delimiter: usize,
    },
    Link(LinkData),
    Image(LinkData),
    AutoLink {
        url: String,
        email: bool,
    },
    RawHtml {
        segments: Vec<String>,
    },
}

impl NodeValue {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeValue::Document => NodeKind::Document,
            NodeValue::Heading { .. } => NodeKind::Heading,
            NodeValue::Paragraph => NodeKind::Paragraph,
            NodeValue::Blockquote => NodeKind::Blockquote,
            NodeValue::List(_) => NodeKind::List,
            NodeValue::ListItem { .. } => NodeKind::ListItem,
            NodeValue::CodeBlock { .. } => NodeKind::CodeBlock,
            NodeValue::FencedCodeBlock { .. } => NodeKind::FencedCodeBlock,
            NodeValue::HtmlBlock { .. } => NodeKind::HtmlBlock,
            NodeValue::ThematicBreak => NodeKind::ThematicBreak,
            NodeValue::Table { .. } => NodeKind::Table,
            NodeValue::TableHead => NodeKind::TableHead,
            NodeValue::TableRow => NodeKind::TableRow,
            NodeValue::TableCell => NodeKind::TableCell,
            NodeValue::DefinitionList => NodeKind::DefinitionList,
            NodeValue::DefinitionTerm => NodeKind::DefinitionTerm,
            NodeValue::DefinitionDetails { .. } => NodeKind::DefinitionDetails,
            NodeValue::Text(_) => NodeKind::Text,
            NodeValue::String(_) => NodeKind::String,
            NodeValue::Emphasis { .. } => NodeKind::Emphasis,
            NodeValue::CodeSpan { .. } => NodeKind::CodeSpan,
            NodeValue::Link(_) => NodeKind::Link,
            NodeValue::Image(_) => NodeKind::Image,
            NodeValue::AutoLink { .. } => NodeKind::AutoLink,
            NodeValue::RawHtml { .. } => NodeKind::RawHtml,
        }
    }
}

/// Single attribute, `value` is `None` for bare names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

/// Attributes in insertion order.
///
/// Names may repeat (several `class` entries); [`set`](Self::set) replaces
/// the first entry with the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append an attribute, keeping existing entries with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.push(Attribute {
            name: name.into(),
            value,
        });
    }

    /// Set an attribute, replacing the first entry with the same name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.0.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value,
            None => self.push(name, value),
        }
    }

    /// Value of the first attribute with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|attr| attr.name == name)
            .and_then(|attr| attr.value.as_deref())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|attr| attr.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }
}

/// Tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub value: NodeValue,
    /// Byte range the node covers in the source.
    pub span: Segment,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

impl Node {
    #[must_use]
    pub fn new(value: NodeValue, span: Segment) -> Self {
        Self {
            value,
            span,
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.value.kind()
    }

    /// Concatenated literal text of all descendant text nodes.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.value {
            NodeValue::Text(text) => {
                out.push_str(&text.literal);
                if text.soft_break || text.hard_break {
                    out.push(' ');
                }
            }
            NodeValue::String(value) => out.push_str(value),
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }
}

/// Parsed document: the root node plus the source its segments point into.
#[derive(Debug, Clone)]
pub struct Document<'src> {
    source: &'src str,
    root: Node,
}

impl<'src> Document<'src> {
    /// Wrap a root node. The root is expected to be a `Document` node.
    #[must_use]
    pub fn new(source: &'src str, root: Node) -> Self {
        Self { source, root }
    }

    #[must_use]
    pub fn source(&self) -> &'src str {
        self.source
    }

    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Source bytes referenced by a segment, empty when out of range.
    #[must_use]
    pub fn slice(&self, segment: &Segment) -> &'src str {
        self.source.get(segment.clone()).unwrap_or_default()
    }

    /// Indented dump of the tree structure for debugging.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        dump_node(&self.root, self.source, 0, &mut out);
        out
    }
}

fn dump_node(node: &Node, source: &str, level: usize, out: &mut String) {
    let indent = "    ".repeat(level);
    let _ = writeln!(out, "{indent}{} {{", node.kind());
    let field = format!("{indent}    ");
    match &node.value {
        NodeValue::Heading { level } => {
            let _ = writeln!(out, "{field}Level: {level}");
        }
        NodeValue::List(list) => {
            let _ = writeln!(
                out,
                "{field}Ordered: {}\n{field}Start: {}\n{field}Marker: {}\n{field}Tight: {}\n{field}BlankBefore: {}",
                list.is_ordered(),
                list.start.unwrap_or_default(),
                list.marker,
                list.tight,
                list.blank_before
            );
        }
        NodeValue::ListItem { offset } => {
            let _ = writeln!(out, "{field}Offset: {offset}");
        }
        NodeValue::DefinitionDetails { tight } => {
            let _ = writeln!(out, "{field}Tight: {tight}");
        }
        NodeValue::CodeBlock { lines } | NodeValue::RawHtml { segments: lines } => {
            let _ = writeln!(out, "{field}Lines: {lines:?}");
        }
        NodeValue::FencedCodeBlock { info, lines, .. } => {
            let _ = writeln!(out, "{field}Info: {info:?}\n{field}Lines: {lines:?}");
        }
        NodeValue::HtmlBlock { lines, closure } => {
            let _ = writeln!(out, "{field}Lines: {lines:?}\n{field}Closure: {closure:?}");
        }
        NodeValue::Table { alignments } => {
            let _ = writeln!(out, "{field}Alignments: {alignments:?}");
        }
        NodeValue::Text(text) => {
            let raw = source.get(text.segment.clone()).unwrap_or_default();
            let _ = writeln!(
                out,
                "{field}Text: {raw:?}\n{field}Raw: {}\n{field}SoftLineBreak: {}\n{field}HardLineBreak: {}",
                text.raw, text.soft_break, text.hard_break
            );
        }
        NodeValue::String(value) => {
            let _ = writeln!(out, "{field}Value: {value:?}");
        }
        NodeValue::Emphasis { level } => {
            let _ = writeln!(out, "{field}Level: {level}");
        }
        NodeValue::CodeSpan { delimiter } => {
            let _ = writeln!(out, "{field}Delimiter: {delimiter}");
        }
        NodeValue::Link(link) | NodeValue::Image(link) => {
            let _ = writeln!(
                out,
                "{field}Destination: {:?}\n{field}Title: {:?}",
                link.destination, link.title
            );
        }
        NodeValue::AutoLink { url, email } => {
            let _ = writeln!(out, "{field}URL: {url:?}\n{field}Email: {email}");
        }
        _ => {}
    }
    for attr in node.attributes.iter() {
        let _ = writeln!(
            out,
            "{field}Attribute: {}={}",
            attr.name,
            attr.value.as_deref().unwrap_or_default()
        );
    }
    for child in &node.children {
        dump_node(child, source, level + 1, out);
    }
    let _ = writeln!(out, "{indent}}}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordinals_are_dense() {
        for (index, kind) in NodeKind::ALL.iter().enumerate() {
            assert_eq!(kind.ordinal(), index);
        }
    }

    #[test]
    fn test_attributes_preserve_insertion_order() {
        let mut attrs = Attributes::new();
        attrs.push("id", Some("intro".to_owned()));
        attrs.push("class", Some("wide".to_owned()));
        attrs.push("data-x", Some("1".to_owned()));
        let names: Vec<_> = attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["id", "class", "data-x"]);
    }

    #[test]
    fn test_attributes_set_replaces_first() {
        let mut attrs = Attributes::new();
        attrs.push("rel", Some("nofollow".to_owned()));
        attrs.set("rel", "noreferrer");
        attrs.set("target", "_blank");
        assert_eq!(attrs.get("rel"), Some("noreferrer"));
        assert_eq!(attrs.get("target"), Some("_blank"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_plain_text_joins_breaks_with_space() {
        let text = |literal: &str, soft_break| {
            Node::new(
                NodeValue::Text(TextData {
                    segment: 0..0,
                    literal: literal.to_owned(),
                    raw: false,
                    soft_break,
                    hard_break: false,
                }),
                0..0,
            )
        };
        let para = Node::new(NodeValue::Paragraph, 0..0)
            .with_children(vec![text("one", true), text("two", false)]);
        assert_eq!(para.plain_text(), "one two");
    }

    #[test]
    fn test_dump_lists_kinds() {
        let root = Node::new(NodeValue::Document, 0..0)
            .with_children(vec![Node::new(NodeValue::ThematicBreak, 0..3)]);
        let doc = Document::new("***", root);
        assert_eq!(doc.dump(), "Document {\n    ThematicBreak {\n    }\n}\n");
    }
}
