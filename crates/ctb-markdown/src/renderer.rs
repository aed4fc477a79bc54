//! Tree-walking dispatcher with a dense rule table.
//!
//! Rule providers ([`NodeRenderer`]) register one [`RenderFn`] per node kind
//! into a [`Registry`]. [`RendererBuilder::build`] resolves the registrations
//! once into an immutable [`Renderer`] that can be shared between threads and
//! reused for any number of renders.

use std::io::{self, BufWriter, Write};

use crate::ast::{Document, Node, NodeKind, NodeValue};
use crate::context::Context;
use crate::error::RenderError;

/// What the walk does after a rule returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// Descend into children (on enter) and keep walking.
    Continue,
    /// The rule rendered the children itself.
    SkipChildren,
    /// Stop the whole walk.
    Stop,
}

/// Rendering rule, called with `entering = true` before the children and
/// `entering = false` after them.
pub type RenderFn =
    fn(&mut RenderState<'_, '_>, &Visit<'_>, bool) -> Result<WalkStatus, RenderError>;

/// Provider of rendering rules.
pub trait NodeRenderer {
    /// Register the provider's rules.
    fn register_funcs(&self, registry: &mut Registry);
}

#[derive(Clone, Copy)]
struct Slot {
    func: RenderFn,
    priority: i32,
    provider: usize,
}

/// Collects rule registrations while a renderer is being built.
pub struct Registry {
    slots: [Option<Slot>; NodeKind::COUNT],
    priority: i32,
    provider: usize,
    conflict: Option<RenderError>,
}

impl Registry {
    fn new() -> Self {
        Self {
            slots: [None; NodeKind::COUNT],
            priority: 0,
            provider: 0,
            conflict: None,
        }
    }

    /// Register `func` for `kind` on behalf of the current provider.
    ///
    /// Lower priority values take precedence. Registering a kind already
    /// claimed by another provider with the same priority is an error
    /// reported by [`RendererBuilder::build`].
    pub fn register(&mut self, kind: NodeKind, func: RenderFn) {
        let incoming = Slot {
            func,
            priority: self.priority,
            provider: self.provider,
        };
        match self.slots[kind.ordinal()] {
            Some(existing)
                if existing.priority == incoming.priority
                    && existing.provider != incoming.provider =>
            {
                if self.conflict.is_none() {
                    self.conflict = Some(RenderError::AmbiguousRegistration {
                        kind,
                        priority: incoming.priority,
                    });
                }
            }
            Some(existing) if existing.priority < incoming.priority => {}
            _ => self.slots[kind.ordinal()] = Some(incoming),
        }
    }
}

/// Builder for [`Renderer`].
#[derive(Default)]
pub struct RendererBuilder {
    providers: Vec<(i32, Box<dyn NodeRenderer + Send + Sync>)>,
    block_separators: bool,
    verbose: bool,
}

impl RendererBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule provider. Lower `priority` values win over higher ones.
    #[must_use]
    pub fn provider<P>(mut self, provider: P, priority: i32) -> Self
    where
        P: NodeRenderer + Send + Sync + 'static,
    {
        self.providers.push((priority, Box::new(provider)));
        self
    }

    /// Insert newlines and padding between sibling blocks (Markdown target).
    #[must_use]
    pub fn with_block_separators(mut self, enabled: bool) -> Self {
        self.block_separators = enabled;
        self
    }

    /// Prefix every padding emission with a running counter.
    #[must_use]
    pub fn with_verbose_padding(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Resolve all registrations into a dispatch table.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::AmbiguousRegistration` when two providers with
    /// the same priority register the same node kind.
    pub fn build(mut self) -> Result<Renderer, RenderError> {
        self.providers.sort_by_key(|(priority, _)| *priority);

        let mut registry = Registry::new();
        for (index, (priority, provider)) in self.providers.iter().enumerate() {
            registry.priority = *priority;
            registry.provider = index;
            provider.register_funcs(&mut registry);
        }
        if let Some(conflict) = registry.conflict {
            return Err(conflict);
        }

        let funcs = registry.slots.map(|slot| slot.map(|slot| slot.func));
        tracing::debug!(
            providers = self.providers.len(),
            kinds = funcs.iter().flatten().count(),
            "Built dispatch table"
        );

        Ok(Renderer {
            funcs,
            block_separators: self.block_separators,
            verbose: self.verbose,
        })
    }
}

/// Immutable renderer: a dispatch table plus walk options.
pub struct Renderer {
    funcs: [Option<RenderFn>; NodeKind::COUNT],
    block_separators: bool,
    verbose: bool,
}

impl Renderer {
    #[must_use]
    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    /// Whether a rule is registered for `kind`.
    #[must_use]
    pub fn handles(&self, kind: NodeKind) -> bool {
        self.funcs[kind.ordinal()].is_some()
    }

    /// Render `doc` into `sink`.
    ///
    /// The sink is buffered and flushed once after a successful walk. On error
    /// the output may be incomplete.
    ///
    /// # Errors
    ///
    /// Returns the first rule error or sink failure.
    pub fn render<W: Write>(&self, doc: &Document<'_>, sink: W) -> Result<(), RenderError> {
        let open = self.render_padded(doc, sink)?;
        if open > 0 {
            tracing::warn!(depth = open, "Padding left open after render");
        }
        Ok(())
    }

    /// Render and report the padding depth left at the end of the walk.
    pub(crate) fn render_padded<W: Write>(
        &self,
        doc: &Document<'_>,
        sink: W,
    ) -> Result<usize, RenderError> {
        let mut writer = BufWriter::new(sink);
        let mut state = RenderState::new(&mut writer, doc.source(), Context::new(self.verbose));

        let root = doc.root();
        let frame = Frame {
            node: root,
            siblings: std::slice::from_ref(root),
            index: 0,
        };
        let mut path = Vec::new();
        self.walk(&mut state, frame, &mut path)?;

        let open = state.context.depth();
        drop(state);
        writer.flush()?;
        Ok(open)
    }

    fn walk<'a>(
        &self,
        state: &mut RenderState<'_, '_>,
        frame: Frame<'a>,
        path: &mut Vec<Frame<'a>>,
    ) -> Result<WalkStatus, RenderError> {
        let node = frame.node;
        let func = self.funcs[node.kind().ordinal()];
        let mark = state.context.depth();

        let mut status = WalkStatus::Continue;
        if let Some(func) = func {
            status = func(state, &Visit::new(frame, path), true)?;
            if status == WalkStatus::Stop {
                return Ok(WalkStatus::Stop);
            }
        }

        if status != WalkStatus::SkipChildren {
            path.push(frame);
            for index in 0..node.children.len() {
                let child = Frame {
                    node: &node.children[index],
                    siblings: &node.children,
                    index,
                };
                if self.walk(state, child, path)? == WalkStatus::Stop {
                    path.pop();
                    return Ok(WalkStatus::Stop);
                }
            }
            path.pop();
        }

        if let Some(func) = func
            && func(state, &Visit::new(frame, path), false)? == WalkStatus::Stop
        {
            return Ok(WalkStatus::Stop);
        }

        let leaked = state.context.unwind(mark);
        if leaked > 0 {
            tracing::warn!(kind = %node.kind(), leaked, "Rule left padding open");
        }

        if self.block_separators
            && node.kind().is_block()
            && let Some(next) = frame.next()
        {
            let mut ancestors = path.iter().rev().map(|frame| frame.node);
            let parent = ancestors.next();
            let grandparent = ancestors.next();
            write_separator(state, separator(node, parent, grandparent, next))?;
        }

        Ok(WalkStatus::Continue)
    }
}

/// Newlines between two sibling blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Separator {
    Newline,
    BlankLine,
}

/// Sibling separator for the Markdown target.
pub(crate) fn separator(
    current: &Node,
    parent: Option<&Node>,
    grandparent: Option<&Node>,
    next: &Node,
) -> Separator {
    let is_tight_list = |node: Option<&Node>| {
        matches!(node.map(|n| &n.value), Some(NodeValue::List(list)) if list.tight)
    };
    let tight_item = current.kind() == NodeKind::ListItem && is_tight_list(parent);
    // A blank line between blocks of an item would loosen its list.
    let in_tight_item =
        parent.is_some_and(|p| p.kind() == NodeKind::ListItem) && is_tight_list(grandparent);
    // Lists may interrupt a paragraph when they are bullet lists or start at 1.
    let interrupting_list = matches!(
        &next.value,
        NodeValue::List(list) if list.start.is_none_or(|start| start == 1) && !list.blank_before
    );
    // These blocks terminate their last line themselves.
    let self_terminated = matches!(
        current.kind(),
        NodeKind::HtmlBlock | NodeKind::CodeBlock | NodeKind::ThematicBreak
    );
    let table_row = matches!(current.kind(), NodeKind::TableHead | NodeKind::TableRow);
    let definition = matches!(
        current.kind(),
        NodeKind::DefinitionTerm | NodeKind::DefinitionDetails
    ) && matches!(next.value, NodeValue::DefinitionDetails { tight: true });

    if tight_item
        || in_tight_item
        || interrupting_list
        || self_terminated
        || table_row
        || definition
    {
        Separator::Newline
    } else {
        Separator::BlankLine
    }
}

fn write_separator(
    state: &mut RenderState<'_, '_>,
    separator: Separator,
) -> Result<(), RenderError> {
    // A block that ended its own line leaves an unpadded line start behind.
    if state.at_line_start() {
        state.blank_pad()?;
    }
    if separator == Separator::BlankLine {
        state.write_str("\n")?;
        state.blank_pad()?;
    }
    state.write_str("\n")?;
    state.pad()?;
    Ok(())
}

/// A node with its position among its siblings.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub node: &'a Node,
    siblings: &'a [Node],
    index: usize,
}

impl<'a> Frame<'a> {
    /// Position among siblings.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn prev(&self) -> Option<&'a Node> {
        self.index
            .checked_sub(1)
            .and_then(|index| self.siblings.get(index))
    }

    #[must_use]
    pub fn next(&self) -> Option<&'a Node> {
        self.siblings.get(self.index + 1)
    }

    /// Siblings before this node, nearest first.
    pub fn preceding(&self) -> impl Iterator<Item = &'a Node> + use<'a> {
        self.siblings[..self.index].iter().rev()
    }
}

/// What a rule sees: the node, its siblings and the chain of ancestors.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub node: &'a Node,
    frame: Frame<'a>,
    ancestors: &'a [Frame<'a>],
}

impl<'a> Visit<'a> {
    fn new(frame: Frame<'a>, ancestors: &'a [Frame<'a>]) -> Self {
        Self {
            node: frame.node,
            frame,
            ancestors,
        }
    }

    #[must_use]
    pub fn frame(&self) -> Frame<'a> {
        self.frame
    }

    #[must_use]
    pub fn parent(&self) -> Option<Frame<'a>> {
        self.ancestors.last().copied()
    }

    /// Nearest ancestor of the given kind.
    #[must_use]
    pub fn ancestor(&self, kind: NodeKind) -> Option<Frame<'a>> {
        self.ancestors
            .iter()
            .rev()
            .find(|frame| frame.node.kind() == kind)
            .copied()
    }

    #[must_use]
    pub fn within(&self, kind: NodeKind) -> bool {
        self.ancestor(kind).is_some()
    }

    #[must_use]
    pub fn next(&self) -> Option<&'a Node> {
        self.frame.next()
    }

    #[must_use]
    pub fn prev(&self) -> Option<&'a Node> {
        self.frame.prev()
    }
}

/// Output sink that remembers the last byte written.
struct Sink<'w> {
    inner: &'w mut dyn Write,
    last: Option<u8>,
}

impl Write for Sink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if written > 0 {
            self.last = Some(buf[written - 1]);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Mutable state shared by the rules during one render.
pub struct RenderState<'w, 'src> {
    sink: Sink<'w>,
    source: &'src str,
    context: Context,
}

impl<'w, 'src> RenderState<'w, 'src> {
    fn new(out: &'w mut dyn Write, source: &'src str, context: Context) -> Self {
        Self {
            sink: Sink {
                inner: out,
                last: None,
            },
            source,
            context,
        }
    }

    #[must_use]
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Source text of a byte range, empty when out of range.
    #[must_use]
    pub fn slice(&self, segment: &std::ops::Range<usize>) -> &'src str {
        self.source.get(segment.clone()).unwrap_or_default()
    }

    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.sink.write_all(s.as_bytes())
    }

    pub fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0; 4];
        self.write_str(c.encode_utf8(&mut buf))
    }

    /// Whether the output ends with a newline.
    #[must_use]
    pub fn at_line_start(&self) -> bool {
        self.sink.last == Some(b'\n')
    }

    pub fn context(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Write the padding of every open level.
    pub fn pad(&mut self) -> io::Result<()> {
        self.context.emit_padding(&mut self.sink)
    }

    /// Write the padding for a line that stays empty.
    pub fn blank_pad(&mut self) -> io::Result<()> {
        self.context.emit_blank_padding(&mut self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ListData, TextData};

    struct Plain;

    fn render_text(
        state: &mut RenderState<'_, '_>,
        visit: &Visit<'_>,
        entering: bool,
    ) -> Result<WalkStatus, RenderError> {
        if entering && let NodeValue::Text(text) = &visit.node.value {
            state.write_str(&text.literal)?;
        }
        Ok(WalkStatus::Continue)
    }

    impl NodeRenderer for Plain {
        fn register_funcs(&self, registry: &mut Registry) {
            registry.register(NodeKind::Text, render_text);
        }
    }

    struct Shouting;

    fn render_text_upper(
        state: &mut RenderState<'_, '_>,
        visit: &Visit<'_>,
        entering: bool,
    ) -> Result<WalkStatus, RenderError> {
        if entering && let NodeValue::Text(text) = &visit.node.value {
            state.write_str(&text.literal.to_uppercase())?;
        }
        Ok(WalkStatus::Continue)
    }

    impl NodeRenderer for Shouting {
        fn register_funcs(&self, registry: &mut Registry) {
            registry.register(NodeKind::Text, render_text_upper);
        }
    }

    fn text(literal: &str) -> Node {
        Node::new(
            NodeValue::Text(TextData {
                segment: 0..0,
                literal: literal.to_owned(),
                raw: false,
                soft_break: false,
                hard_break: false,
            }),
            0..0,
        )
    }

    fn paragraphs(texts: &[&str]) -> Node {
        Node::new(NodeValue::Document, 0..0).with_children(
            texts
                .iter()
                .map(|t| Node::new(NodeValue::Paragraph, 0..0).with_children(vec![text(t)]))
                .collect(),
        )
    }

    fn render(renderer: &Renderer, root: Node) -> String {
        let doc = Document::new("", root);
        let mut out = Vec::new();
        renderer.render(&doc, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn list(tight: bool) -> NodeValue {
        NodeValue::List(ListData {
            start: None,
            marker: '-',
            tight,
            blank_before: false,
        })
    }

    #[test]
    fn test_unregistered_kinds_render_children() {
        let renderer = Renderer::builder().provider(Plain, 0).build().unwrap();
        assert_eq!(render(&renderer, paragraphs(&["a", "b"])), "ab");
    }

    #[test]
    fn test_block_separators_between_paragraphs() {
        let renderer = Renderer::builder()
            .provider(Plain, 0)
            .with_block_separators(true)
            .build()
            .unwrap();
        assert_eq!(render(&renderer, paragraphs(&["a", "b"])), "a\n\nb");
    }

    #[test]
    fn test_lower_priority_value_wins() {
        let renderer = Renderer::builder()
            .provider(Plain, 500)
            .provider(Shouting, 100)
            .build()
            .unwrap();
        assert_eq!(render(&renderer, paragraphs(&["a"])), "A");

        let renderer = Renderer::builder()
            .provider(Shouting, 500)
            .provider(Plain, 100)
            .build()
            .unwrap();
        assert_eq!(render(&renderer, paragraphs(&["a"])), "a");
    }

    #[test]
    fn test_same_priority_same_kind_is_ambiguous() {
        let result = Renderer::builder()
            .provider(Plain, 400)
            .provider(Shouting, 400)
            .build();
        assert!(matches!(
            result,
            Err(RenderError::AmbiguousRegistration {
                kind: NodeKind::Text,
                priority: 400
            })
        ));
    }

    #[test]
    fn test_renderer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Renderer>();
    }

    #[test]
    fn test_separator_tight_item() {
        let item = Node::new(NodeValue::ListItem { offset: 2 }, 0..0);
        let tight = Node::new(list(true), 0..0);
        let loose = Node::new(list(false), 0..0);
        assert_eq!(separator(&item, Some(&tight), None, &item), Separator::Newline);
        assert_eq!(separator(&item, Some(&loose), None, &item), Separator::BlankLine);
    }

    #[test]
    fn test_separator_list_interrupting_paragraph() {
        let para = Node::new(NodeValue::Paragraph, 0..0);
        let bullets = Node::new(list(true), 0..0);
        let ordered_from_two = Node::new(
            NodeValue::List(ListData {
                start: Some(2),
                marker: '.',
                tight: true,
                blank_before: false,
            }),
            0..0,
        );
        let after_blank = Node::new(
            NodeValue::List(ListData {
                start: Some(1),
                marker: '.',
                tight: true,
                blank_before: true,
            }),
            0..0,
        );
        assert_eq!(separator(&para, None, None, &bullets), Separator::Newline);
        assert_eq!(separator(&para, None, None, &ordered_from_two), Separator::BlankLine);
        assert_eq!(separator(&para, None, None, &after_blank), Separator::BlankLine);
    }

    #[test]
    fn test_separator_code_and_html_blocks() {
        let para = Node::new(NodeValue::Paragraph, 0..0);
        let code = Node::new(NodeValue::CodeBlock { lines: Vec::new() }, 0..0);
        let html = Node::new(
            NodeValue::HtmlBlock {
                lines: Vec::new(),
                closure: None,
            },
            0..0,
        );
        assert_eq!(separator(&code, None, None, &para), Separator::Newline);
        assert_eq!(separator(&html, None, None, &para), Separator::Newline);
        assert_eq!(separator(&para, None, None, &para), Separator::BlankLine);
    }

    #[test]
    fn test_separator_inside_tight_item() {
        let heading = Node::new(NodeValue::Heading { level: 1 }, 0..0);
        let para = Node::new(NodeValue::Paragraph, 0..0);
        let item = Node::new(NodeValue::ListItem { offset: 2 }, 0..0);
        let tight = Node::new(list(true), 0..0);
        let loose = Node::new(list(false), 0..0);
        assert_eq!(
            separator(&heading, Some(&item), Some(&tight), &para),
            Separator::Newline
        );
        assert_eq!(
            separator(&heading, Some(&item), Some(&loose), &para),
            Separator::BlankLine
        );
    }

    #[test]
    fn test_separator_definition_details() {
        let term = Node::new(NodeValue::DefinitionTerm, 0..0);
        let tight = Node::new(NodeValue::DefinitionDetails { tight: true }, 0..0);
        let loose = Node::new(NodeValue::DefinitionDetails { tight: false }, 0..0);
        assert_eq!(separator(&term, None, None, &tight), Separator::Newline);
        assert_eq!(separator(&term, None, None, &loose), Separator::BlankLine);
        assert_eq!(separator(&tight, None, None, &loose), Separator::BlankLine);
        assert_eq!(separator(&loose, None, None, &tight), Separator::Newline);
    }

    struct Leaky;

    fn render_leaky_paragraph(
        state: &mut RenderState<'_, '_>,
        _visit: &Visit<'_>,
        entering: bool,
    ) -> Result<WalkStatus, RenderError> {
        if entering {
            state.context().push("> ");
            state.context().push("  ");
        }
        Ok(WalkStatus::Continue)
    }

    impl NodeRenderer for Leaky {
        fn register_funcs(&self, registry: &mut Registry) {
            registry.register(NodeKind::Paragraph, render_leaky_paragraph);
        }
    }

    #[test]
    fn test_leaked_padding_is_unwound() {
        let renderer = Renderer::builder()
            .provider(Plain, 0)
            .provider(Leaky, 0)
            .with_block_separators(true)
            .build()
            .unwrap();
        let doc = Document::new("", paragraphs(&["a", "b"]));
        let mut out = Vec::new();
        assert_eq!(renderer.render_padded(&doc, &mut out).unwrap(), 0);
        // Padding is gone before the separator is written.
        assert_eq!(String::from_utf8(out).unwrap(), "a\n\nb");
    }

    struct Stopper;

    fn render_stop(
        _state: &mut RenderState<'_, '_>,
        _visit: &Visit<'_>,
        _entering: bool,
    ) -> Result<WalkStatus, RenderError> {
        Ok(WalkStatus::Stop)
    }

    impl NodeRenderer for Stopper {
        fn register_funcs(&self, registry: &mut Registry) {
            registry.register(NodeKind::Paragraph, render_stop);
        }
    }

    #[test]
    fn test_stop_ends_walk() {
        let renderer = Renderer::builder()
            .provider(Plain, 0)
            .provider(Stopper, 0)
            .build()
            .unwrap();
        assert_eq!(render(&renderer, paragraphs(&["a", "b"])), "");
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("sink closed"))
        }
    }

    #[test]
    fn test_sink_failure_propagates() {
        let renderer = Renderer::builder().provider(Plain, 0).build().unwrap();
        let doc = Document::new("", paragraphs(&["a"]));
        let err = renderer.render(&doc, FailingSink).unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }
}
