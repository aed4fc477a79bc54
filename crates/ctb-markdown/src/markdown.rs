//! Markdown target: writes a document tree back as canonical Markdown.
//!
//! Text is copied from the source segments, so escapes, entities and inline
//! spelling survive. Block structure is regenerated: list markers, fences and
//! quote prefixes are written by the rules here, continuation lines get the
//! padding of every enclosing quote and list item, and separators between
//! sibling blocks come from the dispatcher.

use crate::ast::{Alignment, LinkData, Node, NodeKind, NodeValue};
use crate::error::RenderError;
use crate::renderer::{Frame, NodeRenderer, Registry, RenderState, Visit, WalkStatus};

type RuleResult = Result<WalkStatus, RenderError>;

/// Rule set for the Markdown target.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRules;

impl NodeRenderer for MarkdownRules {
    fn register_funcs(&self, registry: &mut Registry) {
        registry.register(NodeKind::Heading, render_heading);
        registry.register(NodeKind::Blockquote, render_blockquote);
        registry.register(NodeKind::CodeBlock, render_code_block);
        registry.register(NodeKind::FencedCodeBlock, render_fenced_code_block);
        registry.register(NodeKind::HtmlBlock, render_html_block);
        registry.register(NodeKind::ListItem, render_list_item);
        registry.register(NodeKind::ThematicBreak, render_thematic_break);
        registry.register(NodeKind::TableHead, render_table_head);
        registry.register(NodeKind::TableRow, render_table_row);
        registry.register(NodeKind::TableCell, render_table_cell);
        registry.register(NodeKind::DefinitionDetails, render_definition_details);
        registry.register(NodeKind::Text, render_text);
        registry.register(NodeKind::String, render_string);
        registry.register(NodeKind::Emphasis, render_emphasis);
        registry.register(NodeKind::CodeSpan, render_code_span);
        registry.register(NodeKind::Link, render_link);
        registry.register(NodeKind::Image, render_image);
        registry.register(NodeKind::AutoLink, render_auto_link);
        registry.register(NodeKind::RawHtml, render_raw_html);
    }
}

fn render_heading(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Heading { level } = visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if entering {
        state.write_str(&"#".repeat(usize::from(level)))?;
        state.write_char(' ')?;
        return Ok(WalkStatus::Continue);
    }

    let attributes = &visit.node.attributes;
    if !attributes.is_empty() {
        let parts: Vec<String> = attributes
            .iter()
            .map(|attr| match (attr.name.as_str(), attr.value.as_deref()) {
                ("id", Some(value)) => format!("#{value}"),
                ("class", Some(value)) => format!(".{value}"),
                (name, Some(value)) => format!("{name}={value}"),
                (name, None) => name.to_owned(),
            })
            .collect();
        state.write_str(" {")?;
        state.write_str(&parts.join(" "))?;
        state.write_char('}')?;
    }
    Ok(WalkStatus::Continue)
}

fn render_blockquote(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        state.write_str("> ")?;
        state.context().push("> ");
    } else {
        state.context().pop()?;
    }
    Ok(WalkStatus::Continue)
}

/// Padding before a verbatim content line; empty lines get no trailing spaces.
fn pad_line(state: &mut RenderState<'_, '_>, line: &str) -> Result<(), RenderError> {
    if line == "\n" {
        state.blank_pad()?;
    } else {
        state.pad()?;
    }
    Ok(())
}

fn render_code_block(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::CodeBlock { lines } = &visit.node.value else {
        return Ok(WalkStatus::SkipChildren);
    };
    if !entering {
        return Ok(WalkStatus::Continue);
    }
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            pad_line(state, line)?;
        }
        if line != "\n" {
            state.write_str("    ")?;
        }
        state.write_str(line)?;
    }
    if lines.last().is_some_and(|line| !line.ends_with('\n')) {
        state.write_str("\n")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_fenced_code_block(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::FencedCodeBlock {
        info,
        lines,
        content_end,
    } = &visit.node.value
    else {
        return Ok(WalkStatus::Continue);
    };
    let closing = state.slice(&(*content_end..visit.node.span.end));
    let marker = fence_marker(closing, lines, info);

    if entering {
        state.write_str(&marker)?;
        state.write_str(info)?;
        state.write_str("\n")?;
        for line in lines {
            pad_line(state, line)?;
            state.write_str(line)?;
        }
    } else {
        if lines.last().is_some_and(|line| !line.ends_with('\n')) {
            state.write_str("\n")?;
        }
        state.pad()?;
        state.write_str(&marker)?;
    }
    Ok(WalkStatus::Continue)
}

/// Fence for a code block.
///
/// `closing` is the source after the last content line, where the closing
/// fence sits behind any container prefix. The fence keeps the character and
/// length found there, falls back to three backticks and grows past any run
/// of the same character that starts a content line.
fn fence_marker(closing: &str, lines: &[String], info: &str) -> String {
    let line = closing.split('\n').next().unwrap_or_default();
    let line = line.trim_start_matches([' ', '\t', '>']);

    let (mut ch, mut len) = match line.chars().next() {
        Some(c @ ('`' | '~')) => (c, line.chars().take_while(|&x| x == c).count()),
        _ => ('`', 3),
    };
    if len < 3 {
        ch = '`';
        len = 3;
    }
    // Backticks are not allowed in the info string of a backtick fence.
    if ch == '`' && info.contains('`') {
        ch = '~';
    }
    let longest = lines
        .iter()
        .map(|line| {
            line.trim_start_matches(' ')
                .chars()
                .take_while(|&x| x == ch)
                .count()
        })
        .max()
        .unwrap_or(0);
    if longest >= len {
        len = longest + 1;
    }
    ch.to_string().repeat(len)
}

fn render_html_block(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::HtmlBlock { lines, closure } = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if entering {
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                pad_line(state, line)?;
            }
            state.write_str(line)?;
        }
        return Ok(WalkStatus::Continue);
    }

    let last = match closure {
        Some(closure) => {
            if !lines.is_empty() {
                state.pad()?;
            }
            state.write_str(closure)?;
            Some(closure)
        }
        None => lines.last(),
    };
    if last.is_some_and(|line| !line.ends_with('\n')) {
        state.write_str("\n")?;
    }
    Ok(WalkStatus::Continue)
}

/// Bullet for an unordered list. Lists directly following another bullet
/// list alternate markers, otherwise they would merge on re-parse.
fn bullet(list: Frame<'_>) -> char {
    let adjacent = list
        .preceding()
        .take_while(|node| matches!(&node.value, NodeValue::List(data) if !data.is_ordered()))
        .count();
    if adjacent % 2 == 0 { '-' } else { '*' }
}

fn render_list_item(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let Some(parent) = visit.parent() else {
        return Err(RenderError::structure(NodeKind::ListItem, "list item without a parent"));
    };
    let NodeValue::List(list) = &parent.node.value else {
        return Err(RenderError::structure(
            NodeKind::ListItem,
            format!("list item inside {}", parent.node.kind()),
        ));
    };
    if !entering {
        state.context().pop()?;
        return Ok(WalkStatus::Continue);
    }

    let prefix = match list.start {
        Some(start) => format!("{}{} ", start + visit.frame().index() as u64, list.marker),
        None => format!("{} ", bullet(parent)),
    };
    let offset = match visit.node.value {
        NodeValue::ListItem { offset } => offset,
        _ => prefix.len(),
    };
    if offset > prefix.len() {
        state.write_str(&" ".repeat(offset - prefix.len()))?;
    }
    state.write_str(&prefix)?;
    state.context().push(" ".repeat(offset.max(prefix.len())));
    Ok(WalkStatus::Continue)
}

fn render_thematic_break(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        state.write_str("***\n")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn delimiter_cell(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::None => "---",
        Alignment::Left => ":--",
        Alignment::Center => ":-:",
        Alignment::Right => "--:",
    }
}

fn render_table_head(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        state.write_char('|')?;
        return Ok(WalkStatus::Continue);
    }
    let Some(NodeValue::Table { alignments }) = visit.parent().map(|p| &p.node.value) else {
        return Err(RenderError::structure(NodeKind::TableHead, "table head outside a table"));
    };
    state.write_str("\n")?;
    state.pad()?;
    state.write_char('|')?;
    for alignment in alignments {
        state.write_char(' ')?;
        state.write_str(delimiter_cell(*alignment))?;
        state.write_str(" |")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_table_row(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        state.write_char('|')?;
    }
    Ok(WalkStatus::Continue)
}

fn render_table_cell(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    state.write_str(if entering { " " } else { " |" })?;
    Ok(WalkStatus::Continue)
}

fn render_definition_details(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        state.write_str(": ")?;
        state.context().push("  ");
    } else {
        state.context().pop()?;
    }
    Ok(WalkStatus::Continue)
}

/// Write verbatim text, padding after every embedded newline.
fn write_verbatim(state: &mut RenderState<'_, '_>, text: &str) -> Result<(), RenderError> {
    let mut lines = text.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        state.write_str(line)?;
        if line.ends_with('\n') && lines.peek().is_some() {
            state.pad()?;
        }
    }
    Ok(())
}

fn render_text(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Text(text) = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        return Ok(WalkStatus::Continue);
    }

    let source = state.slice(&text.segment);
    if text.raw {
        write_verbatim(state, source)?;
    } else if source.is_empty() {
        state.write_str(&text.literal)?;
    } else {
        state.write_str(source)?;
    }

    if text.hard_break || text.soft_break {
        if visit.within(NodeKind::Heading) {
            state.write_char(' ')?;
        } else {
            if text.hard_break {
                state.write_char('\\')?;
            }
            state.write_str("\n")?;
            state.pad()?;
        }
    }
    Ok(WalkStatus::Continue)
}

fn render_string(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    if entering && let NodeValue::String(value) = &visit.node.value {
        state.write_str(value)?;
    }
    Ok(WalkStatus::Continue)
}

/// Emphasis marker as written in the source, `*` when it cannot be told.
fn emphasis_marker(source: &str, node: &Node) -> char {
    let bytes = source.as_bytes();
    let before_text = node.children.first().and_then(|child| match &child.value {
        NodeValue::Text(text) => text.segment.start.checked_sub(1),
        _ => None,
    });
    [before_text, Some(node.span.start)]
        .into_iter()
        .flatten()
        .filter_map(|index| bytes.get(index).copied())
        .find(|&b| b == b'*' || b == b'_')
        .map_or('*', char::from)
}

fn render_emphasis(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    _entering: bool,
) -> RuleResult {
    let NodeValue::Emphasis { level } = visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    let marker = emphasis_marker(state.source(), visit.node);
    state.write_str(&marker.to_string().repeat(usize::from(level)))?;
    Ok(WalkStatus::Continue)
}

/// Body of a code span rebuilt from normalized content: a space is added on
/// both sides when the content would otherwise merge with the delimiters or
/// lose its own surrounding spaces.
fn code_span_body(code: &str) -> String {
    let needs_space = code.starts_with('`')
        || code.ends_with('`')
        || (code.len() > 1
            && code.starts_with(' ')
            && code.ends_with(' ')
            && !code.trim().is_empty());
    if needs_space {
        format!(" {code} ")
    } else {
        code.to_owned()
    }
}

fn render_code_span(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::CodeSpan { delimiter } = visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        return Ok(WalkStatus::Continue);
    }
    let fence = "`".repeat(delimiter);
    state.write_str(&fence)?;
    for child in &visit.node.children {
        match &child.value {
            NodeValue::Text(text) => {
                let raw = state.slice(&text.segment);
                write_verbatim(state, raw)?;
            }
            NodeValue::String(code) => state.write_str(&code_span_body(code))?,
            _ => {}
        }
    }
    state.write_str(&fence)?;
    Ok(WalkStatus::SkipChildren)
}

/// Link destination in a form that parses back to the same string.
fn format_destination(destination: &str, has_title: bool) -> String {
    if destination.is_empty() {
        return if has_title { "<>".to_owned() } else { String::new() };
    }
    if destination
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
    {
        let mut out = String::from("<");
        for c in destination.chars() {
            if matches!(c, '<' | '>' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('>');
        return out;
    }

    let mut depth = 0i32;
    let mut balanced = true;
    for c in destination.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                balanced &= depth >= 0;
            }
            _ => {}
        }
    }
    let balanced = balanced && depth == 0;

    let mut out = String::with_capacity(destination.len());
    let mut chars = destination.chars().peekable();
    while let Some(c) = chars.next() {
        let escape = match c {
            '(' | ')' => !balanced,
            '\\' => chars.peek().is_some_and(char::is_ascii_punctuation),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn format_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len() + 2);
    out.push('"');
    for c in title.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_link_tail(state: &mut RenderState<'_, '_>, link: &LinkData) -> Result<(), RenderError> {
    state.write_str("](")?;
    state.write_str(&format_destination(&link.destination, link.title.is_some()))?;
    if let Some(title) = &link.title {
        state.write_char(' ')?;
        state.write_str(&format_title(title))?;
    }
    state.write_char(')')?;
    Ok(())
}

fn render_link(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Link(link) = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if entering {
        state.write_char('[')?;
    } else {
        write_link_tail(state, link)?;
    }
    Ok(WalkStatus::Continue)
}

fn render_image(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Image(link) = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        return Ok(WalkStatus::Continue);
    }
    state.write_str("![")?;
    let children = &visit.node.children;
    if let (Some(first), Some(last)) = (children.first(), children.last()) {
        let alt = state.slice(&(first.span.start..last.span.end));
        write_verbatim(state, alt)?;
    }
    write_link_tail(state, link)?;
    Ok(WalkStatus::SkipChildren)
}

fn render_auto_link(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::AutoLink { url, .. } = &visit.node.value else {
        return Ok(WalkStatus::SkipChildren);
    };
    if entering {
        let label = state.slice(&visit.node.span);
        if label.is_empty() {
            state.write_char('<')?;
            state.write_str(url)?;
            state.write_char('>')?;
        } else {
            state.write_str(label)?;
        }
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_raw_html(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering && let NodeValue::RawHtml { segments } = &visit.node.value {
        for segment in segments {
            state.write_str(segment)?;
        }
    }
    Ok(WalkStatus::SkipChildren)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{Document, ListData};
    use crate::parse::{ParseOptions, parse};
    use crate::renderer::Renderer;

    fn renderer() -> Renderer {
        Renderer::builder()
            .provider(MarkdownRules, 500)
            .with_block_separators(true)
            .build()
            .unwrap()
    }

    fn render(source: &str) -> String {
        let doc = parse(source, &ParseOptions::markdown());
        let mut out = Vec::new();
        renderer().render(&doc, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_fence_marker_from_closing_line() {
        assert_eq!(fence_marker("~~~~\n", &[], ""), "~~~~");
        assert_eq!(fence_marker("  > ```\n", &[], "go"), "```");
        assert_eq!(fence_marker("", &[], ""), "```");
    }

    #[test]
    fn test_fence_marker_outgrows_content() {
        let lines = vec!["````\n".to_owned()];
        assert_eq!(fence_marker("```\n", &lines, ""), "`````");
    }

    #[test]
    fn test_fence_marker_avoids_backtick_info() {
        assert_eq!(fence_marker("```\n", &[], "a`b"), "~~~");
    }

    #[test]
    fn test_format_destination() {
        assert_eq!(format_destination("/a/b", false), "/a/b");
        assert_eq!(format_destination("my file.md", false), "<my file.md>");
        assert_eq!(format_destination("a(b)", false), "a(b)");
        assert_eq!(format_destination("a)b", false), r"a\)b");
        assert_eq!(format_destination("", true), "<>");
    }

    #[test]
    fn test_format_title_escapes_quotes() {
        assert_eq!(format_title(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
    }

    #[test]
    fn test_code_span_body() {
        assert_eq!(code_span_body("a"), "a");
        assert_eq!(code_span_body("`a"), " `a ");
        assert_eq!(code_span_body(" a "), "  a  ");
        assert_eq!(code_span_body("  "), "  ");
    }

    #[test]
    fn test_list_item_outside_list_is_structural_error() {
        let item = Node::new(NodeValue::ListItem { offset: 2 }, 0..0);
        let root = Node::new(NodeValue::Document, 0..0).with_children(vec![item]);
        let doc = Document::new("", root);
        let err = renderer().render(&doc, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Structure {
                kind: NodeKind::ListItem,
                ..
            }
        ));
    }

    #[test]
    fn test_adjacent_bullet_lists_alternate() {
        let list = |children| {
            Node::new(
                NodeValue::List(ListData {
                    start: None,
                    marker: '-',
                    tight: true,
                    blank_before: true,
                }),
                0..0,
            )
            .with_children(children)
        };
        let item = || Node::new(NodeValue::ListItem { offset: 2 }, 0..0);
        let root = Node::new(NodeValue::Document, 0..0)
            .with_children(vec![list(vec![item()]), list(vec![item()])]);
        let doc = Document::new("", root);
        let mut out = Vec::new();
        renderer().render(&doc, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "- \n\n* ");
    }

    #[test]
    fn test_heading_attributes() {
        assert_eq!(
            render("# Title {#intro .wide}\n"),
            "# Title {#intro .wide}"
        );
    }

    #[test]
    fn test_setext_heading_becomes_atx() {
        assert_eq!(render("Title\n=====\n"), "# Title");
    }

    #[test]
    fn test_emphasis_keeps_markers() {
        assert_eq!(render("*a* _b_ **c** __d__"), "*a* _b_ **c** __d__");
    }

    #[test]
    fn test_hard_break_normalized_to_backslash() {
        assert_eq!(render("one  \ntwo"), "one\\\ntwo");
        assert_eq!(render("one\\\ntwo"), "one\\\ntwo");
    }

    #[test]
    fn test_blockquote_keeps_blank_lines_inside() {
        assert_eq!(render("> one\n>\n> two\n"), "> one\n>\n> two");
    }

    #[test]
    fn test_nested_list_padding() {
        assert_eq!(render("- a\n  - b\n- c\n"), "- a\n  - b\n- c");
    }

    #[test]
    fn test_ordered_list_numbered_sequentially() {
        assert_eq!(render("3. a\n3. b\n3. c\n"), "3. a\n4. b\n5. c");
    }

    #[test]
    fn test_code_span_delimiter_kept() {
        assert_eq!(render("``a ` b``"), "``a ` b``");
    }

    #[test]
    fn test_indented_code_then_paragraph() {
        assert_eq!(render("    code\n\npara\n"), "    code\n\npara");
    }

    #[test]
    fn test_thematic_break() {
        assert_eq!(render("a\n\n---\n\nb\n"), "a\n\n***\n\nb");
    }

    #[test]
    fn test_table() {
        assert_eq!(
            render("| a | b |\n|:--|--:|\n| 1 | 2 |\n"),
            "| a | b |\n| :-- | --: |\n| 1 | 2 |"
        );
    }

    #[test]
    fn test_definition_list() {
        assert_eq!(render("term\n: details\n"), "term\n: details");
    }

    #[test]
    fn test_loose_definition_keeps_blank_line() {
        assert_eq!(render("term\n\n: loose\n"), "term\n\n: loose");
    }

    #[test]
    fn test_tight_item_blocks_stay_adjacent() {
        assert_eq!(render("- # H\n  para\n"), "- # H\n  para");
    }

    #[test]
    fn test_link_and_image() {
        assert_eq!(
            render(r#"[a](/x "t") ![b *c*](i.png)"#),
            r#"[a](/x "t") ![b *c*](i.png)"#
        );
    }

    #[test]
    fn test_reference_link_becomes_inline() {
        assert_eq!(render("[a][r]\n\n[r]: /x\n"), "[a](/x)");
    }

    #[test]
    fn test_bare_url_kept_verbatim() {
        assert_eq!(
            render("see https://example.com now"),
            "see https://example.com now"
        );
    }
}
