//! HTML target.
//!
//! Produces CommonMark-style HTML: block tags on their own lines, tight list
//! items without `<p>`, escaped text and attribute values, raw HTML passed
//! through untouched.

use crate::ast::{Alignment, Attributes, NodeKind, NodeValue};
use crate::error::RenderError;
use crate::renderer::{NodeRenderer, Registry, RenderState, Visit, WalkStatus};
use crate::util::{escape_html, escape_url};

type RuleResult = Result<WalkStatus, RenderError>;

/// Rule set for the HTML target.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRules;

impl NodeRenderer for HtmlRules {
    fn register_funcs(&self, registry: &mut Registry) {
        registry.register(NodeKind::Heading, render_heading);
        registry.register(NodeKind::Paragraph, render_paragraph);
        registry.register(NodeKind::Blockquote, render_blockquote);
        registry.register(NodeKind::List, render_list);
        registry.register(NodeKind::ListItem, render_list_item);
        registry.register(NodeKind::CodeBlock, render_code_block);
        registry.register(NodeKind::FencedCodeBlock, render_code_block);
        registry.register(NodeKind::HtmlBlock, render_html_block);
        registry.register(NodeKind::ThematicBreak, render_thematic_break);
        registry.register(NodeKind::Table, render_table);
        registry.register(NodeKind::TableHead, render_table_head);
        registry.register(NodeKind::TableRow, render_table_row);
        registry.register(NodeKind::TableCell, render_table_cell);
        registry.register(NodeKind::DefinitionList, render_definition_list);
        registry.register(NodeKind::DefinitionTerm, render_definition_term);
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

/// Format attributes as ` name="value"` pairs; repeated `class` entries
/// are joined into one attribute.
fn format_attributes(attributes: &Attributes) -> String {
    let classes: Vec<&str> = attributes
        .iter()
        .filter(|attr| attr.name == "class")
        .filter_map(|attr| attr.value.as_deref())
        .collect();

    let mut out = String::new();
    let mut wrote_class = false;
    for attr in attributes.iter() {
        if attr.name == "class" {
            if !wrote_class && !classes.is_empty() {
                out.push_str(&format!(r#" class="{}""#, escape_html(&classes.join(" "))));
                wrote_class = true;
            }
            continue;
        }
        match &attr.value {
            Some(value) => out.push_str(&format!(r#" {}="{}""#, attr.name, escape_html(value))),
            None => out.push_str(&format!(" {}", attr.name)),
        }
    }
    out
}

fn render_heading(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Heading { level } = visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if entering {
        let attrs = format_attributes(&visit.node.attributes);
        state.write_str(&format!("<h{level}{attrs}>"))?;
    } else {
        state.write_str(&format!("</h{level}>\n"))?;
    }
    Ok(WalkStatus::Continue)
}

/// Whether a paragraph belongs to a tight list item and renders without `<p>`.
fn in_tight_item(visit: &Visit<'_>) -> bool {
    let Some(parent) = visit.parent() else {
        return false;
    };
    match parent.node.kind() {
        NodeKind::ListItem => visit
            .ancestor(NodeKind::List)
            .is_some_and(|list| matches!(&list.node.value, NodeValue::List(data) if data.tight)),
        NodeKind::DefinitionDetails => {
            matches!(parent.node.value, NodeValue::DefinitionDetails { tight: true })
        }
        _ => false,
    }
}

fn render_paragraph(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if in_tight_item(visit) {
        if !entering && visit.next().is_some() {
            state.write_str("\n")?;
        }
        return Ok(WalkStatus::Continue);
    }
    state.write_str(if entering { "<p>" } else { "</p>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_blockquote(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    state.write_str(if entering {
        "<blockquote>\n"
    } else {
        "</blockquote>\n"
    })?;
    Ok(WalkStatus::Continue)
}

fn render_list(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::List(list) = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    match (list.start, entering) {
        (Some(1), true) => state.write_str("<ol>\n")?,
        (Some(start), true) => state.write_str(&format!("<ol start=\"{start}\">\n"))?,
        (None, true) => state.write_str("<ul>\n")?,
        (Some(_), false) => state.write_str("</ol>\n")?,
        (None, false) => state.write_str("</ul>\n")?,
    }
    Ok(WalkStatus::Continue)
}

fn render_list_item(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let Some(NodeValue::List(list)) = visit.parent().map(|p| &p.node.value) else {
        return Err(RenderError::structure(NodeKind::ListItem, "list item outside a list"));
    };
    if !entering {
        state.write_str("</li>\n")?;
        return Ok(WalkStatus::Continue);
    }
    state.write_str("<li>")?;
    let opens_inline = list.tight
        && visit
            .node
            .children
            .first()
            .is_some_and(|child| child.kind() == NodeKind::Paragraph);
    if !visit.node.children.is_empty() && !opens_inline {
        state.write_str("\n")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_code_block(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if !entering {
        return Ok(WalkStatus::SkipChildren);
    }
    let (lang, lines) = match &visit.node.value {
        NodeValue::FencedCodeBlock { info, lines, .. } => {
            (info.split_whitespace().next(), lines.as_slice())
        }
        NodeValue::CodeBlock { lines } => (None, lines.as_slice()),
        _ => return Ok(WalkStatus::SkipChildren),
    };
    let content = escape_html(&lines.concat());
    match lang {
        Some(lang) => state.write_str(&format!(
            r#"<pre><code class="language-{}">{content}</code></pre>"#,
            escape_html(lang)
        ))?,
        None => state.write_str(&format!("<pre><code>{content}</code></pre>"))?,
    }
    state.write_str("\n")?;
    Ok(WalkStatus::SkipChildren)
}

fn render_html_block(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering && let NodeValue::HtmlBlock { lines, closure } = &visit.node.value {
        for line in lines.iter().chain(closure) {
            state.write_str(line)?;
        }
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_thematic_break(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        state.write_str("<hr />\n")?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_table(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    if entering {
        state.write_str("<table>\n")?;
        return Ok(WalkStatus::Continue);
    }
    let has_body = visit
        .node
        .children
        .iter()
        .any(|child| child.kind() == NodeKind::TableRow);
    if has_body {
        state.write_str("</tbody>\n")?;
    }
    state.write_str("</table>\n")?;
    Ok(WalkStatus::Continue)
}

fn render_table_head(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    state.write_str(if entering {
        "<thead>\n<tr>\n"
    } else {
        "</tr>\n</thead>\n"
    })?;
    Ok(WalkStatus::Continue)
}

fn render_table_row(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if !entering {
        state.write_str("</tr>\n")?;
        return Ok(WalkStatus::Continue);
    }
    let first_body_row = visit
        .prev()
        .is_none_or(|prev| prev.kind() != NodeKind::TableRow);
    if first_body_row {
        state.write_str("<tbody>\n")?;
    }
    state.write_str("<tr>\n")?;
    Ok(WalkStatus::Continue)
}

fn alignment_style(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::None => "",
        Alignment::Left => r#" style="text-align:left""#,
        Alignment::Center => r#" style="text-align:center""#,
        Alignment::Right => r#" style="text-align:right""#,
    }
}

fn render_table_cell(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let tag = if visit.within(NodeKind::TableHead) {
        "th"
    } else {
        "td"
    };
    if !entering {
        state.write_str(&format!("</{tag}>\n"))?;
        return Ok(WalkStatus::Continue);
    }
    let alignment = visit
        .ancestor(NodeKind::Table)
        .and_then(|table| match &table.node.value {
            NodeValue::Table { alignments } => alignments.get(visit.frame().index()).copied(),
            _ => None,
        })
        .unwrap_or(Alignment::None);
    state.write_str(&format!("<{tag}{}>", alignment_style(alignment)))?;
    Ok(WalkStatus::Continue)
}

fn render_definition_list(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    state.write_str(if entering { "<dl>\n" } else { "</dl>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_definition_term(
    state: &mut RenderState<'_, '_>,
    _visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    state.write_str(if entering { "<dt>" } else { "</dt>\n" })?;
    Ok(WalkStatus::Continue)
}

fn render_definition_details(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let tight = matches!(visit.node.value, NodeValue::DefinitionDetails { tight: true });
    state.write_str(match (entering, tight) {
        (true, true) => "<dd>",
        (true, false) => "<dd>\n",
        (false, _) => "</dd>\n",
    })?;
    Ok(WalkStatus::Continue)
}

fn render_text(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Text(text) = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        return Ok(WalkStatus::Continue);
    }
    state.write_str(&escape_html(&text.literal))?;
    if text.hard_break {
        state.write_str("<br />\n")?;
    } else if text.soft_break {
        state.write_str("\n")?;
    }
    Ok(WalkStatus::Continue)
}

fn render_string(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    if entering && let NodeValue::String(value) = &visit.node.value {
        state.write_str(&escape_html(value))?;
    }
    Ok(WalkStatus::Continue)
}

fn render_emphasis(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::Emphasis { level } = visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    let tag = if level >= 2 { "strong" } else { "em" };
    if entering {
        state.write_str(&format!("<{tag}>"))?;
    } else {
        state.write_str(&format!("</{tag}>"))?;
    }
    Ok(WalkStatus::Continue)
}

fn render_code_span(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    if entering {
        let code = escape_html(&visit.node.plain_text());
        state.write_str(&format!("<code>{code}</code>"))?;
    }
    Ok(WalkStatus::SkipChildren)
}

fn render_link(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Link(link) = &visit.node.value else {
        return Ok(WalkStatus::Continue);
    };
    if !entering {
        state.write_str("</a>")?;
        return Ok(WalkStatus::Continue);
    }
    let title_attr = link
        .title
        .as_deref()
        .map(|title| format!(r#" title="{}""#, escape_html(title)))
        .unwrap_or_default();
    state.write_str(&format!(
        r#"<a href="{}"{title_attr}{}>"#,
        escape_url(&link.destination),
        format_attributes(&visit.node.attributes)
    ))?;
    Ok(WalkStatus::Continue)
}

fn render_image(state: &mut RenderState<'_, '_>, visit: &Visit<'_>, entering: bool) -> RuleResult {
    let NodeValue::Image(link) = &visit.node.value else {
        return Ok(WalkStatus::SkipChildren);
    };
    if !entering {
        return Ok(WalkStatus::SkipChildren);
    }
    let title_attr = link
        .title
        .as_deref()
        .map(|title| format!(r#" title="{}""#, escape_html(title)))
        .unwrap_or_default();
    state.write_str(&format!(
        r#"<img src="{}"{title_attr} alt="{}" />"#,
        escape_url(&link.destination),
        escape_html(&visit.node.plain_text())
    ))?;
    Ok(WalkStatus::SkipChildren)
}

fn render_auto_link(
    state: &mut RenderState<'_, '_>,
    visit: &Visit<'_>,
    entering: bool,
) -> RuleResult {
    let NodeValue::AutoLink { url, email } = &visit.node.value else {
        return Ok(WalkStatus::SkipChildren);
    };
    if entering {
        let href = if *email {
            format!("mailto:{url}")
        } else {
            url.clone()
        };
        state.write_str(&format!(
            r#"<a href="{}"{}>{}</a>"#,
            escape_url(&href),
            format_attributes(&visit.node.attributes),
            escape_html(url)
        ))?;
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
