//! One-call conversion: parse, transform and render.

use std::io::Write;

use crate::ast::Document;
use crate::error::RenderError;
use crate::html::HtmlRules;
use crate::markdown::MarkdownRules;
use crate::parse::{ParseOptions, parse};
use crate::renderer::Renderer;
use crate::transform::{assign_heading_ids, secure_links};

/// Priority of the built-in rule sets. Providers registered with a lower
/// value override them.
pub const DEFAULT_PRIORITY: i32 = 500;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Canonical Markdown.
    #[default]
    Markdown,
    /// HTML with heading anchors and hardened external links.
    Html,
}

/// Knobs for a [`Converter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConvertOptions {
    pub parse: ParseOptions,
    /// Generate `id` attributes for headings (HTML only).
    pub heading_ids: bool,
    /// Add `rel`/`target` to external links (HTML only).
    pub secure_links: bool,
    /// Prefix padding with a debug counter.
    pub verbose_padding: bool,
}

impl ConvertOptions {
    /// Defaults for `mode`.
    #[must_use]
    pub fn for_mode(mode: Mode) -> Self {
        let parse = match mode {
            Mode::Markdown => ParseOptions::markdown(),
            Mode::Html => ParseOptions::html(),
        };
        Self {
            parse,
            heading_ids: true,
            secure_links: true,
            verbose_padding: false,
        }
    }
}

/// Parser, transforms and a prebuilt renderer for one output mode.
///
/// Build once and reuse; `Converter` is `Send + Sync`.
pub struct Converter {
    mode: Mode,
    options: ConvertOptions,
    renderer: Renderer,
}

impl Converter {
    /// Converter with the default options for `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule table cannot be built.
    pub fn new(mode: Mode) -> Result<Self, RenderError> {
        Self::with_options(mode, ConvertOptions::for_mode(mode))
    }

    /// Converter with explicit options.
    ///
    /// # Errors
    ///
    /// Returns an error if the rule table cannot be built.
    pub fn with_options(mode: Mode, options: ConvertOptions) -> Result<Self, RenderError> {
        let builder = Renderer::builder().with_verbose_padding(options.verbose_padding);
        let renderer = match mode {
            Mode::Markdown => builder
                .provider(MarkdownRules, DEFAULT_PRIORITY)
                .with_block_separators(true),
            Mode::Html => builder.provider(HtmlRules, DEFAULT_PRIORITY),
        }
        .build()?;

        Ok(Self {
            mode,
            options,
            renderer,
        })
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Parse `source`; in HTML mode the enabled transforms are applied.
    #[must_use]
    pub fn parse<'src>(&self, source: &'src str) -> Document<'src> {
        let mut doc = parse(source, &self.options.parse);
        if self.mode == Mode::Html {
            if self.options.heading_ids {
                doc = assign_heading_ids(&doc);
            }
            if self.options.secure_links {
                doc = secure_links(&doc);
            }
        }
        doc
    }

    /// Render a parsed document into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error on structural violations or sink failures.
    pub fn render<W: Write>(&self, doc: &Document<'_>, sink: W) -> Result<(), RenderError> {
        self.renderer.render(doc, sink)
    }

    /// Parse and render `source` into `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error on structural violations or sink failures.
    pub fn convert<W: Write>(&self, source: &str, sink: W) -> Result<(), RenderError> {
        let doc = self.parse(source);
        tracing::debug!(mode = ?self.mode, bytes = source.len(), "Converting document");
        self.render(&doc, sink)
    }

    /// Parse and render `source` into a string.
    ///
    /// # Errors
    ///
    /// Returns an error on structural violations.
    pub fn convert_to_string(&self, source: &str) -> Result<String, RenderError> {
        let mut out = Vec::with_capacity(source.len());
        self.convert(source, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
