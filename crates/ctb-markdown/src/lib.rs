//! Canonical Markdown round-trip rendering.
//!
//! Markdown is parsed with pulldown-cmark into an owned document tree whose
//! nodes reference the source by byte ranges. A [`Renderer`] walks the tree
//! and dispatches every node to the rule registered for its kind:
//!
//! - [`MarkdownRules`]: writes the tree back as canonical Markdown, copying
//!   inline text from the source and regenerating block structure.
//! - [`HtmlRules`]: CommonMark-style HTML, used together with the
//!   [`transform`] passes that add heading anchors and harden external links.
//!
//! Rule providers are registered with a priority; lower values win, so a
//! provider can override single node kinds of a built-in rule set.
//!
//! # Example
//!
//! ```
//! use ctb_markdown::{Converter, Mode};
//!
//! let converter = Converter::new(Mode::Markdown).unwrap();
//! let out = converter.convert_to_string("* one\n* two\n").unwrap();
//! assert_eq!(out, "- one\n- two");
//! ```

mod ast;
mod context;
mod convert;
mod error;
mod html;
mod markdown;
mod parse;
mod renderer;
pub mod transform;
mod util;

pub use ast::{
    Alignment, Attribute, Attributes, Document, LinkData, ListData, Node, NodeKind, NodeValue,
    Segment, TextData,
};
pub use context::Context;
pub use convert::{ConvertOptions, Converter, DEFAULT_PRIORITY, Mode};
pub use error::RenderError;
pub use html::HtmlRules;
pub use markdown::MarkdownRules;
pub use parse::{ParseOptions, parse};
pub use renderer::{
    Frame, NodeRenderer, Registry, RenderFn, RenderState, Renderer, RendererBuilder, Visit,
    WalkStatus,
};
pub use util::{escape_html, escape_url, slugify};
