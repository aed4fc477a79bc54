//! Per-render padding state.
//!
//! Continuation lines inside blockquotes and list items must repeat the
//! prefixes of every enclosing level. Each open level pushes its prefix and
//! pops it on exit; [`Context::emit_padding`] writes the accumulated prefix
//! after a newline.

use std::io::{self, Write};

use crate::error::RenderError;

/// Padding stack for one render call.
#[derive(Debug, Default)]
pub struct Context {
    stack: Vec<String>,
    counter: usize,
    verbose: bool,
}

impl Context {
    /// Create an empty context. With `verbose`, every padding emission is
    /// preceded by a running counter.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    pub fn push(&mut self, padding: impl Into<String>) {
        self.stack.push(padding.into());
    }

    pub fn pop(&mut self) -> Result<(), RenderError> {
        self.stack
            .pop()
            .map(|_| ())
            .ok_or(RenderError::PaddingUnderflow)
    }

    /// Number of open levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drop levels above `mark`. Returns how many were left open.
    pub fn unwind(&mut self, mark: usize) -> usize {
        let leaked = self.stack.len().saturating_sub(mark);
        self.stack.truncate(mark);
        leaked
    }

    /// Current prefix, all levels in push order.
    #[must_use]
    pub fn padding(&self) -> String {
        self.stack.concat()
    }

    /// Write the current prefix.
    pub fn emit_padding(&mut self, w: &mut dyn Write) -> io::Result<()> {
        self.emit_counter(w)?;
        for pad in &self.stack {
            w.write_all(pad.as_bytes())?;
        }
        Ok(())
    }

    /// Write the current prefix for a line that stays empty: trailing
    /// whitespace is dropped, so `"> > "` becomes `"> >"` and pure indentation
    /// disappears.
    pub fn emit_blank_padding(&mut self, w: &mut dyn Write) -> io::Result<()> {
        self.emit_counter(w)?;
        let padding = self.padding();
        w.write_all(padding.trim_end().as_bytes())
    }

    fn emit_counter(&mut self, w: &mut dyn Write) -> io::Result<()> {
        if self.verbose {
            write!(w, "{}", self.counter)?;
            self.counter += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(ctx: &mut Context) -> String {
        let mut out = Vec::new();
        ctx.emit_padding(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_padding_concatenates_in_push_order() {
        let mut ctx = Context::new(false);
        ctx.push("> ");
        ctx.push("   ");
        ctx.push("> ");
        assert_eq!(emitted(&mut ctx), ">    > ");
    }

    #[test]
    fn test_pop_removes_last() {
        let mut ctx = Context::new(false);
        ctx.push("> ");
        ctx.push("  ");
        ctx.pop().unwrap();
        assert_eq!(emitted(&mut ctx), "> ");
        ctx.pop().unwrap();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_pop_empty_fails() {
        let mut ctx = Context::new(false);
        assert!(matches!(ctx.pop(), Err(RenderError::PaddingUnderflow)));
    }

    #[test]
    fn test_empty_stack_emits_nothing() {
        let mut ctx = Context::new(false);
        assert_eq!(emitted(&mut ctx), "");
    }

    #[test]
    fn test_blank_padding_trims_trailing_whitespace() {
        let mut ctx = Context::new(false);
        ctx.push("> ");
        ctx.push("  ");
        let mut out = Vec::new();
        ctx.emit_blank_padding(&mut out).unwrap();
        assert_eq!(out, b">");
    }

    #[test]
    fn test_unwind_reports_leaked_levels() {
        let mut ctx = Context::new(false);
        ctx.push("> ");
        let mark = ctx.depth();
        ctx.push("  ");
        ctx.push("  ");
        assert_eq!(ctx.unwind(mark), 2);
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.unwind(mark), 0);
    }

    #[test]
    fn test_verbose_counter_precedes_padding() {
        let mut ctx = Context::new(true);
        ctx.push("> ");
        assert_eq!(emitted(&mut ctx), "0> ");
        assert_eq!(emitted(&mut ctx), "1> ");
    }
}
