//! Render error types.

use crate::ast::NodeKind;

/// Error raised while building a renderer or walking a document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A node's parent/child relationship violates an assumed invariant.
    #[error("unexpected tree structure at {kind}: {message}")]
    Structure {
        /// Kind of the offending node.
        kind: NodeKind,
        /// What was expected.
        message: String,
    },

    /// The output sink rejected a write or flush.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// Two rule providers with the same priority registered the same kind.
    #[error("ambiguous rule registration for {kind} at priority {priority}")]
    AmbiguousRegistration {
        /// Kind registered twice.
        kind: NodeKind,
        /// Priority shared by the conflicting providers.
        priority: i32,
    },

    /// `pop` called on an empty padding stack.
    #[error("padding stack underflow")]
    PaddingUnderflow,
}

impl RenderError {
    pub(crate) fn structure(kind: NodeKind, message: impl Into<String>) -> Self {
        Self::Structure {
            kind,
            message: message.into(),
        }
    }
}
