//! Explicit logging contexts
//!
//! Components never reach for a process-wide logger. The application builds
//! one root context and hands each component a named child of it; every
//! event a component emits is parented to that child's span, so the output
//! carries the full `root:child:grandchild` name without any global registry.

use tracing::Span;

/// A named logging scope held by a component.
#[derive(Debug, Clone)]
pub struct LogContext {
    name: String,
    span: Span,
}

impl LogContext {
    /// Create the root context. There should be one per application.
    pub fn root(name: &str) -> Self {
        let span = tracing::debug_span!("ctx", name = %name);
        Self {
            name: name.to_string(),
            span,
        }
    }

    /// Create a context nested under this one.
    pub fn child(&self, name: &str) -> Self {
        let full_name = format!("{}:{}", self.name, name);
        let span = tracing::debug_span!(parent: &self.span, "ctx", name = %full_name);
        Self {
            name: full_name,
            span,
        }
    }

    /// Fully qualified name (`root:child`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::root("watchbench")
    }
}
