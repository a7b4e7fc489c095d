use std::rc::Rc;

use thiserror::Error;

/// Source region an error points at. `offset`/`length` are byte positions
/// into the original source text; `line` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
    pub line: usize,
}

/// Everything the pipeline can report. Scanner, parser, and resolver errors
/// gate evaluation; a `Runtime` error aborts the current run only.
#[derive(Error, Debug, Clone)]
pub enum GlitterError {
    #[error("[{path}:{}] Unexpected character '{found}'", .span.line)]
    UnexpectedCharacter {
        found: String,
        path: Rc<str>,
        span: Span,
    },

    #[error("[{path}:{}] Unterminated string", .span.line)]
    UnterminatedString { path: Rc<str>, span: Span },

    #[error("[{path}:{}] Unterminated block comment", .span.line)]
    UnterminatedBlockComment { path: Rc<str>, span: Span },

    #[error("[{path}:{}] Parse error{location}: {message}", .span.line)]
    Parse {
        message: String,
        /// " at 'lexeme'" or " at end"; folded into the rendered line.
        location: String,
        path: Rc<str>,
        span: Span,
    },

    #[error("[{path}:{}] Resolve error at '{lexeme}': {message}", .span.line)]
    Resolve {
        message: String,
        lexeme: String,
        path: Rc<str>,
        span: Span,
    },

    #[error("Runtime error: {message}")]
    Runtime {
        message: String,
        path: Option<Rc<str>>,
        span: Option<Span>,
    },
}

impl GlitterError {
    pub fn span(&self) -> Option<Span> {
        match self {
            GlitterError::UnexpectedCharacter { span, .. }
            | GlitterError::UnterminatedString { span, .. }
            | GlitterError::UnterminatedBlockComment { span, .. }
            | GlitterError::Parse { span, .. }
            | GlitterError::Resolve { span, .. } => Some(*span),
            GlitterError::Runtime { span, .. } => *span,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            GlitterError::UnexpectedCharacter { path, .. }
            | GlitterError::UnterminatedString { path, .. }
            | GlitterError::UnterminatedBlockComment { path, .. }
            | GlitterError::Parse { path, .. }
            | GlitterError::Resolve { path, .. } => Some(path),
            GlitterError::Runtime { path, .. } => path.as_deref(),
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, GlitterError::Runtime { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_path_and_line() {
        let err = GlitterError::UnexpectedCharacter {
            found: String::from("@"),
            path: Rc::from("demo.gli"),
            span: Span {
                offset: 4,
                length: 1,
                line: 2,
            },
        };
        assert_eq!(err.to_string(), "[demo.gli:2] Unexpected character '@'");
    }

    #[test]
    fn runtime_errors_may_lack_a_position() {
        let err = GlitterError::Runtime {
            message: String::from("Operands must be a number"),
            path: None,
            span: None,
        };
        assert_eq!(err.span(), None);
        assert!(err.is_runtime());
    }
}
