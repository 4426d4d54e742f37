//! Error types for template compilation and rendering.

use thiserror::Error;

/// A syntax error detected while compiling a template.
///
/// Carries the template name and the 1-based source line the scanner was on
/// when the error was detected.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("template: {name}:{line}: {message}")]
    Syntax {
        name: String,
        line: usize,
        message: String,
    },

    #[error("template: {name}:{line}: function {function:?} not defined")]
    UnknownFunction {
        name: String,
        line: usize,
        function: String,
    },

    #[error("template: {name}:{line}: unexpected {{{{end}}}}")]
    UnexpectedEnd { name: String, line: usize },

    #[error("template: {name}:{line}: unclosed action")]
    UnclosedAction { name: String, line: usize },
}

impl ParseError {
    /// The source line the error was reported at.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. }
            | ParseError::UnknownFunction { line, .. }
            | ParseError::UnexpectedEnd { line, .. }
            | ParseError::UnclosedAction { line, .. } => *line,
        }
    }
}

/// A runtime failure while executing a compiled template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A field reference was evaluated against a null context.
    #[error("nil data; no entry for key {key:?}")]
    NilData { key: String },

    /// A field reference named a key the context object does not have.
    #[error("can't evaluate field {key:?} in value")]
    NoSuchField { key: String },

    #[error("template {name:?} not defined")]
    UndefinedTemplate { name: String },

    #[error("undefined variable ${name}")]
    UndefinedVariable { name: String },

    #[error("range can't iterate over {kind}")]
    NotIterable { kind: &'static str },

    #[error("error calling {function}: {source}")]
    Function {
        function: String,
        source: anyhow::Error,
    },

    #[error("{message}")]
    BadCall { message: String },
}
