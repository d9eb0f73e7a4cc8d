//! Error types for the observable store, template compiler and filters.

use thiserror::Error;

/// Main error type for store and filter operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Cannot traverse {path:?}: {segment:?} is not a mapping")]
    NotAMapping { path: String, segment: String },

    #[error("Cannot traverse {path:?}: {segment:?} does not exist")]
    MissingSegment { path: String, segment: String },

    #[error("Delegator has no handler {method:?} for filter {key:?}")]
    UnknownHandler { key: String, method: String },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Compile-time template failures. Offsets are byte positions in the source.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed directive starting at byte {offset}")]
    UnclosedDirective { offset: usize },

    #[error("empty directive at byte {offset}")]
    EmptyDirective { offset: usize },

    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("`{keyword}` at byte {offset} has no open block")]
    UnexpectedKeyword { keyword: String, offset: usize },

    #[error("`{keyword}` block opened at byte {offset} is never closed")]
    UnterminatedBlock { keyword: String, offset: usize },

    #[error("invalid scope name {0:?}")]
    InvalidScope(String),

    #[error("binding `{name}` at byte {offset} shadows the scope name")]
    ShadowedScope { name: String, offset: usize },

    #[error("invalid template settings: {0}")]
    InvalidSettings(String),
}

/// Runtime faults raised by code inside a template.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("cannot read property `{property}` of {target}")]
    NullAccess {
        property: String,
        target: &'static str,
    },

    #[error("cannot iterate over {0}")]
    NotIterable(&'static str),

    #[error("operator `{op}` expects numbers, got {left} and {right}")]
    NotANumber {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("operator `{0}` produced a non-finite number")]
    Arithmetic(&'static str),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
