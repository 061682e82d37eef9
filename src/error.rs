//! Typed generator failures.
use thiserror::Error;

/// Cumulative error type for a generation run.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("mapping rule #{index} has an invalid pattern '{pattern}'")]
    RulePattern {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("cannot resolve type '{type_name}' of '{path}'")]
    UnresolvedType { path: String, type_name: String },
    #[error("struct '{path}' contains itself by value")]
    RecursiveLayout { path: String },
    #[error("struct '{path}' is too large to lay out")]
    LayoutOverflow { path: String },
    #[error("invalid generator input")]
    InvalidInput(#[from] serde_json::Error),
}

impl BindError {
    /// Native path the failure is attached to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            BindError::UnresolvedType { path, .. }
            | BindError::RecursiveLayout { path }
            | BindError::LayoutOverflow { path } => Some(path),
            BindError::RulePattern { .. } | BindError::InvalidInput(_) => None,
        }
    }
}

/// Result type for generator stages.
pub type Result<T> = std::result::Result<T, BindError>;
