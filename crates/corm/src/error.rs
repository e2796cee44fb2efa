//! Error types for corm

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for corm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors surfaced by statement compilation, schema introspection and execution.
///
/// Every builder records the first error it hits and returns it from `build()`;
/// nothing is logged-and-ignored.
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Identifier failed validation (unsafe characters, empty, malformed dotted form).
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Marker count in a fragment does not match its argument count.
    #[error("Placeholder mismatch: {found} placeholder(s) for {expected} argument(s)")]
    PlaceholderMismatch { expected: usize, found: usize },

    /// A `?` marker sits next to a native operator it collides with.
    #[error("Placeholder marker collides with operator {0:?}; use the function form or a numbered placeholder")]
    OperatorCollision(&'static str),

    /// UPDATE/DELETE compiled without WHERE and without the explicit override.
    #[error("Missing WHERE clause for {0}; call allow_empty_where() to run it unconditionally")]
    MissingWhere(&'static str),

    /// Row or column arity disagrees with the declared shape.
    #[error("Structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Source value cannot be mapped (absent embedded value, unknown column, bad table name).
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Schema introspection failed, including a recovered panic.
    #[error("Introspection failed for {type_name}: {message}")]
    Introspection { type_name: String, message: String },

    /// Builder misuse
    #[error("Validation error: {0}")]
    Validation(String),

    /// The dialect cannot express the requested clause.
    #[error("Unsupported by {dialect}: {feature}")]
    Unsupported {
        dialect: &'static str,
        feature: &'static str,
    },

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[source] Arc<tokio_postgres::Error>),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl OrmError {
    /// Create an invalid identifier error
    pub fn invalid_identifier(raw: impl Into<String>) -> Self {
        Self::InvalidIdentifier(raw.into())
    }

    /// Create a structural mismatch error
    pub fn structural(message: impl Into<String>) -> Self {
        Self::StructuralMismatch(message.into())
    }

    /// Create an invalid model error
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel(message.into())
    }

    /// Create an introspection error
    pub fn introspection(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Introspection {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported-clause error
    pub fn unsupported(dialect: &'static str, feature: &'static str) -> Self {
        Self::Unsupported { dialect, feature }
    }

    /// Check if this is an invalid identifier error
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_))
    }

    /// Check if this is a placeholder mismatch error
    pub fn is_placeholder_mismatch(&self) -> bool {
        matches!(self, Self::PlaceholderMismatch { .. })
    }

    /// Check if this is a missing WHERE error
    pub fn is_missing_where(&self) -> bool {
        matches!(self, Self::MissingWhere(_))
    }

    /// Check if this is a structural mismatch error
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::StructuralMismatch(_))
    }
}

impl From<tokio_postgres::Error> for OrmError {
    fn from(err: tokio_postgres::Error) -> Self {
        OrmError::Query(Arc::new(err))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        OrmError::Pool(err.to_string())
    }
}
