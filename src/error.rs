//! Error types for the rapidsms-provider library.
//!
//! Every provider operation either succeeds or fails with exactly one of the
//! variants below. Nothing is retried inside the crate; the caller decides
//! how to surface the failure.

use thiserror::Error;

/// Errors raised by the data provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The address did not match any route
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// A required insert attribute was absent
    #[error("Missing required field '{field}' for {resource} insert")]
    MissingField {
        /// Resource kind being inserted
        resource: &'static str,
        /// Column that was missing
        field: &'static str,
    },

    /// The target dynamic table (or the form naming it) does not exist
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The store rejected the row
    #[error("Failed to insert row into {resource}: {reason}")]
    InsertFailed {
        /// Address the insert was issued against
        resource: String,
        /// Underlying store message
        reason: String,
    },

    /// More than one monitor exists for a phone
    #[error("Integrity violation: {count} monitors share phone {phone}")]
    IntegrityViolation {
        /// Phone identity that is duplicated
        phone: String,
        /// Number of rows found
        count: usize,
    },

    /// Operation is not defined for the addressed resource
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Stable tag for each failure class, for callers that render their own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ProviderError::UnknownResource`]
    UnknownResource,
    /// See [`ProviderError::MissingField`]
    MissingField,
    /// See [`ProviderError::SchemaMismatch`]
    SchemaMismatch,
    /// See [`ProviderError::InsertFailed`]
    InsertFailed,
    /// See [`ProviderError::IntegrityViolation`]
    IntegrityViolation,
    /// See [`ProviderError::UnsupportedOperation`]
    UnsupportedOperation,
    /// Storage, pool, I/O or configuration failure
    Storage,
}

impl ErrorKind {
    /// Short label used in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownResource => "unknown_resource",
            Self::MissingField => "missing_field",
            Self::SchemaMismatch => "schema_mismatch",
            Self::InsertFailed => "insert_failed",
            Self::IntegrityViolation => "integrity_violation",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::Storage => "storage",
        }
    }
}

impl ProviderError {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownResource(_) => ErrorKind::UnknownResource,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Self::InsertFailed { .. } => ErrorKind::InsertFailed,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::Database(_) | Self::Pool(_) | Self::Io(_) | Self::InvalidConfig(_) => ErrorKind::Storage,
        }
    }

    /// Wrap a store failure raised while inserting into `resource`
    pub(crate) fn insert_failed(resource: impl Into<String>, err: &rusqlite::Error) -> Self {
        Self::InsertFailed {
            resource: resource.into(),
            reason: err.to_string(),
        }
    }
}

/// Convenience type alias for Result with ProviderError
pub type Result<T> = std::result::Result<T, ProviderError>;
