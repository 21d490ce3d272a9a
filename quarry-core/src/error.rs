//! Error types for Quarry operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found in namespace {namespace}: {key}")]
    NotFound { namespace: String, key: String },

    #[error("Backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Corrupt record {identifier}: {reason}")]
    CorruptRecord { identifier: String, reason: String },

    #[error("Index error on {index_name}: {reason}")]
    IndexError { index_name: String, reason: String },

    #[error("Index not found: {index_name}")]
    IndexNotFound { index_name: String },
}

/// Validation errors for caller-supplied arguments.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Coarse classification of a [`QuarryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    BackendUnavailable,
    CorruptRecord,
    InvalidArgument,
    Cancelled,
    Config,
    Index,
}

/// Master error type for all Quarry errors.
#[derive(Debug, Clone, Error)]
pub enum QuarryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Operation cancelled: {reason}")]
    Cancelled { reason: String },
}

impl QuarryError {
    /// Shorthand for a `BackendUnavailable` storage error.
    pub fn backend(reason: impl Into<String>) -> Self {
        StorageError::BackendUnavailable {
            reason: reason.into(),
        }
        .into()
    }

    /// Shorthand for a `RequiredFieldMissing` validation error.
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::RequiredFieldMissing {
            field: field.into(),
        }
        .into()
    }

    /// Shorthand for an `InvalidValue` validation error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
        .into()
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Storage(StorageError::BackendUnavailable { .. }) => {
                ErrorKind::BackendUnavailable
            }
            Self::Storage(StorageError::CorruptRecord { .. }) => ErrorKind::CorruptRecord,
            Self::Storage(StorageError::IndexError { .. })
            | Self::Storage(StorageError::IndexNotFound { .. }) => ErrorKind::Index,
            Self::Validation(_) => ErrorKind::InvalidArgument,
            Self::Config(_) => ErrorKind::Config,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_backend_unavailable(&self) -> bool {
        self.kind() == ErrorKind::BackendUnavailable
    }

    pub fn is_corrupt_record(&self) -> bool {
        self.kind() == ErrorKind::CorruptRecord
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

/// Result type alias for Quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;

// =============================================================================
// TESTS
// =============================================================================
