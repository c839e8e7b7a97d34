use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for pdf-ops-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Request validation (unknown operation, missing or invalid options)
/// - Document operations (decoding, encoding, locked documents)
/// - Security handler operations (credentials, unsupported handlers)
/// - Storage operations (fetching sources, storing results)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Request Errors
    // ==========================================================================
    /// The request is structurally unusable (no sources, bad JSON, ...)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Operation tag outside the supported set
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// An option the operation needs was not supplied
    #[error("missing required option '{option}' for {operation}")]
    MissingOption {
        operation: &'static str,
        option: &'static str,
    },

    /// An operation-specific option failed validation
    #[error("invalid operands: {0}")]
    InvalidOperands(String),

    /// The pipeline was cancelled by its caller
    #[error("request cancelled")]
    Cancelled,

    // ==========================================================================
    // Document Errors
    // ==========================================================================
    /// Input could not be decoded into a document
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// The document uses a security handler we cannot open
    #[error("unsupported security handler: {0}")]
    UnsupportedSecurity(String),

    /// A page-level transform was attempted on an encrypted document
    #[error("document is encrypted; unlock it before applying this operation")]
    LockedDocument,

    /// The password did not match the document's user or owner password
    #[error("incorrect password")]
    WrongCredential,

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    InvalidPage { page: usize, total: usize },

    /// Failed to encode a document
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    /// None of the required sources could be fetched
    #[error("failed to acquire sources: {0}")]
    AcquisitionFailed(String),

    /// The result could not be persisted
    #[error("failed to store result: {0}")]
    StorageFailed(#[source] StorageError),

    /// A storage backend could not be constructed
    #[error("failed to initialize storage: {0}")]
    StorageInit(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // Internal Errors
    // ==========================================================================
    /// A blocking worker panicked or was aborted
    #[error("internal error: {0}")]
    Internal(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The identifier does not exist in the store
    #[error("object not found: {0}")]
    NotFound(String),

    /// The store could not be reached or answered with an error
    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Machine-distinguishable error category carried in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidRequest,
    AcquisitionFailed,
    MalformedDocument,
    InvalidOperands,
    LockedDocument,
    WrongCredential,
    StorageFailed,
    Cancelled,
    InternalError,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "InvalidRequest",
            Self::AcquisitionFailed => "AcquisitionFailed",
            Self::MalformedDocument => "MalformedDocument",
            Self::InvalidOperands => "InvalidOperands",
            Self::LockedDocument => "LockedDocument",
            Self::WrongCredential => "WrongCredential",
            Self::StorageFailed => "StorageFailed",
            Self::Cancelled => "Cancelled",
            Self::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Category of this error as reported to callers.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) | Self::UnknownOperation(_) | Self::MissingOption { .. } => {
                ErrorKind::InvalidRequest
            }
            Self::InvalidOperands(_) | Self::InvalidPage { .. } => ErrorKind::InvalidOperands,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::MalformedDocument(_) | Self::UnsupportedSecurity(_) => {
                ErrorKind::MalformedDocument
            }
            Self::LockedDocument => ErrorKind::LockedDocument,
            Self::WrongCredential => ErrorKind::WrongCredential,
            Self::AcquisitionFailed(_) => ErrorKind::AcquisitionFailed,
            Self::StorageFailed(_) => ErrorKind::StorageFailed,
            Self::PdfSave(_)
            | Self::Lopdf(_)
            | Self::StorageInit(_)
            | Self::ConfigLoad(_)
            | Self::ConfigInvalid { .. }
            | Self::Internal(_)
            | Self::Io(_) => ErrorKind::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::UnknownOperation("x".into()).kind(), ErrorKind::InvalidRequest);
        assert_eq!(
            Error::MissingOption { operation: "rotate", option: "angle" }.kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(Error::InvalidOperands("x".into()).kind(), ErrorKind::InvalidOperands);
        assert_eq!(Error::UnsupportedSecurity("AESV3".into()).kind(), ErrorKind::MalformedDocument);
        assert_eq!(
            Error::StorageFailed(StorageError::Transport("down".into())).kind(),
            ErrorKind::StorageFailed
        );
        assert_eq!(Error::Lopdf("bad".into()).kind(), ErrorKind::InternalError);
    }

    #[test]
    fn test_kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::WrongCredential).unwrap_or_default();
        assert_eq!(json, "\"WrongCredential\"");
        assert_eq!(ErrorKind::LockedDocument.to_string(), "LockedDocument");
    }
}
