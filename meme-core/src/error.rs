//! Error types for document and interaction operations.

use thiserror::Error;

use crate::element::{ElementId, TextRole};
use crate::upload::UploadError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while editing a document.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Element not found in the document.
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    /// A header or footer already exists.
    #[error("Document already has a {0} element")]
    DuplicateRole(TextRole),

    /// The last remaining text element cannot be removed.
    #[error("Cannot remove the last text element")]
    LastTextElement,

    /// Invalid element operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rejected upload.
    #[error(transparent)]
    Upload(#[from] UploadError),
}
