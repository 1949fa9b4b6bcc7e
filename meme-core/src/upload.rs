//! Upload validation and data-URI reading.

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use crate::notify::Toast;

/// Largest accepted upload, in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Reasons an uploaded file is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The declared MIME type is not an image type.
    #[error("Invalid file type: {mime}")]
    InvalidType {
        /// Declared MIME type.
        mime: String,
    },

    /// The file exceeds the size ceiling.
    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed maximum in bytes.
        limit: u64,
    },
}

impl UploadError {
    /// User-facing toast for this rejection.
    #[must_use]
    pub fn toast(&self) -> Toast {
        match self {
            Self::InvalidType { .. } => Toast::destructive(
                "Invalid file type",
                "Please upload an image file (JPG, PNG, GIF, etc.)",
            ),
            Self::TooLarge { .. } => {
                Toast::destructive("File too large", "Please upload an image smaller than 10MB")
            }
        }
    }
}

/// Check a file's declared MIME type and size.
///
/// # Errors
///
/// Returns [`UploadError::InvalidType`] when `mime` does not start with
/// `image/`, or [`UploadError::TooLarge`] when `size` exceeds
/// [`MAX_UPLOAD_BYTES`].
pub fn validate_upload(mime: &str, size: u64) -> Result<(), UploadError> {
    if !mime.trim().to_ascii_lowercase().starts_with("image/") {
        return Err(UploadError::InvalidType {
            mime: mime.to_string(),
        });
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Validate an upload and convert it to a `data:<mime>;base64,...` URI.
///
/// # Errors
///
/// Returns an [`UploadError`] if validation fails. Nothing is encoded in that case.
pub fn read_as_data_uri(mime: &str, bytes: &[u8]) -> Result<String, UploadError> {
    validate_upload(mime, bytes.len() as u64)?;
    let encoded = general_purpose::STANDARD.encode(bytes);
    tracing::debug!(mime, size = bytes.len(), "Read upload as data URI");
    Ok(format!("data:{};base64,{encoded}", mime.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_image() {
        let err = validate_upload("application/pdf", 10).expect_err("should reject");
        assert!(matches!(err, UploadError::InvalidType { .. }));
        assert_eq!(err.toast().title, "Invalid file type");
    }

    #[test]
    fn test_rejects_oversize() {
        let err = validate_upload("image/png", MAX_UPLOAD_BYTES + 1).expect_err("should reject");
        assert_eq!(
            err,
            UploadError::TooLarge {
                size: MAX_UPLOAD_BYTES + 1,
                limit: MAX_UPLOAD_BYTES
            }
        );
        assert_eq!(err.toast().title, "File too large");
    }

    #[test]
    fn test_accepts_limit_exactly() {
        assert!(validate_upload("image/jpeg", MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_data_uri() {
        let uri = read_as_data_uri("image/png", b"abc").expect("valid upload");
        assert_eq!(uri, "data:image/png;base64,YWJj");
    }
}
