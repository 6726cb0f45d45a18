//! Error types for the bandview core library.

use std::path::PathBuf;

/// The main error type for bandview operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// Error parsing the bundle's Info.plist descriptor.
    #[error("plist error: {message}")]
    Plist { message: String },

    /// Structural error in the bundle layout (bands directory, band files).
    #[error("bundle error: {message}")]
    Bundle { message: String },

    /// Malformed call arguments, detected before touching storage.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Operation requires an open image but the handle is closed.
    #[error("image is not open")]
    NotOpen,

    /// `open` was called while the handle is already open.
    #[error("image is already open")]
    AlreadyOpen,

    /// A seek computed an offset below zero.
    #[error("invalid offset: {offset}")]
    InvalidOffset { offset: i64 },
}

/// A specialized Result type for bandview operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a plist parse error.
    pub fn plist(message: impl Into<String>) -> Self {
        Self::Plist {
            message: message.into(),
        }
    }

    /// Create a bundle structure error.
    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an invalid-offset error.
    pub fn invalid_offset(offset: i64) -> Self {
        Self::InvalidOffset { offset }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io(io_err, "/image.sparsebundle/bands/1f");
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("/image.sparsebundle/bands/1f"));
    }

    #[test]
    fn test_io_error_without_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io_simple(io_err);
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
        assert!(!msg.contains("at '"));
    }

    #[test]
    fn test_plist_error() {
        let err = Error::plist("missing band-size key");
        assert!(err.to_string().contains("plist error"));
        assert!(err.to_string().contains("missing band-size key"));
    }

    #[test]
    fn test_bundle_error() {
        let err = Error::bundle("bands directory not found");
        assert!(err.to_string().contains("bundle error"));
    }

    #[test]
    fn test_validation_error() {
        let err = Error::validation("write access is not supported");
        assert!(err.to_string().contains("validation error"));
    }

    #[test]
    fn test_state_errors() {
        assert_eq!(Error::NotOpen.to_string(), "image is not open");
        assert_eq!(Error::AlreadyOpen.to_string(), "image is already open");
    }

    #[test]
    fn test_invalid_offset() {
        let err = Error::invalid_offset(-12);
        assert!(err.to_string().contains("-12"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io { path: None, .. }));
    }
}
