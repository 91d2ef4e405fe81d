//! Error types for dataset access.

use std::io;

use thiserror::Error;

/// Errors that can occur while locating, opening or caching a dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// No file exists for the requested forecast time.
    #[error("dataset not found: {0}")]
    NotFound(String),

    /// A scan for the latest dataset found no candidates.
    #[error("no dataset found in directory: {0}")]
    NoDatasetFound(String),

    /// Header terminator missing, header not UTF-8 or not valid JSON,
    /// or payload region of the wrong size.
    #[error("dataset format error: {0}")]
    Format(String),

    /// Underlying filesystem or mapping failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Grid schema whose axes disagree with its shape.
    #[error("invalid grid schema: {0}")]
    InvalidSchema(String),

    /// Configuration rejected by validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The payload was accessed after the dataset was closed.
    #[error("dataset is closed: {0}")]
    Closed(String),

    /// A write was attempted through a read-only mapping.
    #[error("dataset is read-only: {0}")]
    ReadOnly(String),

    /// A grid index lies outside the schema shape.
    #[error("index {index:?} is outside grid shape {shape:?}")]
    OutOfBounds { index: [usize; 5], shape: [usize; 5] },
}

impl DatasetError {
    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a NoDatasetFound error.
    pub fn no_dataset_found(msg: impl Into<String>) -> Self {
        Self::NoDatasetFound(msg.into())
    }

    /// Create a Format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an Io error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create an InvalidSchema error.
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an I/O error raised while working on `path`, keeping
    /// missing files distinguishable from other failures.
    pub fn from_io(err: io::Error, path: &std::path::Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.display().to_string()),
            _ => Self::Io(format!("{}: {}", path.display(), err)),
        }
    }
}

impl From<io::Error> for DatasetError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(format!("invalid JSON header: {}", err))
    }
}

impl From<tokio::task::JoinError> for DatasetError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(format!("blocking task failed: {}", err))
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let mapped = DatasetError::from_io(err, Path::new("/data/2024011512.tawhiri"));
        match mapped {
            DatasetError::NotFound(msg) => assert!(msg.contains("2024011512.tawhiri")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_permission_denied_maps_to_io() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let mapped = DatasetError::from_io(err, Path::new("/data/x"));
        assert!(matches!(mapped, DatasetError::Io(_)));
    }

    #[test]
    fn test_json_error_is_format_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let mapped: DatasetError = err.into();
        assert!(matches!(mapped, DatasetError::Format(_)));
    }
}
