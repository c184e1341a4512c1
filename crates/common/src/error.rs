//! Error types shared across Clipgrid crates.

use std::path::PathBuf;

/// Top-level error type for Clipgrid operations.
///
/// Every variant is fatal to the job that raised it. The only retries in the
/// system are the size-driven ones inside the encode loop, which never see
/// these errors.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Invalid metadata: {message}")]
    InvalidMetadata { message: String },

    #[error("Metadata unavailable for {path}: {message}")]
    MetadataUnavailable { path: PathBuf, message: String },

    #[error("Template {template} requires exactly {expected} inputs, got {actual}")]
    InvalidInputCount {
        template: String,
        expected: usize,
        actual: usize,
    },

    #[error("Encode failed ({status}): {stderr}")]
    EncodeFailed { status: String, stderr: String },

    #[error("Output too large: {size} bytes exceeds the {limit} byte ceiling")]
    OutputTooLarge { size: u64, limit: u64 },

    #[error("Unsupported platform: {name}")]
    UnsupportedPlatform { name: String },

    #[error("Unsupported output format: {name} (supported: mp4, webm)")]
    UnsupportedFormat { name: String },

    #[error("Unsupported template: {name} (supported: 1x1, 2x2, 3x1)")]
    UnsupportedTemplate { name: String },

    #[error("Platform already registered: {name}")]
    DuplicatePlatform { name: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Media engine unavailable: {message}")]
    EngineUnavailable { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MediaError.
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            message: msg.into(),
        }
    }

    pub fn metadata_unavailable(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn encode_failed(status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::EncodeFailed {
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    pub fn unsupported_platform(name: impl Into<String>) -> Self {
        Self::UnsupportedPlatform { name: name.into() }
    }

    pub fn unsupported_format(name: impl Into<String>) -> Self {
        Self::UnsupportedFormat { name: name.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    pub fn engine_unavailable(msg: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            message: msg.into(),
        }
    }

    /// Whether this error came from the external engine rejecting an invocation.
    pub fn is_encode_failure(&self) -> bool {
        matches!(self, Self::EncodeFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_count_message_names_template() {
        let err = MediaError::InvalidInputCount {
            template: "2x2".to_string(),
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Template 2x2 requires exactly 4 inputs, got 3"
        );
    }

    #[test]
    fn encode_failure_is_detected() {
        assert!(MediaError::encode_failed("exit status: 1", "boom").is_encode_failure());
        assert!(!MediaError::invalid_metadata("zero width").is_encode_failure());
    }
}
