//! Error handling for Cadenza
//!
//! Analysis underflow and stale renders are not errors: they surface as
//! `None` values. Everything here is a genuine failure the caller must see.

use thiserror::Error;

/// Result type alias for Cadenza operations
pub type Result<T> = std::result::Result<T, CadenzaError>;

/// Main error type for Cadenza operations
#[derive(Error, Debug)]
pub enum CadenzaError {
    // Decode Errors
    #[error("Invalid audio data: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Encode Errors
    #[error("Failed to encode audio: {reason}")]
    EncodeError { reason: String },

    // Session Errors
    #[error("Layer not found: {layer_id}")]
    LayerNotFound { layer_id: String },

    #[error("Invalid render request: {reason}")]
    InvalidRender { reason: String },

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CadenzaError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            CadenzaError::InvalidAudio { .. } => "INVALID_AUDIO",
            CadenzaError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            CadenzaError::EmptyAudio => "EMPTY_AUDIO",
            CadenzaError::EncodeError { .. } => "ENCODE_ERROR",
            CadenzaError::LayerNotFound { .. } => "LAYER_NOT_FOUND",
            CadenzaError::InvalidRender { .. } => "INVALID_RENDER",
            CadenzaError::TaskFailed { .. } => "TASK_FAILED",
            CadenzaError::Io(_) => "IO_ERROR",
            CadenzaError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Decode problems only affect the offending layer; the session stays usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CadenzaError::InvalidAudio { .. }
                | CadenzaError::UnsupportedFormat { .. }
                | CadenzaError::EmptyAudio
                | CadenzaError::LayerNotFound { .. }
                | CadenzaError::InvalidRender { .. }
        )
    }

    pub(crate) fn invalid_audio(reason: impl Into<String>, source: hound::Error) -> Self {
        CadenzaError::InvalidAudio {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}
