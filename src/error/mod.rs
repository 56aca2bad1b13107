//! Error types for voxlink.

use thiserror::Error;

/// Primary error type for all voxlink operations.
#[derive(Error, Debug)]
pub enum VoxlinkError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transcription failed for item {item_id}: {message}")]
    Transcription { item_id: String, message: String },

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification used by callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Transcription,
    Audio,
    Authentication,
    Timeout,
    State,
    Serialization,
    Io,
}

impl VoxlinkError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Transcription { .. } => ErrorCategory::Transcription,
            Self::AudioFormat(_) => ErrorCategory::Audio,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::InvalidState(_) => ErrorCategory::State,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error aborts the whole session.
    ///
    /// Protocol, transcription, and post-commit timeout errors are scoped to a
    /// single event, item, or turn; everything else tears the session down.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Protocol | ErrorCategory::Transcription | ErrorCategory::Timeout
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoxlinkError>;
