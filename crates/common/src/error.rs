//! Error types shared across Kinetype crates.

/// Top-level error type for export operations.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid export spec: {message}")]
    Validation { message: String },

    #[error("Capture failed at frame {frame}: {message}")]
    Capture { frame: u64, message: String },

    #[error("Batch continuity violated: {message}")]
    Continuity { message: String },

    #[error("Encoding failed for batch {batch}: {message}")]
    Encode { batch: usize, message: String },

    #[error("Composition failed: {message}")]
    Compose { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("An export is already running on this exporter")]
    AlreadyRunning,

    #[error("Session error: {message}")]
    Session { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ExportError.
pub type ExportResult<T> = Result<T, ExportError>;

impl ExportError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn capture(frame: u64, msg: impl Into<String>) -> Self {
        Self::Capture {
            frame,
            message: msg.into(),
        }
    }

    pub fn continuity(msg: impl Into<String>) -> Self {
        Self::Continuity {
            message: msg.into(),
        }
    }

    pub fn encode(batch: usize, msg: impl Into<String>) -> Self {
        Self::Encode {
            batch,
            message: msg.into(),
        }
    }

    pub fn compose(msg: impl Into<String>) -> Self {
        Self::Compose {
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    /// Whether this error is the cooperative-stop outcome rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
