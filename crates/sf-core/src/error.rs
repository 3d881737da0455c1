//! Unified error type for splitforge.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the CLI to print a single readable message and pick an exit status via
//! [`Error::exit_code`].

/// Unified error type covering all failure modes in splitforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input could not be read as media, or its duration is unknown.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The input has zero duration, or the plan would contain no windows.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// The processing engine failed to initialize.
    #[error("Engine failed to load: {0}")]
    EngineLoadFailure(String),

    /// Processing of a single window failed; the whole operation is aborted.
    #[error("Segment {} failed: {message}", index + 1)]
    SegmentFailure {
        /// Zero-based index of the window that failed.
        index: usize,
        /// Human-readable error description.
        message: String,
    },

    /// A split spec, option, or configuration value is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with existing state (busy orchestrator,
    /// existing output file).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation was cancelled between windows.
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) could not be run or exited non-zero.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit status.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Validation(_) => 2,
            Error::UnsupportedFormat(_) | Error::EmptyInput(_) => 3,
            Error::EngineLoadFailure(_) => 4,
            Error::SegmentFailure { .. } => 5,
            Error::Conflict(_) => 6,
            Error::Cancelled => 130,
            Error::Io { .. } | Error::Tool { .. } | Error::Internal(_) => 1,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::SegmentFailure`].
    pub fn segment(index: usize, message: impl Into<String>) -> Self {
        Error::SegmentFailure {
            index,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
