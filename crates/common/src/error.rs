//! Error types shared across Drillreel crates.

use std::path::PathBuf;

/// Top-level error type for Drillreel operations.
///
/// Every variant here is fatal for the job that raised it. Recoverable
/// asset failures (missing photo, unreadable audio) never reach this type;
/// the render engine records them as degradations instead.
#[derive(Debug, thiserror::Error)]
pub enum DrillreelError {
    #[error("Invalid render input: {message}")]
    RenderInput { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Persistence error: {message} (encoded file kept at {local_path})")]
    Persistence {
        message: String,
        local_path: PathBuf,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using DrillreelError.
pub type DrillreelResult<T> = Result<T, DrillreelError>;

impl DrillreelError {
    pub fn render_input(msg: impl Into<String>) -> Self {
        Self::RenderInput {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self::Persistence {
            message: msg.into(),
            local_path: local_path.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Stable machine-readable tag for structured failure payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RenderInput { .. } => "render_input",
            Self::Encode { .. } => "encode",
            Self::Persistence { .. } => "persistence",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
        }
    }
}
