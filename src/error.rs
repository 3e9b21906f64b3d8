use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while composing or running frame pipelines
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A load target could not be turned into a frame
    #[error("resource not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    /// A guard rejected an empty frame
    #[error("invalid frame: empty or unreadable")]
    InvalidFrame,

    /// A stream source failed to open; carries the recorded error string
    #[error("source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    /// End of stream. Drivers and batch loops treat this as a control signal.
    #[error("end of stream")]
    StreamExhausted,

    #[error("unknown {kind} strategy: {name}")]
    UnknownStrategy { kind: &'static str, name: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any failure raised inside a stage or a collaborator
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// True for the end-of-stream signal, whether raised by a source or a stage
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, PipelineError::StreamExhausted)
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
