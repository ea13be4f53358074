use thiserror::Error;

/// Errors surfaced to the control layer. The audio callback never produces these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("failed to load {module} kernel: {reason}")]
    ModuleLoad { module: &'static str, reason: String },

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("engine not initialized")]
    NotInitialized,

    #[error("command queue full, audio thread may be stalled")]
    CommandQueueFull,
}

pub type SynthResult<T> = Result<T, SynthError>;
