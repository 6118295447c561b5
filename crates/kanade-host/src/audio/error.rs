//! Audio host error types

use thiserror::Error;

/// Errors that can occur during audio operations
#[derive(Error, Debug)]
pub enum AudioError {
    /// No default output device available
    #[error("No audio output device found")]
    NoDevice,

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Offline rendering was asked to run with unusable parameters
    #[error("Invalid offline parameters: {0}")]
    InvalidOfflineParams(String),

    /// Offline rendering was driven without a prior prepare
    #[error("Offline renderer used before prepare")]
    OfflineNotPrepared,

    /// Export could not open or write its output
    #[error("Export failed: {0}")]
    Export(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
