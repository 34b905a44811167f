// Error handling for the playback engine

use std::fmt;

/// Playback error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The source could not be opened or probed
    OpenError(String),

    /// The source has no recognizable audio track
    FormatError(String),

    /// No decoder could be created or configured for the track
    DecoderInitError(String),

    /// Audio output device error
    DeviceError(String),

    /// Decoding error inside a running session
    DecodingError(String),

    /// Operation not valid in the current state
    InvalidState(String),

    /// Thread spawn or synchronization error
    ThreadError(String),

    /// IO error
    IoError(String),

    /// Network error (URL sources)
    NetworkError(String),

    /// Generic error
    Other(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AudioError::OpenError(msg) => write!(f, "Open error: {}", msg),
            AudioError::FormatError(msg) => write!(f, "Format error: {}", msg),
            AudioError::DecoderInitError(msg) => write!(f, "Decoder init error: {}", msg),
            AudioError::DeviceError(msg) => write!(f, "Device error: {}", msg),
            AudioError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AudioError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AudioError::ThreadError(msg) => write!(f, "Thread error: {}", msg),
            AudioError::IoError(msg) => write!(f, "IO error: {}", msg),
            AudioError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AudioError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result type alias for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

// Conversion implementations
impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::IoError(err.to_string())
    }
}
