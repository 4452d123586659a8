//! Error taxonomy for the core library.
//!
//! Transport and server failures are translated into [`ApiError`] at the API
//! client boundary, so presentation code never sees a raw `reqwest` error.
//! Render and device failures stay local to the diagram panel and the voice
//! session respectively.

use thiserror::Error;

/// Failures from calls to the BrainCraft backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response reached the client (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// A response arrived with an error status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// A success status whose body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Get a message suitable for showing inline in the chat or footer
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => {
                "Could not reach the BrainCraft backend. Is it running?".to_string()
            }
            ApiError::Server { status, message } if message.is_empty() => {
                format!("The backend returned an error ({}).", status)
            }
            ApiError::Server { message, .. } => format!("The backend reported: {}", message),
            ApiError::InvalidResponse(_) => {
                "The backend sent a response that could not be understood.".to_string()
            }
        }
    }

    /// HTTP status attached to the failure, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Diagram rendering failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer rejected the diagram source
    #[error("Diagram syntax error: {0}")]
    Syntax(String),

    /// The renderer could not be started at all
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    #[error("Render I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Io(e.to_string())
    }
}

impl RenderError {
    pub fn user_message(&self) -> String {
        match self {
            RenderError::Syntax(message) => message.clone(),
            RenderError::Unavailable(message) => {
                format!("Mermaid CLI not available ({}). Install it with: npm i -g @mermaid-js/mermaid-cli", message)
            }
            RenderError::Io(message) => format!("Could not write diagram files: {}", message),
        }
    }
}

/// Microphone and speaker failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Audio device permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Audio payload could not be decoded for playback
    #[error("Audio decode error: {0}")]
    Decode(String),
}

impl DeviceError {
    pub fn user_message(&self) -> String {
        match self {
            DeviceError::Unavailable(_) => "No audio device available.".to_string(),
            DeviceError::PermissionDenied(_) => {
                "Microphone access was denied. Check permissions and try again.".to_string()
            }
            DeviceError::Stream(_) => "Audio device error. Please try again.".to_string(),
            DeviceError::Decode(_) => "Could not play the synthesized speech.".to_string(),
        }
    }
}

/// Failures while speaking a reply: synthesis or playback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl VoiceError {
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::Api(e) => e.user_message(),
            VoiceError::Device(e) => e.user_message(),
        }
    }
}
