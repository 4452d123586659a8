pub mod api;
pub mod clock;
pub mod config;
pub mod connection;
pub mod controller;
pub mod diagram;
pub mod error;
pub mod logger;
pub mod state;
pub mod voice;

// Re-export main types for convenience
pub use api::{ApiClient, ChatBackend, ChatReply};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use connection::{ConnectionIndicator, ConnectionStatus};
pub use controller::{resolve_diagram, PageController, FALLBACK_REPLY, WELCOME_MESSAGE};
pub use diagram::{DiagramData, DiagramKind, DiagramPanel, MermaidCli, RenderState};
pub use error::{ApiError, DeviceError, RenderError, VoiceError};
pub use logger::{init_tracing, LogLevel, LogSettings, Logger};
pub use state::{Message, MessageStore, Sender};
pub use voice::{AudioCapture, AudioPlayback, NoAudioDevice, VoiceSession};
