pub mod audio;
pub mod config;
pub mod session;
pub mod streaming;

pub use audio::{
    create_backend, AudioBackend, AudioBackendConfig, AudioFrame, AudioSource, MicrophoneBackend,
    WavFileBackend,
};
pub use config::{ApiCredentials, Config, API_KEY_ENV_VAR};
pub use session::{SessionStats, TranscriptionSession};
pub use streaming::{
    BeginEvent, ClientMessage, EventHandlers, SessionControl, StreamingClient, StreamingConfig,
    StreamingError, StreamingTransport, TerminationEvent, TurnEvent,
};
