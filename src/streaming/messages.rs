use serde::{Deserialize, Serialize};

/// Messages received from the transcription service.
///
/// Every inbound text frame is a JSON object tagged by a `"type"` field.
/// Unknown fields are ignored so protocol additions don't break parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Begin(BeginEvent),
    Turn(TurnEvent),
    Termination(TerminationEvent),
}

/// Sent once when the service has accepted the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginEvent {
    /// Server-assigned session identifier
    pub id: String,
    /// Unix timestamp after which the session expires
    pub expires_at: Option<i64>,
}

/// A transcript turn, re-emitted as it is refined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Transcript text for this turn so far
    #[serde(default)]
    pub transcript: String,
    /// The speaker has paused; this turn's transcript is finalized
    #[serde(default)]
    pub end_of_turn: bool,
    /// Punctuation/casing normalization has been applied
    #[serde(default)]
    pub turn_is_formatted: bool,
    /// Monotonic index of this turn within the session
    #[serde(default)]
    pub turn_order: u32,
    /// Service confidence that the turn has ended
    pub end_of_turn_confidence: Option<f64>,
}

/// Sent once when the service closes the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminationEvent {
    /// Total seconds of audio the service processed
    #[serde(default)]
    pub audio_duration_seconds: f64,
    /// Wall-clock seconds the session was open
    pub session_duration_seconds: Option<f64>,
}

/// An error surfaced by the service or the connection itself.
///
/// Errors are delivered asynchronously; the service decides whether they are
/// fatal to the stream.
#[derive(Debug, Clone)]
pub struct StreamingError {
    pub message: String,
}

impl StreamingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StreamingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Control messages sent to the transcription service.
///
/// Audio itself travels as binary frames (raw PCM s16le); these JSON messages
/// cover session configuration and shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Update session parameters mid-stream
    UpdateConfiguration {
        /// Request formatted (punctuated/capitalized) turns
        format_turns: bool,
    },
    /// Ask the service to close the session and send a Termination event
    Terminate,
}
