use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio frames forwarded to the service
    pub frames_sent: u64,

    /// Number of PCM bytes forwarded to the service
    pub bytes_sent: u64,

    /// Number of transcript turns received
    pub turns_received: u64,
}
