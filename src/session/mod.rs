//! Transcription session driver
//!
//! This module owns one streaming session end-to-end:
//! - Lifecycle handler registration and the stdout output contract
//! - Forwarding audio frames from a capture backend to the connection
//! - Guaranteed terminate-and-disconnect on every exit path
//! - Session statistics

pub mod handlers;
mod session;
mod stats;

pub use session::TranscriptionSession;
pub use stats::SessionStats;
