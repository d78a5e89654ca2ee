//! Streaming transcription service client
//!
//! This module implements the service's websocket wire protocol:
//! - Binary frames carry raw PCM s16le audio outbound
//! - JSON text frames carry control messages outbound and lifecycle events
//!   (Begin, Turn, Termination) inbound
//! - Errors are delivered asynchronously, both as service payloads and as
//!   connection failures

pub mod client;
pub mod events;
pub mod messages;
pub mod transport;

pub use client::{StreamingClient, StreamingConfig};
pub use events::EventHandlers;
pub use messages::{
    BeginEvent, ClientMessage, ServerMessage, StreamingError, TerminationEvent, TurnEvent,
};
pub use transport::{OutboundMessage, SessionControl, StreamingTransport};
