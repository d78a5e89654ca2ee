use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::events::EventHandlers;
use super::messages::ClientMessage;

/// One outbound item on the session's send queue.
///
/// Audio travels as raw PCM bytes (binary websocket frames); everything else
/// is a JSON control message.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Audio(Vec<u8>),
    Control(ClientMessage),
}

/// Cheap clonable handle for sending control messages to a live session.
///
/// Handlers hold one of these so they can issue follow-up requests (e.g.
/// enabling formatted turns) without owning the client.
#[derive(Clone)]
pub struct SessionControl {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl SessionControl {
    /// Create a control handle together with the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send_audio(&self, pcm: Vec<u8>) -> Result<()> {
        self.tx
            .send(OutboundMessage::Audio(pcm))
            .context("Session send queue closed")
    }

    /// Ask the service to enable or disable formatted turns mid-stream.
    pub fn set_turn_formatting(&self, enabled: bool) -> Result<()> {
        self.tx
            .send(OutboundMessage::Control(ClientMessage::UpdateConfiguration {
                format_turns: enabled,
            }))
            .context("Session send queue closed")
    }

    pub fn terminate(&self) -> Result<()> {
        self.tx
            .send(OutboundMessage::Control(ClientMessage::Terminate))
            .context("Session send queue closed")
    }
}

/// Connection to a streaming transcription service.
///
/// The production implementation is [`super::StreamingClient`]; tests drive
/// the session against a fake.
#[async_trait::async_trait]
pub trait StreamingTransport: Send {
    /// Open the connection. Handlers must be registered here, before any
    /// audio flows.
    async fn connect(&mut self, handlers: EventHandlers) -> Result<()>;

    /// Handle for issuing control messages from handlers.
    fn control(&self) -> SessionControl;

    /// Forward one frame of PCM s16le audio.
    async fn send_audio(&mut self, pcm: Vec<u8>) -> Result<()>;

    /// Close the session with a termination request. Idempotent; safe to
    /// call even if the connection never opened.
    async fn terminate(&mut self) -> Result<()>;
}
