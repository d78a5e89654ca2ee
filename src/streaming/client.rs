use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::events::EventHandlers;
use super::messages::{ClientMessage, ServerMessage, StreamingError};
use super::transport::{OutboundMessage, SessionControl, StreamingTransport};

/// How long to wait for the websocket handshake before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to keep reading after a Terminate request, waiting for the
/// service's Termination event and close frame.
const TERMINATE_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection parameters for the streaming transcription service.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// API key sent in the Authorization header
    pub api_key: String,
    /// Service hostname (no scheme)
    pub host: String,
    /// PCM sample rate of the audio frames we will send
    pub sample_rate: u32,
    /// Request formatted (punctuated/capitalized) turns from the start
    pub format_turns: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: "streaming.assemblyai.com".to_string(),
            sample_rate: 16000,
            format_turns: true,
        }
    }
}

/// Websocket client for the streaming transcription service.
///
/// Audio frames and control messages are pushed onto an unbounded queue; a
/// background task pumps the queue into the socket and dispatches inbound
/// events to the registered handlers.
pub struct StreamingClient {
    config: StreamingConfig,
    control: SessionControl,
    outbound_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
    pump_handle: Option<tokio::task::JoinHandle<()>>,
}

impl StreamingClient {
    pub fn new(config: StreamingConfig) -> Result<Self> {
        anyhow::ensure!(!config.api_key.is_empty(), "API key must be non-empty");

        let (control, outbound_rx) = SessionControl::channel();
        Ok(Self {
            config,
            control,
            outbound_rx: Some(outbound_rx),
            pump_handle: None,
        })
    }

    /// Build the websocket URL with session parameters as query pairs.
    fn build_websocket_url(&self) -> Result<String> {
        let mut url = Url::parse(&format!("wss://{}/v3/ws", self.config.host))
            .context("Invalid service host")?;

        url.query_pairs_mut()
            .append_pair("sample_rate", &self.config.sample_rate.to_string())
            .append_pair("format_turns", &self.config.format_turns.to_string())
            .append_pair("encoding", "pcm_s16le");

        Ok(url.to_string())
    }
}

#[async_trait::async_trait]
impl StreamingTransport for StreamingClient {
    async fn connect(&mut self, handlers: EventHandlers) -> Result<()> {
        let ws_url = self.build_websocket_url()?;
        debug!("Connecting to {}", ws_url);

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .uri(&ws_url)
            .header("Host", self.config.host.clone())
            .header("Authorization", self.config.api_key.clone())
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .body(())
            .context("Failed to build websocket request")?;

        let connect = timeout(CONNECT_TIMEOUT, connect_async(request)).await;
        let ws_stream = match connect {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                // Auth and network failures surface through the error
                // handler, same as errors arriving mid-stream.
                handlers.dispatch_error(&StreamingError::new(format!("Connection failed: {e}")));
                return Err(e).context("Failed to connect to transcription service");
            }
            Err(_) => {
                let err = StreamingError::new("Connection timed out");
                handlers.dispatch_error(&err);
                anyhow::bail!("Connection to {} timed out", self.config.host);
            }
        };

        info!("Connected to transcription service at {}", self.config.host);

        let (sink, stream) = ws_stream.split();
        let outbound_rx = self
            .outbound_rx
            .take()
            .context("Client already connected")?;

        self.pump_handle = Some(tokio::spawn(pump(sink, stream, outbound_rx, handlers)));
        Ok(())
    }

    fn control(&self) -> SessionControl {
        self.control.clone()
    }

    async fn send_audio(&mut self, pcm: Vec<u8>) -> Result<()> {
        anyhow::ensure!(self.pump_handle.is_some(), "Not connected");
        self.control.send_audio(pcm)
    }

    async fn terminate(&mut self) -> Result<()> {
        let Some(handle) = self.pump_handle.take() else {
            return Ok(()); // never connected, nothing to release
        };

        info!("Terminating session");
        // The pump drains remaining events after forwarding Terminate, then
        // closes the socket and exits.
        let _ = self.control.terminate();
        if timeout(Duration::from_secs(5), handle).await.is_err() {
            warn!("Timed out waiting for connection task to finish");
        }
        Ok(())
    }
}

impl Drop for StreamingClient {
    fn drop(&mut self) {
        // Last-resort disconnect if the session was never terminated. The
        // pump exits once the Terminate message has been forwarded.
        if self.pump_handle.is_some() {
            let _ = self.control.terminate();
        }
    }
}

/// Pump outbound audio/control messages into the socket and dispatch inbound
/// events to the handlers. Runs until the stream ends, an error occurs, or a
/// Terminate control message is forwarded.
async fn pump(
    mut sink: WsSink,
    mut stream: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    handlers: EventHandlers,
) {
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(OutboundMessage::Audio(pcm)) => {
                    debug!("Sending {} bytes of audio", pcm.len());
                    if let Err(e) = sink.send(Message::Binary(pcm)).await {
                        handlers.dispatch_error(&StreamingError::new(format!(
                            "Failed to send audio: {e}"
                        )));
                        break;
                    }
                }
                Some(OutboundMessage::Control(msg)) => {
                    let terminating = msg == ClientMessage::Terminate;
                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if let Err(e) = sink.send(Message::Text(json)).await {
                                error!("Failed to send control message: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to encode control message: {}", e);
                            continue;
                        }
                    }
                    if terminating {
                        drain_until_closed(&mut stream, &handlers).await;
                        break;
                    }
                }
                None => {
                    // client dropped without terminating
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(msg)) => {
                    if handle_message(msg, &handlers) == Flow::Closed {
                        break;
                    }
                }
                Some(Err(e)) => {
                    handlers.dispatch_error(&StreamingError::new(format!("Stream error: {e}")));
                    break;
                }
                None => {
                    info!("Websocket stream ended");
                    break;
                }
            },
        }
    }

    let _ = sink.close().await;
    info!("Connection closed");
}

/// Keep dispatching inbound events until the service closes the connection.
/// Bounded by [`TERMINATE_DRAIN_TIMEOUT`] so a silent server can't hang
/// shutdown.
async fn drain_until_closed(stream: &mut WsStream, handlers: &EventHandlers) {
    let drain = async {
        while let Some(inbound) = stream.next().await {
            match inbound {
                Ok(msg) => {
                    if handle_message(msg, handlers) == Flow::Closed {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    };

    if timeout(TERMINATE_DRAIN_TIMEOUT, drain).await.is_err() {
        warn!("Service did not close the session after Terminate");
    }
}

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Closed,
}

/// Error payload the service sends for non-fatal problems.
#[derive(Debug, Deserialize)]
struct ErrorMessage {
    error: String,
}

fn handle_message(message: Message, handlers: &EventHandlers) -> Flow {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(ServerMessage::Begin(event)) => handlers.dispatch_begin(&event),
                Ok(ServerMessage::Turn(event)) => handlers.dispatch_turn(&event),
                Ok(ServerMessage::Termination(event)) => handlers.dispatch_termination(&event),
                Err(_) => {
                    if let Ok(err) = serde_json::from_str::<ErrorMessage>(&text) {
                        handlers.dispatch_error(&StreamingError::new(err.error));
                    } else {
                        warn!("Unrecognized message from service: {}", text);
                    }
                }
            }
            Flow::Continue
        }
        Message::Close(frame) => {
            info!("Service closed the connection: {:?}", frame);
            Flow::Closed
        }
        Message::Binary(data) => {
            warn!("Unexpected binary message ({} bytes)", data.len());
            Flow::Continue
        }
        // Pings are answered by the websocket library
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Flow::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_session_parameters() {
        let client = StreamingClient::new(StreamingConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        })
        .unwrap();

        let url = client.build_websocket_url().unwrap();
        assert!(url.starts_with("wss://streaming.assemblyai.com/v3/ws"));
        assert!(url.contains("sample_rate=16000"));
        assert!(url.contains("format_turns=true"));
        assert!(url.contains("encoding=pcm_s16le"));
    }

    #[test]
    fn empty_api_key_is_rejected_locally() {
        let result = StreamingClient::new(StreamingConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn turn_event_is_dispatched() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handlers = EventHandlers::new().on_turn(move |event| {
            assert_eq!(event.transcript, "hello world");
            assert!(event.end_of_turn);
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let json = r#"{"type":"Turn","transcript":"hello world","end_of_turn":true,"turn_is_formatted":false,"turn_order":1}"#;
        let flow = handle_message(Message::Text(json.to_string()), &handlers);

        assert_eq!(flow, Flow::Continue);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn service_error_payload_reaches_error_handler() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handlers = EventHandlers::new().on_error(move |err| {
            assert_eq!(err.message, "Invalid API key");
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let json = r#"{"error":"Invalid API key"}"#;
        handle_message(Message::Text(json.to_string()), &handlers);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_frame_stops_the_pump() {
        let handlers = EventHandlers::new();
        assert_eq!(handle_message(Message::Close(None), &handlers), Flow::Closed);
    }
}
