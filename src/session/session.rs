use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::handlers;
use super::stats::SessionStats;
use crate::audio::AudioFrame;
use crate::streaming::{EventHandlers, StreamingTransport};

/// One end-to-end transcription session.
///
/// Registers the lifecycle handlers, opens the connection, forwards audio
/// frames until the source ends or shutdown is signalled, and always
/// releases the remote session with a termination request on the way out.
/// Single-shot: each run consumes the session.
pub struct TranscriptionSession<T: StreamingTransport> {
    transport: T,
    frames_sent: u64,
    bytes_sent: u64,
    turns_received: Arc<AtomicU64>,
}

impl<T: StreamingTransport> TranscriptionSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            frames_sent: 0,
            bytes_sent: 0,
            turns_received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the session to completion.
    ///
    /// Exits when the frame channel closes (audio source ended), shutdown is
    /// signalled (e.g. Ctrl-C), or streaming fails. The remote session is
    /// terminated on every one of those paths before this returns.
    pub async fn run(
        mut self,
        frames: mpsc::Receiver<AudioFrame>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<SessionStats> {
        let started_at = Utc::now();

        let result = self.stream(frames, shutdown).await;

        // Cleanup is unconditional; a session that was opened must be
        // released even when streaming ended in an error.
        if let Err(e) = self.transport.terminate().await {
            warn!("Failed to terminate session cleanly: {}", e);
        }

        result?;

        let duration = Utc::now().signed_duration_since(started_at);
        Ok(SessionStats {
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent,
            bytes_sent: self.bytes_sent,
            turns_received: self.turns_received.load(Ordering::SeqCst),
        })
    }

    async fn stream(
        &mut self,
        mut frames: mpsc::Receiver<AudioFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let handlers = self.lifecycle_handlers();
        self.transport.connect(handlers).await?;

        loop {
            tokio::select! {
                maybe_frame = frames.recv() => match maybe_frame {
                    Some(frame) => {
                        let pcm = frame.to_pcm_bytes();
                        self.frames_sent += 1;
                        self.bytes_sent += pcm.len() as u64;
                        self.transport.send_audio(pcm).await?;
                    }
                    None => {
                        info!("Audio source ended");
                        break;
                    }
                },
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    /// The dispatch table: one handler per lifecycle event, all printing to
    /// stdout. Registered before the connection opens.
    fn lifecycle_handlers(&self) -> EventHandlers {
        let control = self.transport.control();
        let turns = Arc::clone(&self.turns_received);

        EventHandlers::new()
            .on_begin(|event| {
                handlers::print_session_begin(&mut std::io::stdout(), event);
            })
            .on_turn(move |event| {
                turns.fetch_add(1, Ordering::SeqCst);
                handlers::handle_turn(&mut std::io::stdout(), &control, event);
            })
            .on_termination(|event| {
                handlers::print_session_termination(&mut std::io::stdout(), event);
            })
            .on_error(|error| {
                handlers::print_streaming_error(&mut std::io::stdout(), error);
            })
    }
}

/// Resolves once shutdown is signalled. If the sender side goes away without
/// signalling, never resolves, leaving the frame stream in charge of exit.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while shutdown.changed().await.is_ok() {
        if *shutdown.borrow() {
            return;
        }
    }
    std::future::pending::<()>().await;
}
