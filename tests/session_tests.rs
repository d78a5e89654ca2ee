// Session driver tests against a fake transport.
//
// The key property: the remote session is terminated exactly once on every
// exit path (normal completion, shutdown signal, streaming error).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, watch};

use live_transcribe::audio::AudioFrame;
use live_transcribe::streaming::{
    EventHandlers, OutboundMessage, SessionControl, StreamingTransport,
};
use live_transcribe::TranscriptionSession;

struct FakeTransport {
    control: SessionControl,
    // Keeps the control queue open for the lifetime of the fake
    _control_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    connect_calls: Arc<AtomicUsize>,
    terminate_calls: Arc<AtomicUsize>,
    audio_frames: Arc<AtomicUsize>,
    fail_on_audio: bool,
}

impl FakeTransport {
    fn new(fail_on_audio: bool) -> Self {
        let (control, control_rx) = SessionControl::channel();
        Self {
            control,
            _control_rx: control_rx,
            connect_calls: Arc::new(AtomicUsize::new(0)),
            terminate_calls: Arc::new(AtomicUsize::new(0)),
            audio_frames: Arc::new(AtomicUsize::new(0)),
            fail_on_audio,
        }
    }
}

#[async_trait::async_trait]
impl StreamingTransport for FakeTransport {
    async fn connect(&mut self, _handlers: EventHandlers) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn control(&self) -> SessionControl {
        self.control.clone()
    }

    async fn send_audio(&mut self, _pcm: Vec<u8>) -> Result<()> {
        if self.fail_on_audio {
            anyhow::bail!("send failed");
        }
        self.audio_frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn frame() -> AudioFrame {
    AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    }
}

#[tokio::test]
async fn normal_completion_terminates_exactly_once() {
    let transport = FakeTransport::new(false);
    let connects = Arc::clone(&transport.connect_calls);
    let terminates = Arc::clone(&transport.terminate_calls);
    let sent = Arc::clone(&transport.audio_frames);

    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    frame_tx.send(frame()).await.unwrap();
    frame_tx.send(frame()).await.unwrap();
    drop(frame_tx); // source ends -> normal completion

    let stats = TranscriptionSession::new(transport)
        .run(frame_rx, shutdown_rx)
        .await
        .unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert_eq!(terminates.load(Ordering::SeqCst), 1);
    assert_eq!(sent.load(Ordering::SeqCst), 2);
    assert_eq!(stats.frames_sent, 2);
    assert_eq!(stats.bytes_sent, 2 * 3200);
}

#[tokio::test]
async fn shutdown_signal_terminates_exactly_once() {
    let transport = FakeTransport::new(false);
    let terminates = Arc::clone(&transport.terminate_calls);

    // Frame channel stays open; only the shutdown signal can end the run.
    let (_frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let session = TranscriptionSession::new(transport);
    let run = tokio::spawn(session.run(frame_rx, shutdown_rx));

    shutdown_tx.send(true).unwrap();

    let stats = run.await.unwrap().unwrap();
    assert_eq!(terminates.load(Ordering::SeqCst), 1);
    assert_eq!(stats.frames_sent, 0);
}

#[tokio::test]
async fn streaming_error_still_terminates_exactly_once() {
    let transport = FakeTransport::new(true);
    let terminates = Arc::clone(&transport.terminate_calls);

    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    frame_tx.send(frame()).await.unwrap();

    let result = TranscriptionSession::new(transport)
        .run(frame_rx, shutdown_rx)
        .await;

    assert!(result.is_err());
    assert_eq!(terminates.load(Ordering::SeqCst), 1);
}
