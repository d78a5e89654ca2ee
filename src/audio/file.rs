use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::{decimate, to_mono, AudioBackend, AudioBackendConfig, AudioFrame};

/// WAV file audio backend, for tests and batch runs.
///
/// Frames are emitted paced at roughly real time so the streaming service
/// sees the same cadence as a live microphone. The frame channel closes at
/// end of file, which ends the session normally.
pub struct WavFileBackend {
    path: String,
    config: AudioBackendConfig,
    capturing: Arc<AtomicBool>,
}

impl WavFileBackend {
    pub fn new(path: impl Into<String>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read the whole file, mixed to mono at the target sample rate.
    fn read_samples(path: &Path, config: &AudioBackendConfig) -> Result<Vec<i16>> {
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        info!(
            "Loaded {}: {}Hz, {} channels, {} samples",
            path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        let mono = to_mono(&samples, spec.channels);
        Ok(decimate(&mono, spec.sample_rate, config.target_sample_rate))
    }
}

#[async_trait::async_trait]
impl AudioBackend for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let samples = Self::read_samples(Path::new(&self.path), &self.config)?;

        let (tx, rx) = mpsc::channel(32);
        let sample_rate = self.config.target_sample_rate;
        let frame_len =
            ((sample_rate as u64 * self.config.buffer_duration_ms / 1000) as usize).max(1);
        let pace = Duration::from_millis(self.config.buffer_duration_ms);
        let capturing = Arc::clone(&self.capturing);

        capturing.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            let mut timestamp_ms = 0u64;
            for chunk in samples.chunks(frame_len) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels: 1,
                    timestamp_ms,
                };
                timestamp_ms += (chunk.len() as u64 * 1000) / sample_rate as u64;

                if tx.send(frame).await.is_err() {
                    break; // consumer gone
                }
                tokio::time::sleep(pace).await;
            }

            capturing.store(false, Ordering::SeqCst);
            // tx drops here, closing the channel and ending the stream
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
