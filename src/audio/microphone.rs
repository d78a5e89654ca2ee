use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{decimate, to_mono, AudioBackend, AudioBackendConfig, AudioFrame};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched while holding the Mutex in
/// MicrophoneBackend, so it never crosses threads concurrently.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture backend using cpal.
///
/// Captures 16-bit PCM at the configured rate and channel count, falling back
/// to the device's native format with software conversion (channel mixing +
/// decimation) when the preferred format is rejected.
pub struct MicrophoneBackend {
    device: cpal::Device,
    device_name: String,
    config: AudioBackendConfig,
    stream: Mutex<Option<SendableStream>>,
    capturing: AtomicBool,
}

impl MicrophoneBackend {
    /// Open the named input device, or the system default if `device` is None.
    pub fn new(device: Option<String>, config: AudioBackendConfig) -> Result<Self> {
        let host = cpal::default_host();

        let device = match &device {
            Some(name) => {
                let mut found = None;
                for dev in host
                    .input_devices()
                    .context("Failed to enumerate input devices")?
                {
                    if dev.name().map(|n| n == *name).unwrap_or(false) {
                        found = Some(dev);
                        break;
                    }
                }
                found.with_context(|| format!("Input device not found: {name}"))?
            }
            None => host
                .default_input_device()
                .context("No default input device available")?,
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Using input device: {}", device_name);

        Ok(Self {
            device,
            device_name,
            config,
            stream: Mutex::new(None),
            capturing: AtomicBool::new(false),
        })
    }

    fn build_stream(&self, tx: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream> {
        let preferred = cpal::StreamConfig {
            channels: self.config.target_channels,
            sample_rate: cpal::SampleRate(self.config.target_sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            warn!("Audio stream error: {}", err);
        };

        // Preferred path: the device (or its sound server) delivers the
        // target format directly.
        let mut assembler = FrameAssembler::new(tx.clone(), &self.config, self.config.target_channels);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                assembler.push(data);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Some devices only expose float formats.
        let mut assembler = FrameAssembler::new(tx.clone(), &self.config, self.config.target_channels);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                assembler.push_f32(data);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Fallback: capture at the device's native config and convert in
        // software.
        let default_config = self
            .device
            .default_input_config()
            .context("Failed to query default input config")?;
        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels();
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        info!(
            "Device rejected {}Hz/{}ch, capturing native {}Hz/{}ch with software conversion",
            self.config.target_sample_rate,
            self.config.target_channels,
            native_rate,
            native_channels
        );

        let mut assembler = FrameAssembler::new(tx, &self.config, native_channels);
        assembler.native_rate = native_rate;

        match default_config.sample_format() {
            cpal::SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        assembler.push(data);
                    },
                    err_callback,
                    None,
                )
                .context("Failed to build native i16 input stream"),
            cpal::SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        assembler.push_f32(data);
                    },
                    err_callback,
                    None,
                )
                .context("Failed to build native f32 input stream"),
            fmt => anyhow::bail!("Unsupported native sample format: {fmt:?}"),
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(32);

        let stream = self.build_stream(tx)?;
        stream.play().context("Failed to start audio stream")?;

        {
            let mut guard = self
                .stream
                .lock()
                .map_err(|_| anyhow::anyhow!("Audio stream lock poisoned"))?;
            *guard = Some(SendableStream(stream));
        }

        self.capturing.store(true, Ordering::SeqCst);
        info!("Microphone capture started ({})", self.device_name);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        let mut guard = self
            .stream
            .lock()
            .map_err(|_| anyhow::anyhow!("Audio stream lock poisoned"))?;

        if let Some(stream) = guard.take() {
            // Dropping the stream also drops the frame sender, which closes
            // the receiver on the consumer side.
            stream.0.pause().context("Failed to stop audio stream")?;
        }

        self.capturing.store(false, Ordering::SeqCst);
        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

/// Accumulates raw device samples into fixed-duration frames and pushes them
/// to the consumer channel. Runs inside the cpal callback thread, so sends
/// are non-blocking; frames are dropped if the consumer falls behind.
struct FrameAssembler {
    tx: mpsc::Sender<AudioFrame>,
    buffer: Vec<i16>,
    samples_per_frame: usize,
    native_channels: u16,
    native_rate: u32,
    target_rate: u32,
    sent_samples: u64,
}

impl FrameAssembler {
    fn new(tx: mpsc::Sender<AudioFrame>, config: &AudioBackendConfig, native_channels: u16) -> Self {
        let samples_per_frame =
            (config.target_sample_rate as u64 * config.buffer_duration_ms / 1000) as usize;

        Self {
            tx,
            buffer: Vec::with_capacity(samples_per_frame),
            samples_per_frame: samples_per_frame.max(1),
            native_channels,
            native_rate: config.target_sample_rate,
            target_rate: config.target_sample_rate,
            sent_samples: 0,
        }
    }

    fn push(&mut self, data: &[i16]) {
        let mono = to_mono(data, self.native_channels);
        let converted = decimate(&mono, self.native_rate, self.target_rate);
        self.buffer.extend_from_slice(&converted);
        self.flush_full_frames();
    }

    fn push_f32(&mut self, data: &[f32]) {
        let i16_data: Vec<i16> = data
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect();
        self.push(&i16_data);
    }

    fn flush_full_frames(&mut self) {
        while self.buffer.len() >= self.samples_per_frame {
            let samples: Vec<i16> = self.buffer.drain(..self.samples_per_frame).collect();
            let timestamp_ms = self.sent_samples * 1000 / self.target_rate as u64;
            self.sent_samples += samples.len() as u64;

            let frame = AudioFrame {
                samples,
                sample_rate: self.target_rate,
                channels: 1,
                timestamp_ms,
            };

            if self.tx.try_send(frame).is_err() {
                // Consumer is behind or gone; dropping is better than
                // blocking the audio callback.
                warn!("Dropping audio frame, consumer not keeping up");
            }
        }
    }
}
