use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use live_transcribe::{
    create_backend, ApiCredentials, AudioBackendConfig, AudioSource, Config, StreamingClient,
    StreamingConfig, TranscriptionSession, API_KEY_ENV_VAR,
};

/// Stream microphone audio to a real-time transcription service and print
/// transcript turns as they arrive.
#[derive(Parser, Debug)]
#[command(name = "live-transcribe")]
struct Cli {
    /// Config file (TOML, optional)
    #[arg(long, default_value = "config/live-transcribe")]
    config: String,

    /// Input device name (overrides config; default: system default mic)
    #[arg(long)]
    device: Option<String>,

    /// Transcribe a WAV file instead of the microphone
    #[arg(long)]
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let credentials = ApiCredentials::resolve();
    if credentials.is_fallback() {
        warn!(
            "{} not set, using the shared trial key (not for production)",
            API_KEY_ENV_VAR
        );
    }

    let source = match cli.input {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone {
            device: cli.device.or_else(|| cfg.audio.device.clone()),
        },
    };

    let backend_config = AudioBackendConfig {
        target_sample_rate: cfg.service.sample_rate,
        target_channels: 1,
        buffer_duration_ms: cfg.audio.buffer_duration_ms,
    };
    let mut backend = create_backend(source, backend_config)?;
    let frames = backend.start().await?;

    let client = StreamingClient::new(StreamingConfig {
        api_key: credentials.key().to_string(),
        host: cfg.service.host.clone(),
        sample_rate: cfg.service.sample_rate,
        format_turns: cfg.service.format_turns,
    })?;
    let session = TranscriptionSession::new(client);

    // Ctrl-C is a normal exit path: signal shutdown and let the session
    // terminate the remote side before we return.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        "Streaming to {} at {}Hz (Ctrl-C to stop)",
        cfg.service.host, cfg.service.sample_rate
    );

    let result = session.run(frames, shutdown_rx).await;

    if let Err(e) = backend.stop().await {
        warn!("Failed to stop audio capture: {}", e);
    }

    let stats = result?;
    info!(
        "Session finished: {} frames / {} bytes sent, {} turns received in {:.1}s",
        stats.frames_sent, stats.bytes_sent, stats.turns_received, stats.duration_secs
    );

    Ok(())
}
