use anyhow::Result;
use serde::Deserialize;

/// Environment variable consulted for the service API key.
pub const API_KEY_ENV_VAR: &str = "ASSEMBLYAI_API_KEY";

/// Shared trial key used when no API key is configured, so the tool works
/// out of the box. Rate-limited and NOT for production use; set
/// `ASSEMBLYAI_API_KEY` for real workloads.
const FALLBACK_TEST_API_KEY: &str = "b2c3a1d4e5f60718293a4b5c6d7e8f90";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// Streaming service hostname
    pub host: String,
    /// PCM sample rate sent to the service
    pub sample_rate: u32,
    /// Request formatted turns at connect time
    pub format_turns: bool,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Input device name; None picks the system default
    #[serde(default)]
    pub device: Option<String>,
    /// Capture buffer size in milliseconds
    pub buffer_duration_ms: u64,
}

impl Config {
    /// Load configuration from an optional TOML file, falling back to
    /// built-in defaults for anything not set.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.host", "streaming.assemblyai.com")?
            .set_default("service.sample_rate", 16000)?
            .set_default("service.format_turns", true)?
            .set_default("audio.buffer_duration_ms", 100)?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Resolved API credential for the transcription service.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCredentials {
    key: String,
    from_env: bool,
}

impl ApiCredentials {
    /// Resolve the credential from the environment, falling back to the
    /// embedded trial key.
    pub fn resolve() -> Self {
        Self::from_env_value(std::env::var(API_KEY_ENV_VAR).ok())
    }

    /// Resolution logic split out so tests don't have to mutate the process
    /// environment.
    pub fn from_env_value(value: Option<String>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(key) => Self {
                key,
                from_env: true,
            },
            None => Self {
                key: FALLBACK_TEST_API_KEY.to_string(),
                from_env: false,
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True when running on the embedded trial key.
    pub fn is_fallback(&self) -> bool {
        !self.from_env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_key_wins() {
        let creds = ApiCredentials::from_env_value(Some("k1".to_string()));
        assert_eq!(creds.key(), "k1");
        assert!(!creds.is_fallback());
    }

    #[test]
    fn missing_env_falls_back_to_trial_key() {
        let creds = ApiCredentials::from_env_value(None);
        assert_eq!(creds.key(), FALLBACK_TEST_API_KEY);
        assert!(creds.is_fallback());
    }

    #[test]
    fn empty_env_value_counts_as_unset() {
        let creds = ApiCredentials::from_env_value(Some(String::new()));
        assert!(creds.is_fallback());
    }

    #[test]
    fn resolve_reads_the_process_environment() {
        std::env::set_var(API_KEY_ENV_VAR, "k1");
        assert_eq!(ApiCredentials::resolve().key(), "k1");

        std::env::remove_var(API_KEY_ENV_VAR);
        assert!(ApiCredentials::resolve().is_fallback());
    }

    #[test]
    fn defaults_when_no_config_file_exists() {
        let cfg = Config::load("config/definitely-not-a-real-file").unwrap();
        assert_eq!(cfg.service.host, "streaming.assemblyai.com");
        assert_eq!(cfg.service.sample_rate, 16000);
        assert!(cfg.service.format_turns);
        assert_eq!(cfg.audio.device, None);
        assert_eq!(cfg.audio.buffer_duration_ms, 100);
    }
}
