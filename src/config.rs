//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Retry policy bounds for external adapter calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum attempts per call (first try included).
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the OpenAI-compatible aggregator.
    pub api_base_url: String,
    /// API key for the aggregator.
    pub api_key: SecretString,
    /// Chat-completion model used for preference extraction and outfit plans.
    pub chat_model: String,
    /// Image-edit model used for outfit visualization.
    pub image_model: String,
    /// Speech-to-text model for voice notes.
    pub stt_model: String,
    /// Directory for per-user profile JSON files.
    pub profiles_dir: PathBuf,
    /// Directory for downloaded and generated media.
    pub media_dir: PathBuf,
    /// Per-request HTTP timeout for adapter calls.
    pub request_timeout: Duration,
    /// Retry bounds for adapter calls.
    pub retry: RetryConfig,
    /// How many times a conflicted turn is retried from a fresh load.
    pub storage_retries: u32,
    /// Age past which a non-terminal job found at startup is declared dead.
    pub job_staleness: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.aitunnel.ru/v1".to_string(),
            api_key: SecretString::from(""),
            chat_model: "gpt-4o-mini".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            stt_model: "whisper-1".to_string(),
            profiles_dir: PathBuf::from("./data/profiles"),
            media_dir: PathBuf::from("./data/media"),
            request_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
            storage_retries: 2,
            job_staleness: Duration::from_secs(15 * 60),
        }
    }
}

impl Settings {
    /// Build settings from environment variables, falling back to defaults
    /// for everything except the API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Settings::default();

        settings.api_key = SecretString::from(
            std::env::var("STYLIST_API_KEY")
                .map_err(|_| ConfigError::MissingEnvVar("STYLIST_API_KEY".to_string()))?,
        );

        if let Ok(url) = std::env::var("STYLIST_API_BASE_URL") {
            settings.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("STYLIST_CHAT_MODEL") {
            settings.chat_model = model;
        }
        if let Ok(model) = std::env::var("STYLIST_IMAGE_MODEL") {
            settings.image_model = model;
        }
        if let Ok(model) = std::env::var("STYLIST_STT_MODEL") {
            settings.stt_model = model;
        }
        if let Ok(dir) = std::env::var("STYLIST_DATA_DIR") {
            let root = PathBuf::from(dir);
            settings.profiles_dir = root.join("profiles");
            settings.media_dir = root.join("media");
        }
        if let Ok(secs) = std::env::var("STYLIST_REQUEST_TIMEOUT_SECS") {
            settings.request_timeout = Duration::from_secs(parse_u64("STYLIST_REQUEST_TIMEOUT_SECS", &secs)?);
        }
        if let Ok(secs) = std::env::var("STYLIST_JOB_STALENESS_SECS") {
            settings.job_staleness = Duration::from_secs(parse_u64("STYLIST_JOB_STALENESS_SECS", &secs)?);
        }
        if let Ok(n) = std::env::var("STYLIST_RETRY_ATTEMPTS") {
            settings.retry.max_attempts = parse_u64("STYLIST_RETRY_ATTEMPTS", &n)? as u32;
        }

        Ok(settings)
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected an integer, got {raw:?}"),
    })
}
