//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Issuebot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token.
    pub bot_token: String,

    /// The single Telegram user allowed to talk to the bot.
    pub allowed_user_id: u64,

    /// Issue tracker API settings.
    pub tracker: TrackerConfig,

    /// Source-hosting API settings (optional).
    pub forge: Option<ForgeConfig>,

    /// Task-runner service settings (optional).
    pub runner: Option<RunnerConfig>,

    /// Agent runtime endpoint settings.
    pub agent: AgentConfig,

    /// Voice transcription settings (optional; voice messages are rejected
    /// with a notice when absent).
    pub stt: Option<SttConfig>,

    /// Outbound delivery behavior.
    pub delivery: DeliveryConfig,
}

/// Issue tracker API configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Source-hosting API configuration.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub base_url: String,
    pub token: String,
    /// `owner/name` of the repository the bot reports on.
    pub repo: String,
}

/// Task-runner service configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: String,
    pub token: String,
}

/// Agent runtime configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub endpoint: String,
    pub api_key: String,
}

/// Voice transcription configuration.
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub api_key: String,
    /// Voice messages longer than this are rejected before transcription.
    pub max_duration: Duration,
}

/// Outbound delivery behavior.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryConfig {
    /// Whether long-running operations get a live progress message.
    pub progress_enabled: bool,

    /// Minimum interval between in-place edits of the progress message.
    pub min_edit_interval: Duration,

    /// Time-to-live for unconfirmed voice commands.
    pub pending_ttl: Duration,

    /// How often the pending-command sweep runs.
    pub sweep_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            progress_enabled: true,
            min_edit_interval: Duration::from_secs(2),
            pending_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let bot_token = require("ISSUEBOT_TELEGRAM_TOKEN")?;

        let allowed_user_id = require("ISSUEBOT_ALLOWED_USER_ID")?
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid("ISSUEBOT_ALLOWED_USER_ID must be a numeric user id".into())
            })?;

        let tracker = TrackerConfig {
            base_url: std::env::var("ISSUEBOT_TRACKER_URL")
                .unwrap_or_else(|_| "https://api.linear.app".into()),
            api_key: require("ISSUEBOT_TRACKER_KEY")?,
        };

        let forge = match std::env::var("ISSUEBOT_FORGE_TOKEN") {
            Ok(token) => Some(ForgeConfig {
                base_url: std::env::var("ISSUEBOT_FORGE_URL")
                    .unwrap_or_else(|_| "https://api.github.com".into()),
                token,
                repo: require("ISSUEBOT_FORGE_REPO")?,
            }),
            Err(_) => None,
        };

        let runner = match std::env::var("ISSUEBOT_RUNNER_URL") {
            Ok(base_url) => Some(RunnerConfig {
                base_url,
                token: require("ISSUEBOT_RUNNER_TOKEN")?,
            }),
            Err(_) => None,
        };

        let agent = AgentConfig {
            endpoint: require("ISSUEBOT_AGENT_ENDPOINT")?,
            api_key: require("ISSUEBOT_AGENT_KEY")?,
        };

        let stt = std::env::var("ISSUEBOT_STT_KEY").ok().map(|api_key| {
            let max_secs = env_parse("ISSUEBOT_VOICE_MAX_SECONDS", 120u64);
            SttConfig {
                api_key,
                max_duration: Duration::from_secs(max_secs),
            }
        });

        let delivery = DeliveryConfig {
            progress_enabled: std::env::var("ISSUEBOT_PROGRESS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            min_edit_interval: Duration::from_millis(env_parse(
                "ISSUEBOT_EDIT_INTERVAL_MS",
                2_000u64,
            )),
            pending_ttl: Duration::from_secs(env_parse("ISSUEBOT_PENDING_TTL_SECONDS", 300u64)),
            sweep_interval: Duration::from_secs(env_parse("ISSUEBOT_SWEEP_SECONDS", 60u64)),
        };

        Ok(Self {
            bot_token,
            allowed_user_id,
            tracker,
            forge,
            runner,
            agent,
            stt,
            delivery,
        })
    }
}

fn require(key: &str) -> Result<String> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingKey(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{key} must not be empty")).into());
    }
    Ok(value)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
