use config::{Config, ConfigError};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    result::Result,
};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
    pub gmail_endpoint: Url,
    pub calendar_endpoint: Url,
    pub drive_endpoint: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptLimits {
    pub rate_limit_per_sec: usize,
    pub refill_interval_ms: usize,
    pub refill_amount: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
    pub endpoint: Url,
    pub prompt_limits: PromptLimits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub email_interval_secs: u64,
    pub meeting_interval_secs: u64,
    /// Fetch window for a user who has never been checked.
    pub email_default_lookback_minutes: i64,
    /// How far back the meeting poller looks for past events.
    pub meeting_lookback_days: i64,
    pub ledger_retention_days: i64,
    pub max_messages_per_poll: usize,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub poll: PollConfig,
    pub api: ApiConfig,
    pub model: ModelConfig,
    pub google: GoogleConfig,
}

impl ServerConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = config_dir().join("default");
        let builder = Config::builder()
            .add_source(config::File::with_name(&config_path.to_string_lossy()))
            .add_source(
                config::Environment::with_prefix("TASKCLERK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        builder.try_deserialize()
    }
}

fn config_dir() -> PathBuf {
    env::var("APP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Path::new(env!("CARGO_MANIFEST_DIR")).join("../config"))
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\nPoll: {:?}\n\nModel: {:?}\n\nAPI endpoint: {}\n\nGoogle token uri: {}",
            self.poll, self.model, self.api.endpoint, self.google.token_uri,
        )
    }
}

lazy_static! {
    pub static ref cfg: ServerConfig = ServerConfig::new().expect("Failed to load server config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_loads() {
        assert!(cfg.poll.email_interval_secs > 0);
        assert!(cfg.poll.meeting_interval_secs > 0);
        assert!(!cfg.model.id.is_empty());
    }
}
