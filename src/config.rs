use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    /// Base URL of the messaging gateway the engine sends through.
    pub gateway_url: String,
    /// Forum-style chat where pending posts are reviewed.
    pub moderation_chat_id: i64,
    /// Channel where approved posts are published.
    pub output_chat_id: i64,
    /// Link embedded in published captions, pointing back at the intake.
    pub bot_link: String,
    pub port: u16,
    /// Directory for persistent state (SQLite database).
    /// Defaults to current working directory.
    pub state_dir: PathBuf,
    /// How long a conversation may sit idle before its session is evicted.
    pub session_idle_timeout: Duration,
    /// How often the eviction sweep runs.
    pub session_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let gateway_url = env::var("GATEWAY_URL")
            .context("GATEWAY_URL environment variable is required")?;

        let moderation_chat_id = env::var("MODERATION_CHAT_ID")
            .context("MODERATION_CHAT_ID environment variable is required")?
            .parse::<i64>()
            .context("MODERATION_CHAT_ID must be a valid number")?;

        let output_chat_id = env::var("OUTPUT_CHAT_ID")
            .context("OUTPUT_CHAT_ID environment variable is required")?
            .parse::<i64>()
            .context("OUTPUT_CHAT_ID must be a valid number")?;

        let bot_link =
            env::var("BOT_LINK").context("BOT_LINK environment variable is required")?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let session_idle_timeout = parse_seconds(
            env::var("SESSION_IDLE_TIMEOUT_SECS").ok(),
            Duration::from_secs(24 * 60 * 60),
        )
        .context("SESSION_IDLE_TIMEOUT_SECS must be a valid number of seconds")?;

        let session_sweep_interval = parse_seconds(
            env::var("SESSION_SWEEP_INTERVAL_SECS").ok(),
            Duration::from_secs(5 * 60),
        )
        .context("SESSION_SWEEP_INTERVAL_SECS must be a valid number of seconds")?;

        Ok(Config {
            gateway_url,
            moderation_chat_id,
            output_chat_id,
            bot_link,
            port,
            state_dir,
            session_idle_timeout,
            session_sweep_interval,
        })
    }
}

/// Parse an optional seconds value, falling back to `default` when missing.
fn parse_seconds(value: Option<String>, default: Duration) -> Result<Duration> {
    match value {
        Some(raw) => {
            let secs = raw.trim().parse::<u64>().context("not a number")?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}
