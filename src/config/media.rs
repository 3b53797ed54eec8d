use super::{parse_bool_env, parse_env};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub ytdlp_bin: String,
    pub ytdlp_timeout: Duration,
    pub audio_proxy_timeout: Duration,
    /// Let the audio proxy reach loopback and private addresses.
    pub allow_private_upstreams: bool,
    /// Shared secret for maintenance endpoints. `None` disables them.
    pub migration_secret: Option<String>,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let migration_secret = env::var("MIGRATION_SECRET")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            ytdlp_bin: env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string()),
            ytdlp_timeout: Duration::from_secs(parse_env("YTDLP_TIMEOUT_SECS", 30)),
            audio_proxy_timeout: Duration::from_secs(parse_env("AUDIO_PROXY_TIMEOUT_SECS", 15)),
            allow_private_upstreams: parse_bool_env("AUDIO_PROXY_ALLOW_PRIVATE", false),
            migration_secret,
        }
    }
}
