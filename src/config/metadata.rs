use super::parse_env;
use std::env;
use std::time::Duration;

pub const DEFAULT_YOUTUBE_OEMBED_URL: &str = "https://www.youtube.com/oembed";
pub const DEFAULT_SPOTIFY_OEMBED_URL: &str = "https://open.spotify.com/oembed";
pub const DEFAULT_ITUNES_LOOKUP_URL: &str = "https://itunes.apple.com/lookup";

/// Upstream endpoints used to resolve track metadata. Overridable so tests
/// and staging can point at a local fake.
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub youtube_oembed_url: String,
    pub spotify_oembed_url: String,
    pub itunes_lookup_url: String,
    pub timeout: Duration,
    pub cache_ttl_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            youtube_oembed_url: DEFAULT_YOUTUBE_OEMBED_URL.to_string(),
            spotify_oembed_url: DEFAULT_SPOTIFY_OEMBED_URL.to_string(),
            itunes_lookup_url: DEFAULT_ITUNES_LOOKUP_URL.to_string(),
            timeout: Duration::from_secs(5),
            cache_ttl_secs: 86_400,
        }
    }
}

impl MetadataConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            youtube_oembed_url: env::var("YOUTUBE_OEMBED_URL")
                .unwrap_or(defaults.youtube_oembed_url),
            spotify_oembed_url: env::var("SPOTIFY_OEMBED_URL")
                .unwrap_or(defaults.spotify_oembed_url),
            itunes_lookup_url: env::var("ITUNES_LOOKUP_URL").unwrap_or(defaults.itunes_lookup_url),
            timeout: Duration::from_secs(parse_env("METADATA_TIMEOUT_SECS", 5)),
            cache_ttl_secs: parse_env("METADATA_CACHE_TTL_SECS", defaults.cache_ttl_secs),
        }
    }

    /// Point every upstream at one base URL (`{base}/youtube/oembed`, ...).
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            youtube_oembed_url: format!("{base}/youtube/oembed"),
            spotify_oembed_url: format!("{base}/spotify/oembed"),
            itunes_lookup_url: format!("{base}/itunes/lookup"),
            ..Self::default()
        }
    }
}
