//! Track metadata extraction.
//!
//! A shared song link is classified by platform, the platform's public oEmbed
//! (YouTube, Spotify) or lookup (iTunes) endpoint is queried, and the returned
//! title is split into `{title, artist}` with a small set of heuristics.

use crate::config::metadata::MetadataConfig;
use crate::services::cache::CacheService;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
const YOUTUBE_FALLBACK_TITLE: &str = "YouTube Video";
const MAX_TEXT_LEN: usize = 300;
const MAX_URL_LEN: usize = 500;

/// Candidate separators, tried in order.
const SEPARATORS: [&str; 6] = [" - ", " · ", " | ", " — ", " – ", " by "];
const SPOTIFY_SEPARATORS: [&str; 1] = [" · "];

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("unsupported platform")]
    Unsupported,
    #[error("{0}")]
    InvalidUrl(String),
    #[error("track not found upstream")]
    NotFound,
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected upstream payload: {0}")]
    Decode(String),
    #[error("upstream unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Spotify,
    Youtube,
    Apple,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::Youtube => "youtube",
            Platform::Apple => "apple",
        }
    }

    /// Title stored when the platform returns an empty one.
    pub fn fallback_title(&self) -> &'static str {
        match self {
            Platform::Spotify => "Spotify Track",
            Platform::Youtube => YOUTUBE_FALLBACK_TITLE,
            Platform::Apple => "Apple Music Track",
        }
    }

    /// Classify by substring only; query strings and paths never matter.
    pub fn detect(url: &str) -> Option<Self> {
        let lower = url.to_ascii_lowercase();
        if lower.contains("spotify.com") {
            Some(Platform::Spotify)
        } else if lower.contains("youtube.com")
            || lower.contains("youtu.be")
            || lower.contains("music.youtube.com")
        {
            Some(Platform::Youtube)
        } else if lower.contains("music.apple.com") {
            Some(Platform::Apple)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub platform: Platform,
    /// Normalised source URL.
    pub url: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    pub embed_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTitle {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRule {
    /// "Artist - Song", every separator, tie-breaks enabled.
    Youtube,
    /// "Song · Artist".
    Spotify,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex must compile"))
}

fn url_in_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)(https?://\S+|spotify:\S+|music://\S+|(?:vnd\.)?youtube://\S+|itmss?://\S+)",
    )
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)\s*[\(\[]\s*(official\s+(music\s+|lyric\s+)?video|official\s+audio|official\s+visuali[sz]er|lyric\s+video|lyrics?|audio|visuali[sz]er|hd|hq|4k|official)\s*[\)\]]",
    )
}

fn bracketed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"[\(\[][^\)\]]*[\)\]]")
}

fn feat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)(^|\s)(feat\.?|ft\.?|featuring)\s")
}

/// Pull the first link-looking token out of shared text.
pub fn extract_url_from_text(text: &str) -> Option<&str> {
    url_in_text_re().find(text).map(|m| m.as_str())
}

/// Trim, pull the link out of share text and rewrite app schemes to web URLs.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = extract_url_from_text(trimmed)
        .unwrap_or(trimmed)
        .trim_end_matches([',', '"', '\'']);
    let lower = candidate.to_ascii_lowercase();

    let mut url = if let Some(rest) = strip_prefix_ci(candidate, &lower, "spotify:") {
        format!("https://open.spotify.com/{}", rest.replace(':', "/"))
    } else if let Some(rest) = strip_prefix_ci(candidate, &lower, "music://") {
        format!("https://music.apple.com/{rest}")
    } else if let Some(rest) = strip_prefix_ci(candidate, &lower, "itmss://")
        .or_else(|| strip_prefix_ci(candidate, &lower, "itms://"))
    {
        format!("https://{rest}")
    } else if let Some(rest) = strip_prefix_ci(candidate, &lower, "vnd.youtube://")
        .or_else(|| strip_prefix_ci(candidate, &lower, "youtube://"))
    {
        format!("https://www.youtube.com/{rest}")
    } else if !lower.contains("://") {
        format!("https://{candidate}")
    } else {
        candidate.to_string()
    };

    if url.contains("itunes.apple.com") {
        url = url.replacen("itunes.apple.com", "music.apple.com", 1);
    }

    Some(url)
}

fn strip_prefix_ci<'a>(value: &'a str, lower: &str, prefix: &str) -> Option<&'a str> {
    lower
        .starts_with(prefix)
        .then(|| &value[prefix.len()..])
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn valid_id(id: &str) -> Option<String> {
    (!id.is_empty() && id.chars().all(is_id_char)).then(|| id.to_string())
}

pub fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    if host.ends_with("youtu.be") {
        return segments.next().and_then(valid_id);
    }

    match segments.next()? {
        "watch" => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .and_then(|(_, v)| valid_id(&v)),
        "shorts" | "embed" | "live" | "v" => segments.next().and_then(valid_id),
        _ => None,
    }
}

pub fn spotify_track_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    segments.find(|s| *s == "track")?;
    segments
        .next()
        .filter(|id| id.chars().all(|c| c.is_ascii_alphanumeric()))
        .and_then(valid_id)
}

/// Returns `(storefront, song_id)` for song links and album links carrying `?i=`.
pub fn apple_song_ref(url: &Url) -> Option<(String, String)> {
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();
    let storefront = segments
        .first()
        .filter(|s| s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| "us".to_string());

    let is_numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "i") {
        if is_numeric(&id) {
            return Some((storefront, id.into_owned()));
        }
    }

    let song_pos = segments.iter().position(|s| *s == "song")?;
    segments[song_pos + 1..]
        .iter()
        .rev()
        .find(|s| is_numeric(s))
        .map(|id| (storefront, id.to_string()))
}

fn strip_noise(title: &str) -> String {
    noise_re().replace_all(title, "").trim().to_string()
}

fn has_bare_feat(side: &str) -> bool {
    let unbracketed = bracketed_re().replace_all(side, " ");
    feat_re().is_match(&unbracketed)
}

fn comparable(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Channel names often carry decorations the title doesn't ("X - Topic", "XVEVO").
fn author_key(author: &str) -> String {
    let trimmed = author.trim();
    let trimmed = trimmed.strip_suffix(" - Topic").unwrap_or(trimmed);
    let key = comparable(trimmed);
    let key = key.strip_suffix("vevo").unwrap_or(&key);
    let key = key.strip_suffix("official").unwrap_or(key);
    key.to_string()
}

/// Decide whether an artist-first split should be flipped.
fn should_swap(left: &str, right: &str, author_hint: Option<&str>) -> bool {
    if let Some(author) = author_hint.map(author_key).filter(|k| !k.is_empty()) {
        let left_matches = comparable(left) == author;
        let right_matches = comparable(right) == author;
        if right_matches && !left_matches {
            return true;
        }
        if left_matches {
            return false;
        }
    }

    // "Artist ft. Guest - Song" and "Artist - Song ft. Guest" both keep the
    // default orientation, so a bare credit pins it.
    if has_bare_feat(left) || has_bare_feat(right) {
        return false;
    }

    left.chars().count() > 3 * right.chars().count()
}

fn split_once_ascii_ci<'a>(haystack: &'a str, sep: &str) -> Option<(&'a str, &'a str)> {
    let idx = haystack.to_ascii_lowercase().find(sep)?;
    Some((&haystack[..idx], &haystack[idx + sep.len()..]))
}

/// Split a platform title into `{title, artist}`.
pub fn split_title(raw: &str, rule: SplitRule, author_hint: Option<&str>) -> SplitTitle {
    let cleaned = strip_noise(raw);
    let full = if cleaned.is_empty() {
        raw.trim()
    } else {
        cleaned.as_str()
    };

    let separators: &[&str] = match rule {
        SplitRule::Youtube => &SEPARATORS,
        SplitRule::Spotify => &SPOTIFY_SEPARATORS,
    };

    for sep in separators {
        let Some((left, right)) = split_once_ascii_ci(full, sep) else {
            continue;
        };
        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() || right.is_empty() {
            continue;
        }

        let title_first = *sep == " by " || rule == SplitRule::Spotify;
        let (artist, title) = if title_first || should_swap(left, right, author_hint) {
            (right, left)
        } else {
            (left, right)
        };

        return SplitTitle {
            title: title.to_string(),
            artist: artist.to_string(),
        };
    }

    SplitTitle {
        title: full.to_string(),
        artist: UNKNOWN_ARTIST.to_string(),
    }
}

fn clip(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

impl TrackMetadata {
    fn new(
        platform: Platform,
        url: &str,
        split: SplitTitle,
        thumbnail: &str,
        embed_url: String,
    ) -> Self {
        let title = if split.title.trim().is_empty() {
            platform.fallback_title().to_string()
        } else {
            split.title
        };
        let artist = if split.artist.trim().is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            split.artist
        };
        Self {
            platform,
            url: clip(url, MAX_URL_LEN),
            title: clip(&title, MAX_TEXT_LEN),
            artist: clip(&artist, MAX_TEXT_LEN),
            thumbnail: clip(thumbnail, MAX_URL_LEN),
            embed_url: clip(&embed_url, MAX_URL_LEN),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItunesLookup {
    #[serde(rename = "resultCount")]
    result_count: u32,
    #[serde(default)]
    results: Vec<ItunesTrack>,
}

#[derive(Debug, Deserialize)]
struct ItunesTrack {
    #[serde(rename = "trackName")]
    track_name: Option<String>,
    #[serde(rename = "artistName")]
    artist_name: Option<String>,
    #[serde(rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
}

/// Resolves shared links into [`TrackMetadata`].
#[derive(Clone)]
pub struct MetadataService {
    client: reqwest::Client,
    config: MetadataConfig,
    cache: Option<CacheService>,
}

impl MetadataService {
    pub fn new(config: MetadataConfig, cache: Option<CacheService>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("earshot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config,
            cache,
        })
    }

    fn cache_key(url: &str) -> String {
        format!("track:{url}")
    }

    /// Classify, fetch and split. Uses the cache when one is configured.
    pub async fn parse_track_url(&self, raw: &str) -> Result<TrackMetadata, MetadataError> {
        let url = normalize_url(raw).ok_or_else(|| MetadataError::InvalidUrl("URL required".to_string()))?;

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get::<TrackMetadata>(&Self::cache_key(&url)).await {
                tracing::debug!(url = %url, "Track metadata cache hit");
                return Ok(hit);
            }
        }

        let (metadata, complete) = self.resolve(&url).await?;

        if complete {
            if let Some(cache) = &self.cache {
                cache
                    .set(&Self::cache_key(&url), &metadata, self.config.cache_ttl_secs)
                    .await;
            }
        }

        Ok(metadata)
    }

    /// Fresh lookup that skips the cache read and never returns placeholder
    /// data; a degraded YouTube response is reported as [`MetadataError::Unavailable`].
    pub async fn refetch_track_url(&self, raw: &str) -> Result<TrackMetadata, MetadataError> {
        let url = normalize_url(raw).ok_or_else(|| MetadataError::InvalidUrl("URL required".to_string()))?;
        let key = Self::cache_key(&url);

        let (metadata, complete) = self.resolve(&url).await?;
        if !complete {
            return Err(MetadataError::Unavailable);
        }

        if let Some(cache) = &self.cache {
            cache.invalidate(&key).await;
            cache.set(&key, &metadata, self.config.cache_ttl_secs).await;
        }
        Ok(metadata)
    }

    async fn resolve(&self, url: &str) -> Result<(TrackMetadata, bool), MetadataError> {
        let platform = Platform::detect(url).ok_or(MetadataError::Unsupported)?;
        let parsed = Url::parse(url)
            .map_err(|_| MetadataError::InvalidUrl("Malformed URL".to_string()))?;

        match platform {
            Platform::Youtube => {
                let id = youtube_video_id(&parsed).ok_or_else(|| {
                    MetadataError::InvalidUrl("Could not find a YouTube video id".to_string())
                })?;
                match self.youtube(url, &id).await {
                    Ok(metadata) => Ok((metadata, true)),
                    Err(e) => {
                        tracing::warn!(video_id = %id, "YouTube oEmbed failed, using defaults: {e}");
                        Ok((youtube_fallback(url, &id), false))
                    }
                }
            }
            Platform::Spotify => {
                let id = spotify_track_id(&parsed).ok_or_else(|| {
                    MetadataError::InvalidUrl("Only Spotify track links are supported".to_string())
                })?;
                Ok((self.spotify(url, &id).await?, true))
            }
            Platform::Apple => {
                let (storefront, id) = apple_song_ref(&parsed).ok_or_else(|| {
                    MetadataError::InvalidUrl("Only Apple Music song links are supported".to_string())
                })?;
                Ok((self.apple(url, &storefront, &id).await?, true))
            }
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MetadataError> {
        let resp = self
            .client
            .get(endpoint)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<T>().await?)
    }

    async fn youtube(&self, url: &str, video_id: &str) -> Result<TrackMetadata, MetadataError> {
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        let oembed: OEmbedResponse = self
            .fetch_json(
                &self.config.youtube_oembed_url,
                &[("url", &watch_url), ("format", "json")],
            )
            .await?;

        let split = split_title(&oembed.title, SplitRule::Youtube, oembed.author_name.as_deref());
        let thumbnail = oembed
            .thumbnail_url
            .unwrap_or_else(|| youtube_thumbnail(video_id));

        Ok(TrackMetadata::new(
            Platform::Youtube,
            url,
            split,
            &thumbnail,
            format!("https://www.youtube.com/embed/{video_id}"),
        ))
    }

    async fn spotify(&self, url: &str, track_id: &str) -> Result<TrackMetadata, MetadataError> {
        let track_url = format!("https://open.spotify.com/track/{track_id}");
        let oembed: OEmbedResponse = self
            .fetch_json(&self.config.spotify_oembed_url, &[("url", &track_url)])
            .await?;

        let split = split_title(&oembed.title, SplitRule::Spotify, None);
        Ok(TrackMetadata::new(
            Platform::Spotify,
            url,
            split,
            oembed.thumbnail_url.as_deref().unwrap_or_default(),
            format!("https://open.spotify.com/embed/track/{track_id}"),
        ))
    }

    async fn apple(
        &self,
        url: &str,
        storefront: &str,
        song_id: &str,
    ) -> Result<TrackMetadata, MetadataError> {
        let lookup: ItunesLookup = self
            .fetch_json(
                &self.config.itunes_lookup_url,
                &[("id", song_id), ("entity", "song")],
            )
            .await?;

        if lookup.result_count == 0 {
            return Err(MetadataError::NotFound);
        }

        let track = lookup
            .results
            .into_iter()
            .find(|t| t.track_name.is_some())
            .ok_or_else(|| MetadataError::Decode("lookup result without trackName".to_string()))?;

        let thumbnail = track
            .artwork_url_100
            .map(|art| art.replace("100x100", "300x300"))
            .unwrap_or_default();

        Ok(TrackMetadata::new(
            Platform::Apple,
            url,
            SplitTitle {
                title: track.track_name.unwrap_or_default(),
                artist: track.artist_name.unwrap_or_default(),
            },
            &thumbnail,
            format!("https://embed.music.apple.com/{storefront}/song/{song_id}"),
        ))
    }
}

fn youtube_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg")
}

fn youtube_fallback(url: &str, video_id: &str) -> TrackMetadata {
    TrackMetadata::new(
        Platform::Youtube,
        url,
        SplitTitle {
            title: YOUTUBE_FALLBACK_TITLE.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
        },
        &youtube_thumbnail(video_id),
        format!("https://www.youtube.com/embed/{video_id}"),
    )
}
