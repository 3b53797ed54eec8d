//! Playback helpers for the mobile client: resolving a direct audio stream
//! with `yt-dlp` and relaying upstream audio through the server.

use crate::config::media::MediaConfig;
use reqwest::header::{HeaderValue, LOCATION, RANGE};
use reqwest::redirect::Policy;
use std::net::IpAddr;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use url::{Host, Url};

const BLOCKED_MARKER: &str = "Sign in to confirm";
const PROXY_USER_AGENT: &str = "Mozilla/5.0";
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("No audio stream found")]
    NoStream,
    #[error("YouTube blocked this video. Try a different one.")]
    Blocked,
    #[error("Audio lookup timed out")]
    Timeout,
    #[error("Could not run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("yt-dlp failed: {0}")]
    Extractor(String),
    #[error("Upstream audio request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("Upstream redirected too many times")]
    TooManyRedirects,
}

/// Accept only absolute http(s) URLs, optionally refusing private hosts.
pub fn validate_media_url(raw: &str, allow_private: bool) -> Result<Url, MediaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MediaError::InvalidUrl("No URL".to_string()));
    }

    let url = Url::parse(raw).map_err(|_| MediaError::InvalidUrl("Malformed URL".to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(MediaError::InvalidUrl(
            "Only http and https URLs are supported".to_string(),
        ));
    }

    let private = match url.host() {
        None => return Err(MediaError::InvalidUrl("URL has no host".to_string())),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => is_private(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private(IpAddr::V6(ip)),
    };
    if private && !allow_private {
        return Err(MediaError::InvalidUrl("Private addresses are not allowed".to_string()));
    }

    Ok(url)
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10, carrier-grade NAT
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private(IpAddr::V4(v4)),
            None => {
                let first = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    || (first & 0xfe00) == 0xfc00
                    || (first & 0xffc0) == 0xfe80
            }
        },
    }
}

/// Resolve a domain host and refuse it if any address is private.
/// IP-literal hosts were already checked by [`validate_media_url`].
async fn ensure_public_host(url: &Url, allow_private: bool) -> Result<(), MediaError> {
    if allow_private {
        return Ok(());
    }
    let Some(Host::Domain(domain)) = url.host() else {
        return Ok(());
    };
    let port = url.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|_| MediaError::InvalidUrl("Host could not be resolved".to_string()))?;
    if any_private(addrs.map(|a| a.ip())) {
        return Err(MediaError::InvalidUrl("Private addresses are not allowed".to_string()));
    }
    Ok(())
}

fn any_private(mut addrs: impl Iterator<Item = IpAddr>) -> bool {
    addrs.any(is_private)
}

/// Where a redirect response points, validated like a client-supplied URL.
fn redirect_target(
    current: &Url,
    location: Option<&HeaderValue>,
    allow_private: bool,
) -> Result<Url, MediaError> {
    let location = location
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| MediaError::InvalidUrl("Redirect without a location".to_string()))?;
    let next = current
        .join(location)
        .map_err(|_| MediaError::InvalidUrl("Malformed redirect".to_string()))?;
    validate_media_url(next.as_str(), allow_private)
}

/// First http(s) line of `yt-dlp -g` output.
fn first_stream_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("http://") || line.starts_with("https://"))
        .map(str::to_string)
}

fn classify_failure(stderr: &str) -> MediaError {
    if stderr.contains(BLOCKED_MARKER) {
        return MediaError::Blocked;
    }
    let last = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("unknown error");
    MediaError::Extractor(last.to_string())
}

#[derive(Clone)]
pub struct AudioService {
    client: reqwest::Client,
    config: MediaConfig,
}

impl AudioService {
    pub fn new(config: MediaConfig) -> anyhow::Result<Self> {
        // No overall timeout: a proxied stream lasts as long as the track.
        // Redirects are followed by hand so every hop is re-validated.
        let client = reqwest::Client::builder()
            .connect_timeout(config.audio_proxy_timeout)
            .user_agent(PROXY_USER_AGENT)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Ask `yt-dlp` for a direct audio URL for a page URL.
    pub async fn resolve_stream_url(&self, raw: &str) -> Result<String, MediaError> {
        let url = validate_media_url(raw, false)?;

        let child = Command::new(&self.config.ytdlp_bin)
            .args([
                "-f",
                "bestaudio/best",
                "--no-playlist",
                "--no-warnings",
                "--quiet",
                "-g",
                "--",
                url.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.config.ytdlp_timeout, child.wait_with_output())
            .await
            .map_err(|_| MediaError::Timeout)??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let err = classify_failure(&stderr);
            tracing::warn!(url = %url, "yt-dlp exited with {}: {err}", output.status);
            return Err(err);
        }

        first_stream_url(&stdout).ok_or(MediaError::NoStream)
    }

    /// Open an upstream audio response for relaying. Each request and
    /// response head is bounded by the proxy timeout. Redirects are followed
    /// up to a small limit, checking every hop against the private-host rule.
    /// A client `Range` header is forwarded so players can seek.
    pub async fn open_upstream(
        &self,
        raw: &str,
        range: Option<&str>,
    ) -> Result<reqwest::Response, MediaError> {
        let allow_private = self.config.allow_private_upstreams;
        let mut url = validate_media_url(raw, allow_private)?;

        for _ in 0..=MAX_REDIRECTS {
            ensure_public_host(&url, allow_private).await?;

            let mut request = self.client.get(url.clone());
            if let Some(range) = range {
                request = request.header(RANGE, range);
            }

            let response = tokio::time::timeout(self.config.audio_proxy_timeout, request.send())
                .await
                .map_err(|_| MediaError::Timeout)??;

            if !response.status().is_redirection() {
                return Ok(response.error_for_status()?);
            }
            url = redirect_target(&url, response.headers().get(LOCATION), allow_private)?;
            tracing::debug!(to = %url, "Following audio redirect");
        }

        Err(MediaError::TooManyRedirects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_pass() {
        assert!(validate_media_url("https://rr1.googlevideo.com/videoplayback?x=1", false).is_ok());
        assert!(validate_media_url("file:///etc/passwd", false).is_err());
        assert!(validate_media_url("  ", false).is_err());
        assert!(validate_media_url("-o /tmp/x", false).is_err());
    }

    #[test]
    fn private_hosts_need_opt_in() {
        assert!(validate_media_url("http://127.0.0.1:8080/a.webm", false).is_err());
        assert!(validate_media_url("http://localhost/a.webm", false).is_err());
        assert!(validate_media_url("http://10.0.0.5/a.webm", false).is_err());
        assert!(validate_media_url("http://[::1]/a.webm", false).is_err());
        assert!(validate_media_url("http://127.0.0.1:8080/a.webm", true).is_ok());
    }

    #[test]
    fn mapped_and_link_local_v6_are_private() {
        assert!(validate_media_url("http://[::ffff:127.0.0.1]:8080/a.webm", false).is_err());
        assert!(validate_media_url("http://[::ffff:169.254.169.254]/latest", false).is_err());
        assert!(validate_media_url("http://[fe80::1]/a.webm", false).is_err());
        assert!(validate_media_url("http://[2606:4700::1111]/a.webm", false).is_ok());
    }

    #[test]
    fn resolved_private_addresses_are_caught() {
        let public: IpAddr = "93.184.216.34".parse().unwrap();
        let metadata: IpAddr = "169.254.169.254".parse().unwrap();
        assert!(!any_private([public].into_iter()));
        assert!(any_private([public, metadata].into_iter()));
    }

    #[test]
    fn redirect_hops_are_revalidated() {
        let current = Url::parse("https://cdn.example.com/track.webm").unwrap();

        let metadata = HeaderValue::from_static("http://169.254.169.254/latest/meta-data");
        assert!(redirect_target(&current, Some(&metadata), false).is_err());

        let file = HeaderValue::from_static("file:///etc/passwd");
        assert!(redirect_target(&current, Some(&file), true).is_err());

        assert!(redirect_target(&current, None, false).is_err());

        let relative = HeaderValue::from_static("/v2/track.webm");
        assert_eq!(
            redirect_target(&current, Some(&relative), false).unwrap().as_str(),
            "https://cdn.example.com/v2/track.webm"
        );
    }

    #[test]
    fn picks_first_stream_line() {
        let out = "\nhttps://rr3.googlevideo.com/videoplayback?id=1\nhttps://second\n";
        assert_eq!(
            first_stream_url(out).as_deref(),
            Some("https://rr3.googlevideo.com/videoplayback?id=1")
        );
        assert_eq!(first_stream_url("WARNING: nothing\n"), None);
    }

    #[test]
    fn sign_in_wall_is_blocked() {
        let stderr = "ERROR: [youtube] abc: Sign in to confirm you're not a bot";
        assert!(matches!(classify_failure(stderr), MediaError::Blocked));
        assert!(matches!(
            classify_failure("ERROR: Video unavailable\n"),
            MediaError::Extractor(msg) if msg == "ERROR: Video unavailable"
        ));
    }
}
