//! PlaylistResolver - HLS Manifest Walking and Segment Selection
//!
//! ## Responsibilities
//!
//! - Fetch manifests with the media UA and camera-network referer
//! - Parse master and media playlists from raw manifest text
//! - Pick the highest-bandwidth variant from a master playlist
//! - Pick the most recent segment from a media playlist
//! - Resolve relative URIs against the manifest they came from
//! - Retry the whole walk once after a short backoff
//!
//! Only the tags the walk needs are parsed; unknown tags pass through
//! untouched so future manifest extensions cannot break resolution.

use crate::config::{CaptureConfig, MEDIA_USER_AGENT};
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::REFERER;
use std::time::Duration;
use url::Url;

/// `AVERAGE-BANDWIDTH` also ends in `BANDWIDTH=`, so anchor on the
/// attribute-list separator.
static BANDWIDTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|,)\s*BANDWIDTH=(\d+)").expect("valid regex"));

/// One variant entry of a master playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Declared bandwidth in bits per second, 0 when absent
    pub bandwidth: u64,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPlaylist {
    pub variants: Vec<Variant>,
}

/// One media segment entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaylist {
    pub segments: Vec<Segment>,
}

/// A parsed HLS manifest, discriminated by what its entries are
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlsManifest {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
}

/// Parse manifest text into a master or media playlist
///
/// A manifest with at least one `#EXT-X-STREAM-INF` entry is a master
/// playlist; everything else is treated as a media playlist, possibly with
/// zero segments.
pub fn parse_manifest(text: &str) -> Result<HlsManifest> {
    if !text.trim_start().starts_with("#EXTM3U") {
        return Err(Error::ManifestUnparseable(
            "missing #EXTM3U header".to_string(),
        ));
    }

    let mut variants = Vec::new();
    let mut segments = Vec::new();
    let mut pending_variant: Option<u64> = None;
    let mut pending_segment = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending_variant = Some(parse_bandwidth(attrs));
            continue;
        }
        if line.starts_with("#EXTINF:") {
            pending_segment = true;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        // A bare line is the URI for whichever tag preceded it
        if let Some(bandwidth) = pending_variant.take() {
            variants.push(Variant {
                bandwidth,
                uri: line.to_string(),
            });
        } else if pending_segment {
            pending_segment = false;
            segments.push(Segment {
                uri: line.to_string(),
            });
        }
    }

    if variants.is_empty() {
        Ok(HlsManifest::Media(MediaPlaylist { segments }))
    } else {
        Ok(HlsManifest::Master(MasterPlaylist { variants }))
    }
}

fn parse_bandwidth(attrs: &str) -> u64 {
    BANDWIDTH_RE
        .captures(attrs)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// Pick the variant with the highest declared bandwidth
pub fn select_best_variant(master: &MasterPlaylist) -> Result<&Variant> {
    master
        .variants
        .iter()
        .max_by_key(|v| v.bandwidth)
        .ok_or_else(|| Error::ManifestUnparseable("master playlist has no variants".to_string()))
}

/// Pick the most recent segment, the last one listed
pub fn latest_segment(media: &MediaPlaylist) -> Result<&Segment> {
    media.segments.last().ok_or(Error::EmptySegmentSequence)
}

/// Resolve a possibly-relative URI against the manifest URL it came from
pub fn resolve_relative(base: &str, uri: &str) -> Result<String> {
    let base = Url::parse(base)?;
    Ok(base.join(uri)?.to_string())
}

/// Playlist resolution tier
pub struct PlaylistResolver {
    client: reqwest::Client,
    referer: String,
    attempts: u32,
    backoff: Duration,
}

impl PlaylistResolver {
    /// Create a new PlaylistResolver
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.manifest_timeout)
            .user_agent(MEDIA_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            referer: config.media_referer.clone(),
            attempts: config.playlist_attempts.max(1),
            backoff: config.playlist_backoff,
        })
    }

    /// Walk the manifest chain down to the newest segment URL
    ///
    /// Transient CDN failures are common on live camera streams, so the
    /// whole walk retries after a backoff rather than failing on the first
    /// unreachable manifest.
    pub async fn resolve_segment(&self, manifest_url: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 0..self.attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff).await;
            }
            match self.try_resolve(manifest_url).await {
                Ok(segment_url) => return Ok(segment_url),
                Err(e) => {
                    tracing::warn!(
                        manifest = %manifest_url,
                        attempt = attempt + 1,
                        error = %e,
                        "Playlist walk failed"
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(Error::EmptySegmentSequence))
    }

    async fn try_resolve(&self, manifest_url: &str) -> Result<String> {
        let text = self.fetch_manifest(manifest_url).await?;

        let (media_url, media) = match parse_manifest(&text)? {
            HlsManifest::Master(master) => {
                let variant = select_best_variant(&master)?;
                let variant_url = resolve_relative(manifest_url, &variant.uri)?;
                tracing::debug!(
                    manifest = %manifest_url,
                    bandwidth = variant.bandwidth,
                    variant = %variant_url,
                    "Selected highest-bandwidth variant"
                );
                match parse_manifest(&self.fetch_manifest(&variant_url).await?)? {
                    HlsManifest::Media(media) => (variant_url, media),
                    HlsManifest::Master(_) => {
                        return Err(Error::ManifestUnparseable(format!(
                            "variant {} is itself a master playlist",
                            variant_url
                        )));
                    }
                }
            }
            HlsManifest::Media(media) => (manifest_url.to_string(), media),
        };

        let segment = latest_segment(&media)?;
        let segment_url = resolve_relative(&media_url, &segment.uri)?;
        tracing::debug!(segment = %segment_url, "Resolved newest segment");
        Ok(segment_url)
    }

    async fn fetch_manifest(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(REFERER, &self.referer)
            .send()
            .await
            .map_err(|e| Error::ManifestUnreachable(format!("{}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::ManifestUnreachable(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        resp.text()
            .await
            .map_err(|e| Error::ManifestUnreachable(format!("{}: body read failed: {}", url, e)))
    }
}
