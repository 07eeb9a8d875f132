//! PageResolver - Static Stream Resolution from Page Content
//!
//! ## Responsibilities
//!
//! - Fetch candidate camera pages with a desktop UA, following redirects
//! - Detect redirect chains that terminate on the video platform itself
//! - Classify camera-hosting iframes that only resolve under script execution
//! - Extract manifest URLs from streaming config fields, literal links, and
//!   player configurations
//! - Extract platform video IDs from page text and iframe sources
//!
//! Each extraction rule is a named function with its own fixture tests, so a
//! page-template change breaks one rule without corrupting the others.

use crate::config::{CaptureConfig, DESKTOP_USER_AGENT};
use crate::error::{Error, Result};
use crate::models::StreamDescriptor;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use url::Url;

/// Iframe providers whose stream only appears under script execution
const DYNAMIC_IFRAME_PROVIDERS: [&str; 1] = ["earthcamtv.com"];

static IFRAME_SRC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<iframe[^>]+src=["']([^"']+)["']"#).expect("valid regex"));

/// ID extraction from a platform URL (`watch?v=`, `embed/`, short-link path)
static PLATFORM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:embed/|watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})").expect("valid regex"));

/// Platform references inside arbitrary page text
static PLATFORM_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube\.com/embed/|youtube\.com/watch\?v=|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .expect("valid regex")
});

static STREAM_DOMAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"html5_streamingdomain":"([^"]+)""#).expect("valid regex"));

static STREAM_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"html5_streampath":"([^"]+)""#).expect("valid regex"));

static MANIFEST_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(https?://[^\s"'<>]+\.m3u8[^\s"'<>]*)"#).expect("valid regex"));

static PLAYER_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""file"\s*:\s*"([^"]+\.m3u8[^"]*)""#).expect("valid regex"));

/// Outcome of one static resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticOutcome {
    /// A stream descriptor was extracted without script execution
    Descriptor(StreamDescriptor),
    /// The page embeds a provider that needs the browser tier
    RequiresDynamic,
    /// No stream signature in the static content
    NotFound,
}

/// Static resolution tier
pub struct PageResolver {
    client: reqwest::Client,
}

impl PageResolver {
    /// Create a new PageResolver
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.page_timeout)
            .user_agent(DESKTOP_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Resolve a candidate page without script execution
    ///
    /// Fetch failures and non-success statuses surface as `PageUnreachable`;
    /// the orchestrator treats both as ordinary fall-through, never a crash.
    /// Resolution is idempotent for stable page content.
    pub async fn resolve(&self, page_url: &str) -> Result<StaticOutcome> {
        let resp = self
            .client
            .get(page_url)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| Error::PageUnreachable(format!("{}: {}", page_url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::PageUnreachable(format!(
                "{} returned {}",
                page_url,
                resp.status()
            )));
        }

        let final_url = resp.url().clone();
        let html = resp
            .text()
            .await
            .map_err(|e| Error::PageUnreachable(format!("{}: body read failed: {}", page_url, e)))?;

        // A redirect chain that lands on the platform is terminal for this
        // tier: the content below the final URL is the platform's own player
        // chrome, and scanning it would only self-match.
        if let Some(outcome) = classify_final_url(&final_url) {
            tracing::debug!(
                page = %page_url,
                final_url = %final_url,
                "Redirect chain terminated on video platform"
            );
            return Ok(outcome);
        }

        Ok(scan_content(&html))
    }
}

/// Apply the extraction rules to already-fetched page content
///
/// Priority order: dynamic iframe provider, platform reference in text,
/// streaming field pair, literal manifest URL, player configuration.
pub fn scan_content(html: &str) -> StaticOutcome {
    if has_dynamic_iframe(html) {
        tracing::debug!("Camera-hosting iframe detected, page requires script execution");
        return StaticOutcome::RequiresDynamic;
    }

    if let Some(id) = platform_id_in_text(html) {
        tracing::debug!(video_id = %id, "Platform reference found in page text");
        return StaticOutcome::Descriptor(StreamDescriptor::PlatformVideoId(id));
    }

    if let Some(url) = streaming_field_pair(html) {
        tracing::debug!(manifest = %url, "Manifest assembled from streaming field pair");
        return StaticOutcome::Descriptor(StreamDescriptor::ManifestUrl(url));
    }

    if let Some(url) = literal_manifest_url(html) {
        tracing::debug!(manifest = %url, "Literal manifest URL found in page text");
        return StaticOutcome::Descriptor(StreamDescriptor::ManifestUrl(url));
    }

    if let Some(url) = player_config_manifest(html) {
        tracing::debug!(manifest = %url, "Manifest found in player configuration");
        return StaticOutcome::Descriptor(StreamDescriptor::ManifestUrl(url));
    }

    StaticOutcome::NotFound
}

// ========================================
// Extraction rules
// ========================================

/// Rule: platform detection on the final (post-redirect) URL
///
/// Input: an absolute URL. `Some` when the host belongs to the platform;
/// an ID of any length other than 11 is a parse failure, not a crash, and
/// maps to `NotFound`.
fn classify_final_url(final_url: &Url) -> Option<StaticOutcome> {
    if !host_is_platform(final_url) {
        return None;
    }
    Some(match platform_id_from_url(final_url.as_str()) {
        Some(id) => StaticOutcome::Descriptor(StreamDescriptor::PlatformVideoId(id)),
        None => StaticOutcome::NotFound,
    })
}

fn host_is_platform(url: &Url) -> bool {
    match url.host_str() {
        Some(h) => h == "youtu.be" || h == "youtube.com" || h.ends_with(".youtube.com"),
        None => false,
    }
}

/// Rule: 11-character platform ID from a URL-shaped string
///
/// Input: `watch?v=<id>`, `embed/<id>` or `youtu.be/<id>` forms.
pub(crate) fn platform_id_from_url(url: &str) -> Option<String> {
    PLATFORM_ID_RE.captures(url).map(|c| c[1].to_string())
}

/// Loose platform check for wire URLs and iframe sources
pub(crate) fn is_platform_ref(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Rule: camera-hosting iframe that requires script execution
///
/// Input: raw HTML; matches `<iframe src=...>` elements against the known
/// dynamic providers.
fn has_dynamic_iframe(html: &str) -> bool {
    IFRAME_SRC_RE.captures_iter(html).any(|caps| {
        let src = &caps[1];
        DYNAMIC_IFRAME_PROVIDERS.iter().any(|p| src.contains(p))
    })
}

/// Rule: platform video reference embedded in page text
///
/// Input: raw HTML. Checks literal platform URLs first, then iframe sources
/// that point at the platform in a form the text pattern misses.
pub(crate) fn platform_id_in_text(html: &str) -> Option<String> {
    if let Some(caps) = PLATFORM_TEXT_RE.captures(html) {
        return Some(caps[1].to_string());
    }
    for caps in IFRAME_SRC_RE.captures_iter(html) {
        let src = &caps[1];
        if is_platform_ref(src) {
            if let Some(id) = platform_id_from_url(src) {
                return Some(id);
            }
        }
    }
    None
}

/// Rule: `html5_streamingdomain` + `html5_streampath` field pair
///
/// Input: raw HTML containing the JSON-escaped field pair. Both fields must
/// be present; values are `\/`-unescaped and joined with exactly one slash.
fn streaming_field_pair(html: &str) -> Option<String> {
    let domain = STREAM_DOMAIN_RE
        .captures(html)
        .map(|c| unescape_slashes(&c[1]))?;
    let path = STREAM_PATH_RE
        .captures(html)
        .map(|c| unescape_slashes(&c[1]))?;

    Some(match (domain.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", domain.trim_end_matches('/'), path),
        (false, false) => format!("{}/{}", domain, path),
        _ => format!("{}{}", domain, path),
    })
}

/// Rule: literal `.m3u8` URL anywhere in the text
///
/// Input: raw HTML or rendered content; returns the first match.
pub(crate) fn literal_manifest_url(html: &str) -> Option<String> {
    MANIFEST_URL_RE.captures(html).map(|c| c[1].to_string())
}

/// Rule: player-configuration `"file": "...m3u8..."` entry
///
/// Input: raw HTML with a JSON-ish player config; value is `\/`-unescaped.
fn player_config_manifest(html: &str) -> Option<String> {
    PLAYER_FILE_RE
        .captures(html)
        .map(|c| unescape_slashes(&c[1]))
}

fn unescape_slashes(s: &str) -> String {
    s.replace("\\/", "/")
}
