//! Core data model for the capture pipeline
//!
//! Everything here lives and dies within a single pipeline invocation;
//! nothing is persisted by this crate.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the resolver tiers turned a candidate page into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDescriptor {
    /// Direct HLS manifest URL, consumable by the playlist resolver
    ManifestUrl(String),
    /// Third-party platform video identifier (11 characters)
    PlatformVideoId(String),
    /// Nothing resolved
    Unresolved,
}

impl StreamDescriptor {
    /// True for anything the downstream tiers can consume
    pub fn is_resolved(&self) -> bool {
        !matches!(self, StreamDescriptor::Unresolved)
    }
}

/// How the final image was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSource {
    /// Decoded from the latest stream segment
    Stream,
    /// Pre-rendered platform preview image
    PlatformThumbnail,
}

impl FrameSource {
    /// Convert to string for logging/serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameSource::Stream => "stream",
            FrameSource::PlatformThumbnail => "platform_thumbnail",
        }
    }
}

/// The pipeline's sole successful output
///
/// Ownership transfers to the caller; persistence and analysis are theirs.
#[derive(Debug, Clone)]
pub struct ResolvedFrame {
    /// JPEG image data
    pub image_bytes: Vec<u8>,
    /// How the image was obtained
    pub source: FrameSource,
    /// Segment URL or accepted preview endpoint
    pub source_url: String,
    /// When the frame was captured
    pub captured_at: DateTime<Utc>,
}

/// Pipeline tiers, in resolution priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Static page fetch + pattern extraction
    PageScan,
    /// Scripted browsing context with wire observation
    BrowserProbe,
    /// Manifest fetch, variant selection, latest segment
    PlaylistResolve,
    /// Segment download + first-frame decode
    FrameDecode,
    /// Platform preview-image fallback
    ThumbnailFetch,
}

impl Tier {
    /// Convert to string for logging/serialization
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::PageScan => "page_scan",
            Tier::BrowserProbe => "browser_probe",
            Tier::PlaylistResolve => "playlist_resolve",
            Tier::FrameDecode => "frame_decode",
            Tier::ThumbnailFetch => "thumbnail_fetch",
        }
    }
}

/// Ephemeral record of one tier execution within an invocation
///
/// Carried by the terminal failure so callers can log what was tried;
/// never stored beyond the invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionAttempt {
    /// Which tier ran
    pub tier: Tier,
    /// Wall-clock time the tier took
    pub elapsed_ms: u64,
    /// Failure reason, if the tier did not produce usable output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_resolved_flag() {
        assert!(StreamDescriptor::ManifestUrl("https://a/b.m3u8".into()).is_resolved());
        assert!(StreamDescriptor::PlatformVideoId("abcDEFghi12".into()).is_resolved());
        assert!(!StreamDescriptor::Unresolved.is_resolved());
    }

    #[test]
    fn attempt_serializes_without_empty_failure() {
        let attempt = ResolutionAttempt {
            tier: Tier::PageScan,
            elapsed_ms: 12,
            failure: None,
        };
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"page_scan\""));
        assert!(!json.contains("failure"));
    }
}
