//! Error handling for the capture pipeline

use crate::models::ResolutionAttempt;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// Tier-local failures are handled by falling through to the next tier or
/// the next retry; only `NoFrame` is ever surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candidate page fetch failed (network error or non-success status)
    #[error("Page unreachable: {0}")]
    PageUnreachable(String),

    /// Routing signal: the page embeds a player that only resolves under script execution
    #[error("Page requires script execution: {0}")]
    RequiresScriptExecution(String),

    /// Scan completed without finding any stream signature
    #[error("No stream signature found in page")]
    NoStreamSignature,

    /// Manifest fetch failed
    #[error("Manifest unreachable: {0}")]
    ManifestUnreachable(String),

    /// Manifest fetched but not parseable as a playlist
    #[error("Manifest unparseable: {0}")]
    ManifestUnparseable(String),

    /// Media playlist contained no segments
    #[error("Empty segment sequence in media playlist")]
    EmptySegmentSequence,

    /// Segment download failed
    #[error("Segment unreachable: {0}")]
    SegmentUnreachable(String),

    /// First-frame decode failed
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Every preview endpoint was rejected or unreachable
    #[error("Platform thumbnail unavailable for video {0}")]
    PlatformThumbnailUnavailable(String),

    /// Browser navigation exceeded its deadline
    #[error("Browser timeout after {0:?}")]
    BrowserTimeout(std::time::Duration),

    /// Browser context error (launch, protocol, teardown)
    #[error("Browser error: {0}")]
    Browser(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parse error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Terminal outcome: every tier and candidate exhausted
    #[error("No frame available: all resolution tiers exhausted")]
    NoFrame {
        /// Per-tier attempt records from the exhausted invocation
        attempts: Vec<ResolutionAttempt>,
    },
}
