//! Configuration for the capture pipeline
//!
//! Defaults match the constants the stream hosts tolerate in practice;
//! every value can be overridden through `CAMSNAP_*` environment variables.

use std::time::Duration;

/// Desktop user agent for page fetches and the browser context
pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Short user agent for media hosts (manifest/segment fetches)
pub const MEDIA_USER_AGENT: &str = "Mozilla/5.0";

/// Referer sent to stream hosts that reject bare media requests
const DEFAULT_MEDIA_REFERER: &str = "https://www.earthcam.com/";

/// Platform preview-image base URL
const DEFAULT_THUMBNAIL_BASE: &str = "https://img.youtube.com/vi";

/// Pipeline-wide settings
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Candidate page fetch timeout
    pub page_timeout: Duration,
    /// Manifest fetch timeout (per document)
    pub manifest_timeout: Duration,
    /// Segment download timeout
    pub segment_timeout: Duration,
    /// Preview endpoint timeout (per endpoint)
    pub thumbnail_timeout: Duration,
    /// First-frame decode timeout (ffmpeg)
    pub decode_timeout: Duration,
    /// Playlist resolution attempts (minimum 1)
    pub playlist_attempts: u32,
    /// Fixed delay before a playlist retry
    pub playlist_backoff: Duration,
    /// Success bodies at or below this size are placeholder previews
    pub min_thumbnail_bytes: usize,
    /// Preview endpoint base URL
    pub thumbnail_base: String,
    /// Referer for manifest/segment fetches
    pub media_referer: String,
    /// ffmpeg executable
    pub ffmpeg_path: String,
    /// Browser probe settings
    pub browser: BrowserProbeConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            page_timeout: env_secs("CAMSNAP_PAGE_TIMEOUT_SECS", 15),
            manifest_timeout: env_secs("CAMSNAP_MANIFEST_TIMEOUT_SECS", 15),
            segment_timeout: env_secs("CAMSNAP_SEGMENT_TIMEOUT_SECS", 20),
            thumbnail_timeout: env_secs("CAMSNAP_THUMBNAIL_TIMEOUT_SECS", 10),
            decode_timeout: env_secs("CAMSNAP_DECODE_TIMEOUT_SECS", 15),
            playlist_attempts: env_parse("CAMSNAP_PLAYLIST_ATTEMPTS", 2),
            playlist_backoff: env_secs("CAMSNAP_PLAYLIST_BACKOFF_SECS", 3),
            min_thumbnail_bytes: env_parse("CAMSNAP_MIN_THUMBNAIL_BYTES", 1000),
            thumbnail_base: std::env::var("CAMSNAP_THUMBNAIL_BASE")
                .unwrap_or_else(|_| DEFAULT_THUMBNAIL_BASE.to_string()),
            media_referer: std::env::var("CAMSNAP_MEDIA_REFERER")
                .unwrap_or_else(|_| DEFAULT_MEDIA_REFERER.to_string()),
            ffmpeg_path: std::env::var("CAMSNAP_FFMPEG_PATH")
                .unwrap_or_else(|_| "ffmpeg".to_string()),
            browser: BrowserProbeConfig::default(),
        }
    }
}

/// Scripted browsing context settings
#[derive(Debug, Clone)]
pub struct BrowserProbeConfig {
    /// Viewport width in pixels
    pub viewport_width: u32,
    /// Viewport height in pixels
    pub viewport_height: u32,
    /// Bounded wait for initial content
    pub nav_timeout: Duration,
    /// Bounded wait for network quiescence after navigation
    pub quiescence_timeout: Duration,
    /// Settle time for a late-starting player before harvest
    pub grace_period: Duration,
    /// User agent reported by the context
    pub user_agent: String,
    /// Chrome/Chromium executable (None for auto-detection)
    pub chrome_path: Option<String>,
}

impl Default for BrowserProbeConfig {
    fn default() -> Self {
        Self {
            viewport_width: env_parse("CAMSNAP_VIEWPORT_WIDTH", 1920),
            viewport_height: env_parse("CAMSNAP_VIEWPORT_HEIGHT", 1080),
            nav_timeout: env_secs("CAMSNAP_NAV_TIMEOUT_SECS", 15),
            quiescence_timeout: env_secs("CAMSNAP_QUIESCENCE_TIMEOUT_SECS", 5),
            grace_period: env_secs("CAMSNAP_GRACE_PERIOD_SECS", 2),
            user_agent: std::env::var("CAMSNAP_BROWSER_USER_AGENT")
                .unwrap_or_else(|_| DESKTOP_USER_AGENT.to_string()),
            chrome_path: std::env::var("CAMSNAP_CHROME_PATH").ok(),
        }
    }
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_parse(key, default_secs))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = CaptureConfig::default();
        assert!(config.playlist_attempts >= 1);
        assert_eq!(config.min_thumbnail_bytes, 1000);
        assert_eq!(config.browser.viewport_width, 1920);
        assert_eq!(config.browser.viewport_height, 1080);
        assert!(config.page_timeout >= Duration::from_secs(1));
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("CAMSNAP_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_parse("CAMSNAP_TEST_GARBAGE", 7u64), 7);
        std::env::remove_var("CAMSNAP_TEST_GARBAGE");
    }
}
