//! BrowserProbe - Dynamic Stream Resolution under Script Execution
//!
//! ## Responsibilities
//!
//! - Drive a real browser session against pages that only reveal their
//!   stream once scripts run
//! - Harvest network request URLs and rendered content from the session
//! - Rank the harvest: wire manifest, wire platform ID, content manifest,
//!   content platform ID
//! - Tolerate navigation that never settles; heavy player pages often keep
//!   the network busy forever while the stream URL is already on the wire
//!
//! The session itself sits behind the `BrowserEngine` / `BrowserSession`
//! traits so the ranking and teardown logic tests without a browser binary.

pub mod chromium;

use crate::config::BrowserProbeConfig;
use crate::error::Result;
use crate::models::StreamDescriptor;
use crate::page_resolver;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One live browser session
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to a URL, waiting up to `timeout` for the initial load
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// URLs of every network request observed so far, in request order
    async fn observed_requests(&self) -> Vec<String>;

    /// The rendered page content as of now
    async fn content(&self) -> Result<String>;

    /// Tear the session down; must release the browser on every path
    async fn close(self: Box<Self>);
}

/// Factory for browser sessions
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn open(&self, config: &BrowserProbeConfig) -> Result<Box<dyn BrowserSession>>;
}

/// Engine that observes nothing, for environments without a browser
pub struct NoopEngine;

struct NoopSession;

#[async_trait]
impl BrowserSession for NoopSession {
    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn observed_requests(&self) -> Vec<String> {
        Vec::new()
    }

    async fn content(&self) -> Result<String> {
        Ok(String::new())
    }

    async fn close(self: Box<Self>) {}
}

#[async_trait]
impl BrowserEngine for NoopEngine {
    async fn open(&self, _config: &BrowserProbeConfig) -> Result<Box<dyn BrowserSession>> {
        Ok(Box::new(NoopSession))
    }
}

/// Dynamic resolution tier
pub struct BrowserProbe {
    engine: Arc<dyn BrowserEngine>,
    config: BrowserProbeConfig,
}

impl BrowserProbe {
    /// Create a new BrowserProbe on the given engine
    pub fn new(engine: Arc<dyn BrowserEngine>, config: BrowserProbeConfig) -> Self {
        Self { engine, config }
    }

    /// Render the page and rank whatever the session captured
    ///
    /// A navigation that never settles is not fatal: the wire capture up to
    /// that point is still ranked. The session is closed on every path.
    pub async fn resolve_dynamic(&self, page_url: &str) -> Result<StreamDescriptor> {
        let mut session = self.engine.open(&self.config).await?;

        if let Err(e) = session.navigate(page_url, self.config.nav_timeout).await {
            tracing::debug!(page = %page_url, error = %e, "Navigation did not settle, harvesting anyway");
        }

        // Late-loading players fire their manifest request after load
        tokio::time::sleep(self.config.grace_period).await;

        let requests = session.observed_requests().await;
        let content = match session.content().await {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(page = %page_url, error = %e, "Rendered content unavailable");
                String::new()
            }
        };
        session.close().await;

        tracing::debug!(
            page = %page_url,
            requests = requests.len(),
            content_bytes = content.len(),
            "Browser harvest complete"
        );
        Ok(rank_capture(&requests, &content))
    }
}

/// Rank a session harvest into a stream descriptor
///
/// Wire evidence beats rendered content, and a manifest URL beats a
/// platform reference at the same level. Request order is preserved, so
/// the first manifest on the wire wins.
pub fn rank_capture(requests: &[String], content: &str) -> StreamDescriptor {
    if let Some(url) = requests.iter().find(|u| u.contains(".m3u8")) {
        tracing::debug!(manifest = %url, "Manifest observed on the wire");
        return StreamDescriptor::ManifestUrl(url.clone());
    }

    for url in requests {
        if page_resolver::is_platform_ref(url) {
            if let Some(id) = page_resolver::platform_id_from_url(url) {
                tracing::debug!(video_id = %id, "Platform request observed on the wire");
                return StreamDescriptor::PlatformVideoId(id);
            }
        }
    }

    if let Some(url) = page_resolver::literal_manifest_url(content) {
        tracing::debug!(manifest = %url, "Manifest found in rendered content");
        return StreamDescriptor::ManifestUrl(url);
    }

    if let Some(id) = page_resolver::platform_id_in_text(content) {
        tracing::debug!(video_id = %id, "Platform reference found in rendered content");
        return StreamDescriptor::PlatformVideoId(id);
    }

    StreamDescriptor::Unresolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserProbeConfig;
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubSession {
        requests: Vec<String>,
        content: String,
        fail_navigate: bool,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserSession for StubSession {
        async fn navigate(&mut self, _url: &str, timeout: Duration) -> Result<()> {
            if self.fail_navigate {
                Err(Error::BrowserTimeout(timeout))
            } else {
                Ok(())
            }
        }

        async fn observed_requests(&self) -> Vec<String> {
            self.requests.clone()
        }

        async fn content(&self) -> Result<String> {
            Ok(self.content.clone())
        }

        async fn close(self: Box<Self>) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct StubEngine {
        requests: Vec<String>,
        content: String,
        fail_navigate: bool,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserEngine for StubEngine {
        async fn open(&self, _config: &BrowserProbeConfig) -> Result<Box<dyn BrowserSession>> {
            Ok(Box::new(StubSession {
                requests: self.requests.clone(),
                content: self.content.clone(),
                fail_navigate: self.fail_navigate,
                closed: self.closed.clone(),
            }))
        }
    }

    fn test_probe(engine: StubEngine) -> BrowserProbe {
        let config = BrowserProbeConfig {
            grace_period: Duration::ZERO,
            ..BrowserProbeConfig::default()
        };
        BrowserProbe::new(Arc::new(engine), config)
    }

    #[test]
    fn wire_manifest_outranks_wire_platform() {
        let requests = vec![
            "https://fonts.example.com/roboto.woff2".to_string(),
            "https://www.youtube.com/embed/abcDEFghi12".to_string(),
            "https://cdn.example.com/live/playlist.m3u8?tk=1".to_string(),
        ];
        assert_eq!(
            rank_capture(&requests, ""),
            StreamDescriptor::ManifestUrl("https://cdn.example.com/live/playlist.m3u8?tk=1".to_string())
        );
    }

    #[test]
    fn wire_platform_outranks_content_manifest() {
        let requests = vec!["https://www.youtube.com/embed/abcDEFghi12".to_string()];
        let content = r#"<video src="https://cdn.example.com/live.m3u8">"#;
        assert_eq!(
            rank_capture(&requests, content),
            StreamDescriptor::PlatformVideoId("abcDEFghi12".to_string())
        );
    }

    #[test]
    fn content_manifest_outranks_content_platform() {
        let content = r#"
            <video src="https://cdn.example.com/live.m3u8"></video>
            <a href="https://youtu.be/abcDEFghi12">mirror</a>
        "#;
        assert_eq!(
            rank_capture(&[], content),
            StreamDescriptor::ManifestUrl("https://cdn.example.com/live.m3u8".to_string())
        );
    }

    #[test]
    fn platform_request_without_id_is_skipped() {
        let requests = vec![
            "https://www.youtube.com/s/player/base.js".to_string(),
            "https://www.youtube.com/embed/abcDEFghi12".to_string(),
        ];
        assert_eq!(
            rank_capture(&requests, ""),
            StreamDescriptor::PlatformVideoId("abcDEFghi12".to_string())
        );
    }

    #[test]
    fn empty_harvest_is_unresolved() {
        assert_eq!(rank_capture(&[], ""), StreamDescriptor::Unresolved);
    }

    #[tokio::test]
    async fn probe_ranks_stubbed_harvest() {
        let closed = Arc::new(AtomicBool::new(false));
        let probe = test_probe(StubEngine {
            requests: vec!["https://cdn.example.com/live/playlist.m3u8".to_string()],
            content: String::new(),
            fail_navigate: false,
            closed: closed.clone(),
        });

        let descriptor = probe.resolve_dynamic("https://example.com/cam").await.unwrap();
        assert_eq!(
            descriptor,
            StreamDescriptor::ManifestUrl("https://cdn.example.com/live/playlist.m3u8".to_string())
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn session_closes_even_when_navigation_times_out() {
        let closed = Arc::new(AtomicBool::new(false));
        let probe = test_probe(StubEngine {
            requests: vec!["https://www.youtube.com/watch?v=abcDEFghi12".to_string()],
            content: String::new(),
            fail_navigate: true,
            closed: closed.clone(),
        });

        let descriptor = probe.resolve_dynamic("https://example.com/cam").await.unwrap();
        assert_eq!(
            descriptor,
            StreamDescriptor::PlatformVideoId("abcDEFghi12".to_string())
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn noop_engine_resolves_nothing() {
        let config = BrowserProbeConfig {
            grace_period: Duration::ZERO,
            ..BrowserProbeConfig::default()
        };
        let probe = BrowserProbe::new(Arc::new(NoopEngine), config);
        let descriptor = probe.resolve_dynamic("https://example.com/cam").await.unwrap();
        assert_eq!(descriptor, StreamDescriptor::Unresolved);
    }
}
