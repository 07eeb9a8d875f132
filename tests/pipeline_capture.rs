//! End-to-end capture tests against mock camera pages
//!
//! The browser tier runs on the no-op engine here; everything else goes
//! through real HTTP against wiremock.

use camsnap::browser_probe::NoopEngine;
use camsnap::config::BrowserProbeConfig;
use camsnap::models::Tier;
use camsnap::{CaptureConfig, CapturePipeline, Error, FrameSource};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config(server: &MockServer) -> CaptureConfig {
    CaptureConfig {
        thumbnail_base: server.uri(),
        playlist_backoff: Duration::ZERO,
        browser: BrowserProbeConfig {
            grace_period: Duration::ZERO,
            ..BrowserProbeConfig::default()
        },
        ..CaptureConfig::default()
    }
}

fn test_pipeline(server: &MockServer) -> CapturePipeline {
    CapturePipeline::with_engine(&test_config(server), Arc::new(NoopEngine)).unwrap()
}

#[tokio::test]
async fn platform_page_resolves_to_thumbnail_frame() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cam"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><iframe src="https://www.youtube.com/embed/abcDEFghi12"></iframe></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abcDEFghi12/maxresdefault.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 9000]))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server);
    let frame = pipeline
        .capture(&format!("{}/cam", server.uri()))
        .await
        .unwrap();

    assert_eq!(frame.source, FrameSource::PlatformThumbnail);
    assert_eq!(frame.image_bytes.len(), 9000);
    assert!(frame.source_url.ends_with("/abcDEFghi12/maxresdefault.jpg"));
}

#[tokio::test]
async fn manifest_page_fails_at_decode_with_full_trail() {
    init_tracing();
    let server = MockServer::start().await;

    let page_body = format!(
        r#"<html><script>var stream = "{}/live/master.m3u8";</script></html>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/cam"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/live/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1200000\nchunklist.m3u8\n",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/live/chunklist.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U\n#EXTINF:6.0,\nseg1.ts\n#EXTINF:6.0,\nseg3.ts\n",
        ))
        .mount(&server)
        .await;
    // The newest segment is gone, so decoding never starts
    Mock::given(method("GET"))
        .and(path("/live/seg3.ts"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server);
    let err = pipeline
        .capture(&format!("{}/cam", server.uri()))
        .await
        .unwrap_err();

    let Error::NoFrame { attempts } = err else {
        panic!("expected NoFrame, got {:?}", err);
    };
    let tiers: Vec<Tier> = attempts.iter().map(|a| a.tier).collect();
    assert_eq!(
        tiers,
        vec![Tier::PageScan, Tier::PlaylistResolve, Tier::FrameDecode]
    );
    assert!(attempts[0].failure.is_none());
    assert!(attempts[1].failure.is_none());
    assert!(attempts[2].failure.is_some());
}

#[tokio::test]
async fn unreachable_page_exhausts_both_resolution_tiers() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cam"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server);
    let err = pipeline
        .capture(&format!("{}/cam", server.uri()))
        .await
        .unwrap_err();

    let Error::NoFrame { attempts } = err else {
        panic!("expected NoFrame, got {:?}", err);
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].tier, Tier::PageScan);
    assert_eq!(attempts[1].tier, Tier::BrowserProbe);
    assert!(attempts.iter().all(|a| a.failure.is_some()));
}

#[tokio::test]
async fn capture_first_moves_past_dead_candidates() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alive"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="https://youtu.be/abcDEFghi12">live view</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/abcDEFghi12/maxresdefault.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server);
    let candidates = [
        format!("{}/dead", server.uri()),
        format!("{}/alive", server.uri()),
    ];
    let frame = pipeline.capture_first(&candidates).await.unwrap();

    assert_eq!(frame.source, FrameSource::PlatformThumbnail);
    assert_eq!(frame.image_bytes.len(), 4096);
}

#[tokio::test]
async fn capture_first_accumulates_attempts_across_candidates() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline = test_pipeline(&server);
    let candidates = [
        format!("{}/one", server.uri()),
        format!("{}/two", server.uri()),
    ];
    let err = pipeline.capture_first(&candidates).await.unwrap_err();

    let Error::NoFrame { attempts } = err else {
        panic!("expected NoFrame, got {:?}", err);
    };
    // Two resolution tiers touched per candidate
    assert_eq!(attempts.len(), 4);
}
