//! CapturePipeline - Tiered Frame Capture Orchestration
//!
//! ## Responsibilities
//!
//! - Run the resolution strategies in order until one yields a descriptor
//! - Route manifest descriptors through playlist walking and frame decoding
//! - Route platform descriptors through the thumbnail fallback
//! - Record one attempt entry per tier touched, with timing and failure
//! - Fold every exhausted path into a single `NoFrame` failure carrying
//!   the full attempt trail
//!
//! Attempt records live only for the duration of one capture call; nothing
//! here persists state between captures.

use crate::browser_probe::chromium::ChromiumEngine;
use crate::browser_probe::{BrowserEngine, BrowserProbe};
use crate::config::CaptureConfig;
use crate::error::{Error, Result};
use crate::frame_decoder::FrameDecoder;
use crate::models::{FrameSource, ResolutionAttempt, ResolvedFrame, StreamDescriptor, Tier};
use crate::page_resolver::{PageResolver, StaticOutcome};
use crate::playlist_resolver::PlaylistResolver;
use crate::thumbnail_service::ThumbnailService;
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// One way of turning a page URL into a stream descriptor
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn tier(&self) -> Tier;

    /// `Ok(Unresolved)` means the strategy ran clean and found nothing;
    /// `Err` means it could not run to completion.
    async fn attempt(&self, page_url: &str) -> Result<StreamDescriptor>;
}

/// Static page scan, the cheap first strategy
struct StaticStrategy {
    resolver: PageResolver,
}

#[async_trait]
impl ResolveStrategy for StaticStrategy {
    fn tier(&self) -> Tier {
        Tier::PageScan
    }

    async fn attempt(&self, page_url: &str) -> Result<StreamDescriptor> {
        match self.resolver.resolve(page_url).await? {
            StaticOutcome::Descriptor(descriptor) => Ok(descriptor),
            StaticOutcome::RequiresDynamic => {
                Err(Error::RequiresScriptExecution(page_url.to_string()))
            }
            StaticOutcome::NotFound => Ok(StreamDescriptor::Unresolved),
        }
    }
}

/// Browser-driven scan for pages the static strategy cannot crack
struct DynamicStrategy {
    probe: BrowserProbe,
}

#[async_trait]
impl ResolveStrategy for DynamicStrategy {
    fn tier(&self) -> Tier {
        Tier::BrowserProbe
    }

    async fn attempt(&self, page_url: &str) -> Result<StreamDescriptor> {
        self.probe.resolve_dynamic(page_url).await
    }
}

/// The full capture pipeline
pub struct CapturePipeline {
    strategies: Vec<Box<dyn ResolveStrategy>>,
    playlist: PlaylistResolver,
    decoder: FrameDecoder,
    thumbnails: ThumbnailService,
}

impl CapturePipeline {
    /// Create a pipeline backed by headless Chromium
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        Self::with_engine(config, Arc::new(ChromiumEngine))
    }

    /// Create a pipeline on a caller-supplied browser engine
    pub fn with_engine(config: &CaptureConfig, engine: Arc<dyn BrowserEngine>) -> Result<Self> {
        let strategies: Vec<Box<dyn ResolveStrategy>> = vec![
            Box::new(StaticStrategy {
                resolver: PageResolver::new(config)?,
            }),
            Box::new(DynamicStrategy {
                probe: BrowserProbe::new(engine, config.browser.clone()),
            }),
        ];
        Ok(Self {
            strategies,
            playlist: PlaylistResolver::new(config)?,
            decoder: FrameDecoder::new(config)?,
            thumbnails: ThumbnailService::new(config)?,
        })
    }

    /// Capture one frame from a camera page
    ///
    /// Every failure mode ends in `NoFrame` with the attempt trail; callers
    /// never see the individual tier errors except as attempt records.
    pub async fn capture(&self, page_url: &str) -> Result<ResolvedFrame> {
        let mut attempts = Vec::new();

        match self.resolve_descriptor(page_url, &mut attempts).await {
            StreamDescriptor::ManifestUrl(manifest_url) => {
                let segment_url = match run_tier(
                    Tier::PlaylistResolve,
                    &mut attempts,
                    self.playlist.resolve_segment(&manifest_url),
                )
                .await
                {
                    Ok(url) => url,
                    Err(_) => return Err(Error::NoFrame { attempts }),
                };

                let image_bytes = match run_tier(
                    Tier::FrameDecode,
                    &mut attempts,
                    self.decoder.decode_frame(&segment_url),
                )
                .await
                {
                    Ok(bytes) => bytes,
                    Err(_) => return Err(Error::NoFrame { attempts }),
                };

                tracing::info!(
                    page = %page_url,
                    source = FrameSource::Stream.as_str(),
                    size = image_bytes.len(),
                    "Frame captured from live stream"
                );
                Ok(ResolvedFrame {
                    image_bytes,
                    source: FrameSource::Stream,
                    source_url: segment_url,
                    captured_at: Utc::now(),
                })
            }
            StreamDescriptor::PlatformVideoId(video_id) => {
                let thumb = match run_tier(
                    Tier::ThumbnailFetch,
                    &mut attempts,
                    self.thumbnails.fetch_thumbnail(&video_id),
                )
                .await
                {
                    Ok(thumb) => thumb,
                    Err(_) => return Err(Error::NoFrame { attempts }),
                };

                tracing::info!(
                    page = %page_url,
                    source = FrameSource::PlatformThumbnail.as_str(),
                    size = thumb.data.len(),
                    "Frame captured from platform thumbnail"
                );
                Ok(ResolvedFrame {
                    image_bytes: thumb.data,
                    source: FrameSource::PlatformThumbnail,
                    source_url: thumb.url,
                    captured_at: Utc::now(),
                })
            }
            StreamDescriptor::Unresolved => {
                tracing::warn!(page = %page_url, tiers = attempts.len(), "All resolution tiers exhausted");
                Err(Error::NoFrame { attempts })
            }
        }
    }

    /// Capture from the first candidate page that yields a frame
    ///
    /// Later candidates are only tried after the full pipeline has failed
    /// on the earlier ones; the final failure carries every attempt made.
    pub async fn capture_first<S: AsRef<str>>(&self, candidates: &[S]) -> Result<ResolvedFrame> {
        let mut all_attempts = Vec::new();
        for candidate in candidates {
            let candidate = candidate.as_ref();
            match self.capture(candidate).await {
                Ok(frame) => return Ok(frame),
                Err(Error::NoFrame { attempts }) => {
                    tracing::warn!(
                        page = %candidate,
                        tiers = attempts.len(),
                        "Candidate page yielded no frame"
                    );
                    all_attempts.extend(attempts);
                }
                Err(e) => {
                    tracing::warn!(page = %candidate, error = %e, "Candidate capture failed");
                }
            }
        }
        Err(Error::NoFrame {
            attempts: all_attempts,
        })
    }

    /// Check that the decoding toolchain is available
    pub async fn check_ffmpeg(&self) -> Result<String> {
        self.decoder.check_ffmpeg().await
    }

    // ========================================
    // Internal Methods
    // ========================================

    async fn resolve_descriptor(
        &self,
        page_url: &str,
        attempts: &mut Vec<ResolutionAttempt>,
    ) -> StreamDescriptor {
        for strategy in &self.strategies {
            let tier = strategy.tier();
            let started = Instant::now();
            match strategy.attempt(page_url).await {
                Ok(StreamDescriptor::Unresolved) => {
                    tracing::debug!(page = %page_url, tier = tier.as_str(), "No stream signature at this tier");
                    attempts.push(ResolutionAttempt {
                        tier,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        failure: Some(Error::NoStreamSignature.to_string()),
                    });
                }
                Ok(descriptor) => {
                    tracing::debug!(
                        page = %page_url,
                        tier = tier.as_str(),
                        descriptor = ?descriptor,
                        "Stream descriptor resolved"
                    );
                    attempts.push(ResolutionAttempt {
                        tier,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        failure: None,
                    });
                    return descriptor;
                }
                Err(e) => {
                    // The script-execution signal is expected routing, not
                    // an anomaly worth a warning.
                    if matches!(e, Error::RequiresScriptExecution(_)) {
                        tracing::debug!(page = %page_url, tier = tier.as_str(), "Page requires script execution");
                    } else {
                        tracing::warn!(page = %page_url, tier = tier.as_str(), error = %e, "Resolution tier failed");
                    }
                    attempts.push(ResolutionAttempt {
                        tier,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        failure: Some(e.to_string()),
                    });
                }
            }
        }
        StreamDescriptor::Unresolved
    }
}

/// Run one post-resolution tier, recording its attempt entry
async fn run_tier<T>(
    tier: Tier,
    attempts: &mut Vec<ResolutionAttempt>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    let started = Instant::now();
    let result = work.await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => attempts.push(ResolutionAttempt {
            tier,
            elapsed_ms,
            failure: None,
        }),
        Err(e) => {
            tracing::warn!(tier = tier.as_str(), error = %e, "Capture tier failed");
            attempts.push(ResolutionAttempt {
                tier,
                elapsed_ms,
                failure: Some(e.to_string()),
            });
        }
    }
    result
}
