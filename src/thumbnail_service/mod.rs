//! ThumbnailService - Platform Thumbnail Fallback
//!
//! ## Responsibilities
//!
//! - Fetch platform thumbnails for a video ID, best quality first
//! - Reject placeholder images by size before accepting a response
//! - Report which endpoint variant actually served the image

use crate::config::{CaptureConfig, DESKTOP_USER_AGENT};
use crate::error::{Error, Result};

/// Endpoint variants in descending quality order
const THUMBNAIL_VARIANTS: [&str; 3] = ["maxresdefault.jpg", "hqdefault.jpg", "mqdefault.jpg"];

/// A thumbnail that passed the placeholder check
#[derive(Debug, Clone)]
pub struct FetchedThumbnail {
    pub data: Vec<u8>,
    /// The exact endpoint URL that served the image
    pub url: String,
}

/// Thumbnail fallback tier
pub struct ThumbnailService {
    client: reqwest::Client,
    base: String,
    min_bytes: usize,
}

impl ThumbnailService {
    /// Create a new ThumbnailService
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.thumbnail_timeout)
            .user_agent(DESKTOP_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base: config.thumbnail_base.trim_end_matches('/').to_string(),
            min_bytes: config.min_thumbnail_bytes,
        })
    }

    /// Fetch the best available thumbnail for a platform video ID
    ///
    /// The platform serves a small placeholder (with status 200) for
    /// qualities a video never had, so a body at or under the size floor
    /// falls through to the next variant.
    pub async fn fetch_thumbnail(&self, video_id: &str) -> Result<FetchedThumbnail> {
        for variant in THUMBNAIL_VARIANTS {
            let url = format!("{}/{}/{}", self.base, video_id, variant);
            match self.try_endpoint(&url).await {
                Ok(Some(data)) => {
                    tracing::debug!(
                        video_id = %video_id,
                        variant = %variant,
                        size = data.len(),
                        "Thumbnail accepted"
                    );
                    return Ok(FetchedThumbnail { data, url });
                }
                Ok(None) => {
                    tracing::debug!(video_id = %video_id, variant = %variant, "Thumbnail variant rejected");
                }
                Err(e) => {
                    tracing::debug!(video_id = %video_id, variant = %variant, error = %e, "Thumbnail fetch failed");
                }
            }
        }
        Err(Error::PlatformThumbnailUnavailable(video_id.to_string()))
    }

    /// `Ok(None)` means this variant is missing or a placeholder; try the next
    async fn try_endpoint(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let data = resp.bytes().await?;
        if data.len() <= self.min_bytes {
            return Ok(None);
        }
        Ok(Some(data.to_vec()))
    }
}
