//! FrameDecoder - Still Frame Extraction from Transport Stream Segments
//!
//! ## Responsibilities
//!
//! - Download a media segment with the media UA and camera-network referer
//! - Stage the segment in a uniquely-named temporary file
//! - Extract the first frame as JPEG bytes via ffmpeg
//! - Remove the temporary file on every exit path, success or failure

use crate::config::{CaptureConfig, MEDIA_USER_AGENT};
use crate::error::{Error, Result};
use reqwest::header::REFERER;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

/// A downloaded segment staged on disk, removed on drop
///
/// The name carries a UUID so concurrent captures never collide on the
/// same path.
struct TempSegment {
    path: PathBuf,
}

impl TempSegment {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("camsnap_segment_{}.ts", Uuid::new_v4()));
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempSegment {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp segment");
            } else {
                tracing::trace!(path = %self.path.display(), "Removed temp segment");
            }
        }
    }
}

/// Frame decoding tier
pub struct FrameDecoder {
    client: reqwest::Client,
    referer: String,
    ffmpeg_path: String,
    decode_timeout: Duration,
}

impl FrameDecoder {
    /// Create a new FrameDecoder
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.segment_timeout)
            .user_agent(MEDIA_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            referer: config.media_referer.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
            decode_timeout: config.decode_timeout,
        })
    }

    /// Download a segment and decode its first frame to JPEG bytes
    pub async fn decode_frame(&self, segment_url: &str) -> Result<Vec<u8>> {
        let data = self.fetch_segment(segment_url).await?;

        let temp = TempSegment::new();
        tokio::fs::write(temp.path(), &data).await?;
        tracing::debug!(
            segment = %segment_url,
            size = data.len(),
            path = %temp.path().display(),
            "Segment staged for decoding"
        );

        // temp is dropped (and the file removed) whichever way this returns
        self.extract_first_frame(temp.path()).await
    }

    /// Check that ffmpeg is available, returning its version line
    pub async fn check_ffmpeg(&self) -> Result<String> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Error::DecodeFailure(format!("ffmpeg not available: {}", e)))?;

        if !output.status.success() {
            return Err(Error::DecodeFailure(
                "ffmpeg -version exited with an error".to_string(),
            ));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("unknown")
            .to_string();
        Ok(version)
    }

    // ========================================
    // Internal Methods
    // ========================================

    async fn fetch_segment(&self, segment_url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(segment_url)
            .header(REFERER, &self.referer)
            .send()
            .await
            .map_err(|e| Error::SegmentUnreachable(format!("{}: {}", segment_url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::SegmentUnreachable(format!(
                "{} returned {}",
                segment_url,
                resp.status()
            )));
        }

        let data = resp
            .bytes()
            .await
            .map_err(|e| Error::SegmentUnreachable(format!("{}: body read failed: {}", segment_url, e)))?;

        if data.is_empty() {
            return Err(Error::SegmentUnreachable(format!(
                "{} returned an empty body",
                segment_url
            )));
        }

        Ok(data.to_vec())
    }

    async fn extract_first_frame(&self, segment_path: &Path) -> Result<Vec<u8>> {
        let child = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(segment_path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "mjpeg"])
            .args(["-loglevel", "error", "-y", "-"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::DecodeFailure(format!("failed to spawn ffmpeg: {}", e)))?;

        match tokio::time::timeout(self.decode_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(Error::DecodeFailure(format!(
                        "ffmpeg exited with {}: {}",
                        output.status,
                        stderr.trim()
                    )));
                }
                if output.stdout.is_empty() {
                    return Err(Error::DecodeFailure(
                        "ffmpeg returned no frame data".to_string(),
                    ));
                }
                Ok(output.stdout)
            }
            Ok(Err(e)) => Err(Error::DecodeFailure(format!("ffmpeg wait failed: {}", e))),
            Err(_) => {
                tracing::warn!(
                    path = %segment_path.display(),
                    timeout = ?self.decode_timeout,
                    "ffmpeg timed out, killing process"
                );
                Err(Error::DecodeFailure(format!(
                    "ffmpeg timed out after {:?}",
                    self.decode_timeout
                )))
            }
        }
    }
}
