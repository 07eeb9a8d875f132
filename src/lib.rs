//! camsnap - Webcam Stream Resolution and Frame Capture
//!
//! Resolves a public webcam page to its live video stream and captures a
//! single still frame, falling back tier by tier when a cheaper method
//! fails:
//!
//! 1. **PageResolver** - static page scan without script execution
//! 2. **BrowserProbe** - headless browser probe for script-built players
//! 3. **PlaylistResolver** - HLS manifest walk to the newest segment
//! 4. **FrameDecoder** - first-frame extraction from the segment via ffmpeg
//! 5. **ThumbnailService** - platform thumbnail fallback for platform-hosted
//!    cameras
//!
//! ## Design Principles
//!
//! - Tiers are ordered by cost; the browser only launches when the static
//!   scan says the page needs script execution
//! - Every exhausted path folds into a single `NoFrame` failure carrying
//!   the per-tier attempt trail
//! - Page templates change often, so each extraction rule is a small named
//!   function that tests in isolation

pub mod browser_probe;
pub mod capture_pipeline;
pub mod config;
pub mod error;
pub mod frame_decoder;
pub mod models;
pub mod page_resolver;
pub mod playlist_resolver;
pub mod thumbnail_service;

pub use capture_pipeline::CapturePipeline;
pub use config::CaptureConfig;
pub use error::{Error, Result};
pub use models::{FrameSource, ResolvedFrame, StreamDescriptor};
