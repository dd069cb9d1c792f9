//! Vodcast - adaptive streaming transcode engine
//!
//! Drives an external transcoder (ffmpeg) incrementally to produce
//! HLS/MPEG-DASH segments on disk while clients poll for them, detects
//! seek-ahead requests and restarts transcoding at the requested offset,
//! and tracks per-job process lifecycle and byte accounting.
//!
//! The HTTP layer and persistent storage are external collaborators:
//! callers hand in a [`media::MediaStore`] and a [`job::JobStore`] and
//! consume the [`streaming::AdaptiveStreamingService`] API.

pub mod command;
pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod process;
pub mod profile;
pub mod streaming;

pub use error::{Error, Result};
