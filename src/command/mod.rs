//! Transcode command construction.
//!
//! Turns a media element + profile pair into an ordered argument list for
//! the external transcoder. The decision rules (resolution clamping,
//! bitrate tables, track selection, subtitle burn-in) are shared across
//! stream families; [`adaptive`] applies them for segmented HLS/DASH
//! output.

mod adaptive;

pub use adaptive::build_adaptive_command;

use crate::error::{Error, Result, TrackKind};
use crate::media::{AudioStreamInfo, MediaElement, SubtitleStreamInfo};
use crate::profile::{AudioQuality, StreamType, VideoQuality};
use std::path::Path;

/// Client identifiers the engine knows how to serve.
const SUPPORTED_CLIENTS: &[&str] = &[
    "chrome", "firefox", "safari", "edge", "android", "ios", "kodi",
];

/// Whether a client identifier is recognised.
pub fn client_supported(client: &str) -> bool {
    SUPPORTED_CLIENTS.contains(&client.to_lowercase().as_str())
}

/// Audio codec used for a stream family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Vorbis,
}

impl AudioCodec {
    pub fn for_stream_type(stream_type: StreamType) -> Self {
        match stream_type {
            StreamType::DashWebm => Self::Vorbis,
            _ => Self::Aac,
        }
    }

    pub fn encoder(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Vorbis => "libvorbis",
        }
    }
}

/// Video encoder used for a stream family.
pub fn video_encoder(stream_type: StreamType) -> &'static str {
    match stream_type {
        StreamType::DashWebm => "libvpx",
        _ => "libx264",
    }
}

/// Resolve the target resolution for a quality tier against the source.
///
/// If the source is smaller than the tier in either dimension the source
/// resolution is used instead (never upscale). Both dimensions are
/// rounded down to even values, a transcoder constraint.
pub fn target_resolution(quality: VideoQuality, source_width: u32, source_height: u32) -> (u32, u32) {
    let (tier_width, tier_height) = quality.resolution();
    let (width, height) = if source_width < tier_width || source_height < tier_height {
        (source_width, source_height)
    } else {
        (tier_width, tier_height)
    };
    (width & !1, height & !1)
}

/// Audio bitrate in kbit/s for a quality tier.
///
/// The downmix table applies when a multichannel track is being folded
/// down to the configured channel limit; folded-down audio gets more
/// headroom than a native stereo track at the same tier.
pub fn audio_bitrate_kbps(codec: AudioCodec, quality: AudioQuality, downmix: bool) -> u32 {
    match (codec, downmix) {
        (AudioCodec::Aac, false) => match quality {
            AudioQuality::Low => 64,
            AudioQuality::Medium => 96,
            AudioQuality::High => 160,
            AudioQuality::Lossless => 192,
        },
        (AudioCodec::Aac, true) => match quality {
            AudioQuality::Low => 128,
            AudioQuality::Medium => 192,
            AudioQuality::High => 256,
            AudioQuality::Lossless => 320,
        },
        (AudioCodec::Vorbis, false) => match quality {
            AudioQuality::Low => 80,
            AudioQuality::Medium => 112,
            AudioQuality::High => 160,
            AudioQuality::Lossless => 192,
        },
        (AudioCodec::Vorbis, true) => match quality {
            AudioQuality::Low => 128,
            AudioQuality::Medium => 192,
            AudioQuality::High => 256,
            AudioQuality::Lossless => 320,
        },
    }
}

/// Validate an optional audio track index against the media element.
pub fn select_audio_track(
    media: &MediaElement,
    index: Option<usize>,
) -> Result<Option<(usize, &AudioStreamInfo)>> {
    match index {
        None => Ok(None),
        Some(i) => match media.audio_streams.get(i) {
            Some(stream) => Ok(Some((i, stream))),
            None => Err(Error::TrackNotFound {
                kind: TrackKind::Audio,
                index: i,
                available: media.audio_streams.len(),
            }),
        },
    }
}

/// Validate an optional subtitle track index against the media element.
pub fn select_subtitle_track(
    media: &MediaElement,
    index: Option<usize>,
) -> Result<Option<(usize, &SubtitleStreamInfo)>> {
    match index {
        None => Ok(None),
        Some(i) => match media.subtitle_streams.get(i) {
            Some(stream) => Ok(Some((i, stream))),
            None => Err(Error::TrackNotFound {
                kind: TrackKind::Subtitle,
                index: i,
                available: media.subtitle_streams.len(),
            }),
        },
    }
}

/// Burn-in filter chain for a text-based subtitle track.
///
/// Transcoding from an offset still has to render subtitles at the
/// correct relative time, so presentation timestamps are shifted forward
/// by the seek position before the subtitles filter runs, then reset to
/// start at zero.
pub fn text_subtitle_filter(input: &Path, index: usize, offset_secs: u32) -> String {
    format!(
        "setpts=PTS+{}/TB,subtitles='{}':si={},setpts=PTS-STARTPTS",
        offset_secs,
        input.display(),
        index
    )
}

/// Overlay filter graph for a picture-based subtitle track. Produces a
/// labelled output the caller maps as the video stream.
pub fn picture_subtitle_filter(index: usize, width: u32, height: u32) -> String {
    format!(
        "[0:v][0:s:{}]overlay[vid];[vid]scale={}:{}[vout]",
        index, width, height
    )
}
