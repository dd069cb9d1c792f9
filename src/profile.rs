//! Transcode profiles.
//!
//! A [`TranscodeProfile`] captures what the client asked for (quality
//! tiers, track selection, playback offset); an
//! [`AdaptiveStreamingProfile`] composes it with the segmented-output
//! bookkeeping an adaptive stream needs. Profiles are resolved while a
//! request is being set up and treated as immutable once a transcode
//! starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Requested video quality tier.
///
/// Tiers map to a fixed target resolution; the command builder never
/// upscales past the source resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl VideoQuality {
    /// Target (width, height) for this tier.
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            Self::Low => (640, 360),
            Self::Medium => (960, 540),
            Self::High => (1280, 720),
            Self::VeryHigh => (1920, 1080),
        }
    }

    /// Target video bitrate in kbit/s, also used as the advertised
    /// bandwidth in DASH manifests.
    pub fn video_bitrate_kbps(&self) -> u32 {
        match self {
            Self::Low => 1000,
            Self::Medium => 2500,
            Self::High => 5000,
            Self::VeryHigh => 8000,
        }
    }
}

/// Requested audio quality tier. Bitrates are codec-specific and live in
/// the command builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    Low,
    Medium,
    High,
    Lossless,
}

/// Stream packaging family for adaptive delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Hls,
    Dash,
    DashWebm,
    DashMp4,
}

impl StreamType {
    /// On-disk extension of produced segment files.
    pub fn segment_extension(&self) -> &'static str {
        match self {
            Self::Hls | Self::Dash => "ts",
            Self::DashWebm => "webm",
            Self::DashMp4 => "mp4",
        }
    }

    /// Container format passed to the transcoder's segment muxer.
    pub fn segment_format(&self) -> &'static str {
        match self {
            Self::Hls | Self::Dash => "mpegts",
            Self::DashWebm => "webm",
            Self::DashMp4 => "mp4",
        }
    }

    /// Mime type of individual segments.
    pub fn segment_mime_type(&self) -> &'static str {
        match self {
            Self::Hls | Self::Dash => "video/mp2t",
            Self::DashWebm => "video/webm",
            Self::DashMp4 => "video/mp4",
        }
    }

    pub fn is_dash(&self) -> bool {
        !matches!(self, Self::Hls)
    }
}

/// Base transcode request shape, shared by single-shot and adaptive
/// transcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeProfile {
    pub video_quality: VideoQuality,
    pub audio_quality: AudioQuality,
    /// Index into the media element's audio stream list.
    pub audio_track: Option<usize>,
    /// Index into the media element's subtitle stream list; selected
    /// subtitles are burned into the video.
    pub subtitle_track: Option<usize>,
    /// Pass multichannel audio through instead of downmixing.
    pub multichannel: bool,
    /// Cap the output sample rate, in Hz.
    pub max_sample_rate: Option<u32>,
    /// Client identifier, used to gate format support.
    pub client: String,
    /// Mime type of the overall response the caller will serve.
    pub mime_type: String,
    /// Playback-time offset in seconds.
    pub offset_secs: u32,
}

impl TranscodeProfile {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            video_quality: VideoQuality::Medium,
            audio_quality: AudioQuality::Medium,
            audio_track: None,
            subtitle_track: None,
            multichannel: false,
            max_sample_rate: None,
            client: client.into(),
            mime_type: String::new(),
            offset_secs: 0,
        }
    }
}

/// Profile for one adaptive streaming transcode run.
///
/// Created per initialise/restart call; `segment_offset` is fixed at
/// construction and names the first segment index this run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveStreamingProfile {
    pub base: TranscodeProfile,
    pub stream_type: StreamType,
    /// Directory this job's segment files are written to.
    pub output_dir: PathBuf,
    /// First segment index produced by this process run.
    pub segment_offset: u32,
    /// `duration / segment_duration`, integer division. The final
    /// partial segment is handled by playlist generation.
    pub last_segment: u32,
}

impl AdaptiveStreamingProfile {
    pub fn new(
        base: TranscodeProfile,
        stream_type: StreamType,
        output_dir: PathBuf,
        segment_offset: u32,
        last_segment: u32,
    ) -> Self {
        Self {
            base,
            stream_type,
            output_dir,
            segment_offset,
            last_segment,
        }
    }

    /// On-disk file name for a segment index: zero-padded to five digits
    /// plus the family extension, e.g. `stream00042.ts`.
    pub fn segment_file_name(&self, segment: u32) -> String {
        format!("stream{:05}.{}", segment, self.stream_type.segment_extension())
    }

    /// Full path of a segment file inside the output directory.
    pub fn segment_path(&self, segment: u32) -> PathBuf {
        self.output_dir.join(self.segment_file_name(segment))
    }

    /// Pattern handed to the transcoder's segment muxer.
    pub fn segment_file_pattern(&self) -> PathBuf {
        self.output_dir
            .join(format!("stream%05d.{}", self.stream_type.segment_extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_resolutions() {
        assert_eq!(VideoQuality::Low.resolution(), (640, 360));
        assert_eq!(VideoQuality::Medium.resolution(), (960, 540));
        assert_eq!(VideoQuality::High.resolution(), (1280, 720));
        assert_eq!(VideoQuality::VeryHigh.resolution(), (1920, 1080));
    }

    #[test]
    fn test_stream_type_extensions() {
        assert_eq!(StreamType::Hls.segment_extension(), "ts");
        assert_eq!(StreamType::Dash.segment_extension(), "ts");
        assert_eq!(StreamType::DashWebm.segment_extension(), "webm");
        assert_eq!(StreamType::DashMp4.segment_extension(), "mp4");
    }

    #[test]
    fn test_segment_naming() {
        let profile = AdaptiveStreamingProfile::new(
            TranscodeProfile::new("kodi"),
            StreamType::Hls,
            PathBuf::from("/tmp/stream/job"),
            0,
            9,
        );
        assert_eq!(profile.segment_file_name(0), "stream00000.ts");
        assert_eq!(profile.segment_file_name(42), "stream00042.ts");
        assert_eq!(
            profile.segment_path(7),
            PathBuf::from("/tmp/stream/job/stream00007.ts")
        );
        assert_eq!(
            profile.segment_file_pattern(),
            PathBuf::from("/tmp/stream/job/stream%05d.ts")
        );
    }

    #[test]
    fn test_quality_ordering() {
        assert!(VideoQuality::Low < VideoQuality::VeryHigh);
        assert!(AudioQuality::Medium < AudioQuality::Lossless);
    }
}
