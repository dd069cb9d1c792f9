//! Playlist and manifest generation.
//!
//! Emits the HLS media playlist (M3U8 text) and the MPEG-DASH manifest
//! (MPD XML) describing a job's segments. Segment enumeration is shared:
//! `floor(duration / segment_duration)` full-length entries plus one
//! partial entry iff there is a remainder, so indices always line up
//! with the transcoder's on-disk numbering.

use super::AdaptiveStreamingService;
use crate::error::{Error, Result};
use std::fmt::Write;
use uuid::Uuid;

/// One playlist entry: segment index and its duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentEntry {
    pub index: u32,
    pub duration_secs: u32,
}

/// Enumerate the segments of a media duration.
pub(crate) fn segment_entries(duration_secs: u32, segment_duration: u32) -> Vec<SegmentEntry> {
    let full = duration_secs / segment_duration;
    let remainder = duration_secs % segment_duration;

    let mut entries: Vec<SegmentEntry> = (0..full)
        .map(|index| SegmentEntry {
            index,
            duration_secs: segment_duration,
        })
        .collect();
    if remainder > 0 {
        entries.push(SegmentEntry {
            index: full,
            duration_secs: remainder,
        });
    }
    entries
}

/// Render an HLS VOD media playlist.
pub(crate) fn hls_playlist(
    duration_secs: u32,
    segment_duration: u32,
    base_url: &str,
    job_id: Uuid,
) -> String {
    let mut playlist = String::new();

    writeln!(playlist, "#EXTM3U").unwrap();
    writeln!(playlist, "#EXT-X-VERSION:3").unwrap();
    writeln!(playlist, "#EXT-X-TARGETDURATION:{}", segment_duration).unwrap();

    for entry in segment_entries(duration_secs, segment_duration) {
        writeln!(playlist, "#EXTINF:{}.0,", entry.duration_secs).unwrap();
        writeln!(
            playlist,
            "{}/hls/stream?id={}&segment={}",
            base_url, job_id, entry.index
        )
        .unwrap();
    }

    writeln!(playlist, "#EXT-X-ENDLIST").unwrap();
    playlist
}

/// Render a static MPEG-DASH manifest with a single representation.
pub(crate) fn dash_manifest(
    duration_secs: u32,
    segment_duration: u32,
    base_url: &str,
    job_id: Uuid,
    mime_type: &str,
    bandwidth_bps: u32,
) -> String {
    // Query separators must be entity-escaped inside attribute values
    let segment_url =
        |segment: u32| format!("{}/dash/stream?id={}&amp;segment={}", base_url, job_id, segment);

    let mut mpd = String::new();
    writeln!(mpd, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
    writeln!(
        mpd,
        r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011" type="static" minBufferTime="PT1.5S" mediaPresentationDuration="PT{}S">"#,
        duration_secs
    )
    .unwrap();
    writeln!(mpd, r#"  <Period duration="PT{}S">"#, duration_secs).unwrap();
    writeln!(
        mpd,
        r#"    <AdaptationSet mimeType="{}" segmentAlignment="true">"#,
        mime_type
    )
    .unwrap();
    writeln!(
        mpd,
        r#"      <Representation id="0" mimeType="{}" bandwidth="{}">"#,
        mime_type, bandwidth_bps
    )
    .unwrap();
    writeln!(mpd, r#"        <SegmentList duration="{}">"#, segment_duration).unwrap();
    writeln!(
        mpd,
        r#"          <Initialization sourceURL="{}"/>"#,
        segment_url(0)
    )
    .unwrap();
    for entry in segment_entries(duration_secs, segment_duration) {
        writeln!(
            mpd,
            r#"          <SegmentURL media="{}"/>"#,
            segment_url(entry.index)
        )
        .unwrap();
    }
    writeln!(mpd, "        </SegmentList>").unwrap();
    writeln!(mpd, "      </Representation>").unwrap();
    writeln!(mpd, "    </AdaptationSet>").unwrap();
    writeln!(mpd, "  </Period>").unwrap();
    writeln!(mpd, "</MPD>").unwrap();
    mpd
}

impl AdaptiveStreamingService {
    /// Generate the HLS media playlist for a job.
    pub fn generate_hls_playlist(&self, job_id: Uuid, base_url: &str) -> Result<String> {
        let duration_secs = self.job_media_duration(job_id)?;
        Ok(hls_playlist(
            duration_secs,
            self.config().segment_duration,
            base_url,
            job_id,
        ))
    }

    /// Generate the DASH manifest for a job. The representation's mime
    /// type and advertised bandwidth come from the job's streaming
    /// profile, which survives transcode process teardown.
    pub fn generate_dash_manifest(&self, job_id: Uuid, base_url: &str) -> Result<String> {
        let duration_secs = self.job_media_duration(job_id)?;
        let profile = self
            .streaming_profile(job_id)
            .ok_or(Error::JobNotFound(job_id))?;

        Ok(dash_manifest(
            duration_secs,
            self.config().segment_duration,
            base_url,
            job_id,
            profile.stream_type.segment_mime_type(),
            profile.base.video_quality.video_bitrate_kbps() * 1000,
        ))
    }

    fn job_media_duration(&self, job_id: Uuid) -> Result<u32> {
        let job = self.jobs.get(job_id).ok_or(Error::JobNotFound(job_id))?;
        let media = self
            .media
            .get(job.media_element_id)
            .ok_or(Error::MediaNotFound(job.media_element_id))?;
        Ok(media.duration_secs)
    }
}
