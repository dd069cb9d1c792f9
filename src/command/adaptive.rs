//! Command builder for segmented (HLS/DASH) output.

use super::{
    audio_bitrate_kbps, client_supported, picture_subtitle_filter, select_audio_track,
    select_subtitle_track, target_resolution, text_subtitle_filter, video_encoder, AudioCodec,
};
use crate::config::StreamingConfig;
use crate::media::MediaElement;
use crate::profile::{AdaptiveStreamingProfile, StreamType};
use crate::Result;

/// Build the transcoder argument list for one adaptive streaming run.
///
/// Returns `Ok(None)` when no command can be built — missing video
/// stream data, an unsupported client — which is an expected outcome,
/// not a failure. Out-of-range track indices are reported as
/// [`crate::Error::TrackNotFound`].
///
/// When `profile.segment_offset > 0` the input is seeked to the matching
/// time position and the segment muxer numbers files from that offset,
/// so on-disk naming stays aligned with playlist references.
pub fn build_adaptive_command(
    media: &MediaElement,
    profile: &AdaptiveStreamingProfile,
    config: &StreamingConfig,
) -> Result<Option<Vec<String>>> {
    let video = match &media.video {
        Some(video) => video,
        None => return Ok(None),
    };
    if video.codec.is_empty() || video.width == 0 || video.height == 0 {
        return Ok(None);
    }
    if !client_supported(&profile.base.client) {
        return Ok(None);
    }

    // Track validation happens before any argument is emitted
    let audio_selection = select_audio_track(media, profile.base.audio_track)?;
    let subtitle_selection = select_subtitle_track(media, profile.base.subtitle_track)?;

    let (width, height) =
        target_resolution(profile.base.video_quality, video.width, video.height);
    let seek_secs = profile.segment_offset * config.segment_duration + profile.base.offset_secs;

    let mut args: Vec<String> = vec!["-y".into()];

    if seek_secs > 0 {
        args.extend(["-ss".into(), seek_secs.to_string()]);
    }
    args.extend(["-i".into(), media.path.display().to_string()]);

    // Video: filter graph depends on whether subtitles are burned in
    match subtitle_selection {
        Some((index, stream)) if stream.format.is_text() => {
            let filter = text_subtitle_filter(&media.path, index, seek_secs);
            args.extend(["-map".into(), "0:v:0".into()]);
            args.extend(["-vf".into(), format!("{},scale={}:{}", filter, width, height)]);
        }
        Some((index, _)) => {
            args.extend([
                "-filter_complex".into(),
                picture_subtitle_filter(index, width, height),
            ]);
            args.extend(["-map".into(), "[vout]".into()]);
        }
        None => {
            args.extend(["-map".into(), "0:v:0".into()]);
            args.extend(["-vf".into(), format!("scale={}:{}", width, height)]);
        }
    }

    args.extend(["-c:v".into(), video_encoder(profile.stream_type).into()]);
    args.extend([
        "-b:v".into(),
        format!("{}k", profile.base.video_quality.video_bitrate_kbps()),
    ]);
    // Keyframe at every segment boundary so segment files cut cleanly
    args.extend([
        "-force_key_frames".into(),
        format!("expr:gte(t,n_forced*{})", config.segment_duration),
    ]);

    // Audio
    if media.audio_streams.is_empty() {
        args.push("-an".into());
    } else {
        let (index, stream) = match audio_selection {
            Some((index, stream)) => (index, stream),
            None => (0, &media.audio_streams[0]),
        };
        let codec = AudioCodec::for_stream_type(profile.stream_type);
        let downmix = stream.channels > config.max_channels && !profile.base.multichannel;

        args.extend(["-map".into(), format!("0:a:{}", index)]);
        args.extend(["-c:a".into(), codec.encoder().into()]);
        args.extend([
            "-b:a".into(),
            format!(
                "{}k",
                audio_bitrate_kbps(codec, profile.base.audio_quality, downmix)
            ),
        ]);
        if downmix {
            args.extend(["-ac".into(), config.max_channels.to_string()]);
        }
        if let Some(max_rate) = profile.base.max_sample_rate {
            if stream.sample_rate > max_rate {
                args.extend(["-ar".into(), max_rate.to_string()]);
            }
        }
    }

    // Segment muxer
    args.extend(["-f".into(), "segment".into()]);
    args.extend(["-segment_time".into(), config.segment_duration.to_string()]);
    args.extend([
        "-segment_start_number".into(),
        profile.segment_offset.to_string(),
    ]);
    args.extend([
        "-segment_format".into(),
        profile.stream_type.segment_format().into(),
    ]);
    if profile.stream_type == StreamType::DashMp4 {
        args.extend([
            "-segment_format_options".into(),
            "movflags=frag_keyframe+empty_moov".into(),
        ]);
    }
    args.extend(["-reset_timestamps".into(), "1".into()]);
    args.push(profile.segment_file_pattern().display().to_string());

    Ok(Some(args))
}
