//! Segment delivery protocol.
//!
//! The wait/poll contract between a segment request and the background
//! transcode: a request either returns the segment file, blocks until it
//! is produced, triggers a restart when the client has seeked ahead, or
//! reports end-of-stream when the process dies first.

use super::AdaptiveStreamingService;
use crate::error::{Error, Result};
use crate::profile::AdaptiveStreamingProfile;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// A segment file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub path: PathBuf,
    pub size: u64,
    /// Mime type of the segment container.
    pub mime_type: &'static str,
}

/// Whether a segment is ready to serve.
///
/// The transcoder writes segment files sequentially, so the appearance
/// of segment N+1 is the signal that segment N is fully flushed. The
/// last segment has no successor and is available on existence alone.
pub(crate) fn segment_available(profile: &AdaptiveStreamingProfile, segment: u32) -> bool {
    if !profile.segment_path(segment).is_file() {
        return false;
    }
    segment == profile.last_segment || profile.segment_path(segment + 1).is_file()
}

impl AdaptiveStreamingService {
    /// Retrieve a segment for a job, waiting for it to be produced.
    ///
    /// Returns `Ok(None)` when the transcode ends before the segment
    /// appears — the caller must treat that as end-of-stream, not an
    /// error. On success the served segment is recorded as the process's
    /// current segment and the file size is added to the job's byte
    /// count.
    pub async fn get_segment(&self, job_id: Uuid, segment: u32) -> Result<Option<SegmentFile>> {
        let job = self.jobs.get(job_id).ok_or(Error::JobNotFound(job_id))?;
        if !job.is_active() {
            return Err(Error::JobNotFound(job_id));
        }
        let mut process = self
            .process_for_job(job_id)
            .ok_or(Error::ProcessNotFound(job_id))?;

        if !segment_available(process.profile(), segment) {
            // In-order playback keeps waiting on the running process; a
            // seek restarts production at the requested segment. The
            // current/current+1 check is a heuristic: concurrent
            // prefetching clients can trip a spurious restart.
            let current = process.current_segment();
            let sequential = segment == current || segment == current + 1;
            if !sequential {
                debug!(
                    job_id = %job_id,
                    requested = segment,
                    current = current,
                    "Seek ahead of production, restarting at offset"
                );
                process = self
                    .start_process_with_offset(job_id, segment)
                    .await
                    .map_err(|e| Error::internal(format!("restart at segment failed: {e}")))?;
            }
        }

        let started = Instant::now();
        loop {
            if segment_available(process.profile(), segment) {
                break;
            }
            if process.has_ended() {
                debug!(job_id = %job_id, segment = segment, "Transcode ended before segment");
                return Ok(None);
            }
            if started.elapsed() >= self.config.max_wait() {
                return Err(Error::SegmentTimeout { job_id, segment });
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        let path = process.profile().segment_path(segment);
        let size = tokio::fs::metadata(&path).await?.len();

        process.set_current_segment(segment);
        self.jobs.add_bytes_transferred(job_id, size);
        self.jobs.touch(job_id);

        Ok(Some(SegmentFile {
            path,
            size,
            mime_type: process.profile().stream_type.segment_mime_type(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{test_media_element, test_service, test_service_with_transcoder};
    use super::*;
    use crate::job::JobStore;
    use crate::profile::{StreamType, TranscodeProfile};

    fn write_segment(dir: &std::path::Path, index: u32, bytes: &[u8]) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(format!("stream{:05}.ts", index)), bytes).unwrap();
    }

    /// A transcoder stand-in that ignores its arguments and stays alive,
    /// so the delivery wait loop sees a Running process.
    fn sleeping_transcoder(dir: &std::path::Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-transcoder.sh");
        std::fs::write(&path, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_availability_requires_successor() {
        let dir = tempfile::tempdir().unwrap();
        let profile = AdaptiveStreamingProfile::new(
            TranscodeProfile::new("chrome"),
            StreamType::Hls,
            dir.path().to_path_buf(),
            0,
            5,
        );
        for index in 0..=2 {
            write_segment(dir.path(), index, b"data");
        }

        // Segment 1 is complete because 2 exists; 2 is still being written
        assert!(segment_available(&profile, 0));
        assert!(segment_available(&profile, 1));
        assert!(!segment_available(&profile, 2));
        assert!(!segment_available(&profile, 3));
    }

    #[test]
    fn test_last_segment_available_on_existence() {
        let dir = tempfile::tempdir().unwrap();
        let profile = AdaptiveStreamingProfile::new(
            TranscodeProfile::new("chrome"),
            StreamType::Hls,
            dir.path().to_path_buf(),
            0,
            2,
        );
        for index in 0..=2 {
            write_segment(dir.path(), index, b"data");
        }
        assert!(segment_available(&profile, 2));
    }

    #[tokio::test]
    async fn test_get_segment_returns_ready_file_and_accounts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (service, media_store, jobs) = test_service(dir.path());
        let media = test_media_element(95);
        media_store.insert(media.clone());

        let job_id = service
            .initialise("alice", &media, TranscodeProfile::new("chrome"), StreamType::Hls)
            .await
            .unwrap();
        let out_dir = service
            .process_for_job(job_id)
            .unwrap()
            .profile()
            .output_dir
            .clone();
        write_segment(&out_dir, 0, b"segment-zero");
        write_segment(&out_dir, 1, b"segment-one!");

        let file = service.get_segment(job_id, 0).await.unwrap().unwrap();
        assert_eq!(file.size, 12);
        assert_eq!(file.mime_type, "video/mp2t");
        assert_eq!(file.path, out_dir.join("stream00000.ts"));

        let job = jobs.get(job_id).unwrap();
        assert_eq!(job.bytes_transferred, 12);
        assert_eq!(
            service.process_for_job(job_id).unwrap().current_segment(),
            0
        );

        service.end_process(job_id).await;
    }

    #[tokio::test]
    async fn test_sequential_request_waits_instead_of_restarting() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = sleeping_transcoder(dir.path());
        let (service, media_store, _) = test_service_with_transcoder(dir.path(), transcoder);
        let media = test_media_element(95);
        media_store.insert(media.clone());

        let job_id = service
            .initialise("alice", &media, TranscodeProfile::new("chrome"), StreamType::Hls)
            .await
            .unwrap();
        let out_dir = service
            .process_for_job(job_id)
            .unwrap()
            .profile()
            .output_dir
            .clone();

        // Segment 1 is current+1 with current == 0: must not restart
        let waiter = {
            let service = std::sync::Arc::clone(&service);
            tokio::spawn(async move { service.get_segment(job_id, 1).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        write_segment(&out_dir, 1, b"one");
        write_segment(&out_dir, 2, b"two");

        let file = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(file.path, out_dir.join("stream00001.ts"));
        // No restart happened: offset is still zero
        assert_eq!(
            service
                .process_for_job(job_id)
                .unwrap()
                .profile()
                .segment_offset,
            0
        );

        service.end_process(job_id).await;
    }

    #[tokio::test]
    async fn test_seek_ahead_triggers_restart_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = sleeping_transcoder(dir.path());
        let (service, media_store, _) = test_service_with_transcoder(dir.path(), transcoder);
        let media = test_media_element(95);
        media_store.insert(media.clone());

        let job_id = service
            .initialise("alice", &media, TranscodeProfile::new("chrome"), StreamType::Hls)
            .await
            .unwrap();
        let out_dir = service
            .process_for_job(job_id)
            .unwrap()
            .profile()
            .output_dir
            .clone();

        // Current segment is 0; requesting 9 is a seek
        let waiter = {
            let service = std::sync::Arc::clone(&service);
            tokio::spawn(async move { service.get_segment(job_id, 9).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        // 9 is the last segment of a 95s element: exists => available
        write_segment(&out_dir, 9, b"tail!");

        let file = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(file.path, out_dir.join("stream00009.ts"));

        let process = service.process_for_job(job_id).unwrap();
        assert_eq!(process.profile().segment_offset, 9);
        assert_eq!(process.current_segment(), 9);
        assert_eq!(service.active_process_count(), 1);

        service.end_process(job_id).await;
    }

    #[tokio::test]
    async fn test_end_of_stream_when_process_dies_first() {
        let dir = tempfile::tempdir().unwrap();
        let (service, media_store, _) = test_service(dir.path());
        let media = test_media_element(95);
        media_store.insert(media.clone());

        let job_id = service
            .initialise("alice", &media, TranscodeProfile::new("chrome"), StreamType::Hls)
            .await
            .unwrap();

        // Kill the transcode; the pending wait must resolve to NoContent
        service
            .process_for_job(job_id)
            .unwrap()
            .terminate()
            .await;

        let result = service.get_segment(job_id, 0).await.unwrap();
        assert!(result.is_none());

        service.end_process(job_id).await;
    }

    #[tokio::test]
    async fn test_wait_gives_up_after_max_wait() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = sleeping_transcoder(dir.path());
        let (service, media_store, _) = test_service_with_transcoder(dir.path(), transcoder);
        let media = test_media_element(95);
        media_store.insert(media.clone());

        let job_id = service
            .initialise("alice", &media, TranscodeProfile::new("chrome"), StreamType::Hls)
            .await
            .unwrap();

        // Process stays alive but never produces the segment
        let result = service.get_segment(job_id, 0).await;
        assert!(matches!(
            result,
            Err(Error::SegmentTimeout { segment: 0, .. })
        ));

        service.end_process(job_id).await;
    }

    #[tokio::test]
    async fn test_unknown_job_and_process_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (service, media_store, jobs) = test_service(dir.path());
        let media = test_media_element(95);
        media_store.insert(media.clone());

        let result = service.get_segment(Uuid::new_v4(), 0).await;
        assert!(matches!(result, Err(Error::JobNotFound(_))));

        // A job without a registered process is also a request error
        let job = jobs
            .create(crate::job::JobType::AdaptiveStream, "alice", media.id)
            .unwrap();
        let result = service.get_segment(job.id, 0).await;
        assert!(matches!(result, Err(Error::ProcessNotFound(_))));
    }
}
