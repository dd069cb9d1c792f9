//! Adaptive streaming orchestration.
//!
//! The [`AdaptiveStreamingService`] maps job IDs to running transcode
//! processes, decides when a running process can serve a request versus
//! when it must be restarted at a segment offset, generates playlists,
//! and keeps job accounting up to date. At most one process is ever
//! registered per job ID; an old process is always torn down before a
//! replacement is added.

mod delivery;
mod playlist;

pub use delivery::SegmentFile;

use crate::command::build_adaptive_command;
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::job::{JobStore, JobType};
use crate::media::{MediaElement, MediaElementType, MediaStore};
use crate::process::TranscodeProcess;
use crate::profile::{AdaptiveStreamingProfile, StreamType, TranscodeProfile};
use chrono::Utc;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Orchestrates adaptive streaming transcode jobs.
pub struct AdaptiveStreamingService {
    config: StreamingConfig,
    transcoder: PathBuf,
    media: Arc<dyn MediaStore>,
    jobs: Arc<dyn JobStore>,
    /// Active processes keyed by job ID.
    processes: DashMap<Uuid, Arc<TranscodeProcess>>,
    /// Streaming profile of each open job. Outlives the job's transcode
    /// process so manifests stay derivable after a teardown; entries are
    /// dropped when the job ends.
    profiles: DashMap<Uuid, AdaptiveStreamingProfile>,
    /// Serialises teardown-then-register sequences so two threads can
    /// never race to register two processes under the same job ID.
    registration: Mutex<()>,
}

impl AdaptiveStreamingService {
    /// Create a service. Validates the configuration and resolves the
    /// transcoder binary up front so a bad setup fails at startup, not
    /// mid-request.
    pub fn new(
        config: StreamingConfig,
        media: Arc<dyn MediaStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Result<Self> {
        config.validate()?;
        let transcoder = config.resolve_transcoder()?;
        Ok(Self {
            config,
            transcoder,
            media,
            jobs,
            processes: DashMap::new(),
            profiles: DashMap::new(),
            registration: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Start an adaptive stream for a media element.
    ///
    /// Creates the job record, builds the transcode command for segment
    /// offset zero, spawns the process and registers it. Returns the new
    /// job ID.
    pub async fn initialise(
        &self,
        username: &str,
        media_element: &MediaElement,
        profile: TranscodeProfile,
        stream_type: StreamType,
    ) -> Result<Uuid> {
        if media_element.element_type != MediaElementType::Video {
            return Err(Error::invalid_input(
                "adaptive streaming requires a video media element",
            ));
        }
        if media_element.duration_secs == 0 {
            return Err(Error::invalid_input("media element has no duration"));
        }

        let job = self
            .jobs
            .create(JobType::AdaptiveStream, username, media_element.id)
            .map_err(|e| match e {
                Error::JobCreationFailed(_) => e,
                other => Error::JobCreationFailed(other.to_string()),
            })?;

        let output_dir = self.config.stream_dir().join(job.id.to_string());
        let last_segment = media_element.duration_secs / self.config.segment_duration;
        let profile =
            AdaptiveStreamingProfile::new(profile, stream_type, output_dir, 0, last_segment);

        let args = build_adaptive_command(media_element, &profile, &self.config)?
            .ok_or(Error::CommandBuildFailed)?;

        let _guard = self.registration.lock().await;
        let process = TranscodeProcess::spawn(job.id, profile, &self.transcoder, &args).await?;
        self.profiles.insert(job.id, process.profile().clone());
        self.processes.insert(job.id, process);

        info!(
            job_id = %job.id,
            username = %username,
            media_element_id = %media_element.id,
            stream_type = ?stream_type,
            "Initialised adaptive stream"
        );
        Ok(job.id)
    }

    /// Restart a job's transcode from a segment offset.
    ///
    /// Used when a client requests a segment the running process has not
    /// reached. The existing process is fully torn down first, then a
    /// new one is started with the offset baked into its command so
    /// on-disk numbering restarts at `segment`.
    pub async fn start_process_with_offset(
        &self,
        job_id: Uuid,
        segment: u32,
    ) -> Result<Arc<TranscodeProcess>> {
        let _guard = self.registration.lock().await;

        let mut profile = self
            .processes
            .get(&job_id)
            .map(|p| p.profile().clone())
            .ok_or(Error::ProcessNotFound(job_id))?;

        self.remove_and_terminate(job_id).await;

        // The job may have been ended concurrently while we tore down
        let job = self.jobs.get(job_id).ok_or(Error::JobNotFound(job_id))?;
        if !job.is_active() {
            return Err(Error::JobNotFound(job_id));
        }
        let media = self
            .media
            .get(job.media_element_id)
            .ok_or(Error::MediaNotFound(job.media_element_id))?;

        profile.segment_offset = segment;
        profile.last_segment = media.duration_secs / self.config.segment_duration;

        let args = build_adaptive_command(&media, &profile, &self.config)?
            .ok_or(Error::CommandBuildFailed)?;

        let process = TranscodeProcess::spawn(job_id, profile, &self.transcoder, &args).await?;
        self.profiles.insert(job_id, process.profile().clone());
        self.processes.insert(job_id, Arc::clone(&process));

        info!(job_id = %job_id, segment = segment, "Restarted transcode at offset");
        Ok(process)
    }

    /// Terminate and deregister the process for a job, if any. Idempotent.
    pub async fn end_process(&self, job_id: Uuid) {
        let _guard = self.registration.lock().await;
        self.remove_and_terminate(job_id).await;
    }

    async fn remove_and_terminate(&self, job_id: Uuid) {
        if let Some((_, process)) = self.processes.remove(&job_id) {
            process.terminate().await;
        }
    }

    /// Look up the active process for a job.
    pub fn process_for_job(&self, job_id: Uuid) -> Option<Arc<TranscodeProcess>> {
        self.processes.get(&job_id).map(|p| Arc::clone(p.value()))
    }

    /// Streaming profile the job was initialised (or last restarted)
    /// with. Available for the whole life of the job, whether or not a
    /// process is currently running.
    pub fn streaming_profile(&self, job_id: Uuid) -> Option<AdaptiveStreamingProfile> {
        self.profiles.get(&job_id).map(|p| p.value().clone())
    }

    /// Number of registered transcode processes.
    pub fn active_process_count(&self) -> usize {
        self.processes.len()
    }

    /// End a job: close its record, tear down its process and drop its
    /// streaming profile.
    pub async fn end_job(&self, job_id: Uuid) {
        self.jobs.set_end_time(job_id);
        self.end_process(job_id).await;
        self.profiles.remove(&job_id);
    }

    /// Force-end any open job idle past the inactivity window.
    ///
    /// Returns the number of jobs ended.
    pub async fn reap_inactive_jobs(&self) -> usize {
        let cutoff = Utc::now() - self.config.inactivity_window();
        let mut reaped = 0;

        for job in self.jobs.active() {
            if job.last_activity < cutoff {
                warn!(
                    job_id = %job.id,
                    username = %job.username,
                    idle_secs = (Utc::now() - job.last_activity).num_seconds(),
                    "Reaping inactive job"
                );
                self.end_job(job.id).await;
                reaped += 1;
            }
        }
        reaped
    }

    /// End every open job and tear down every process. Called on server
    /// shutdown.
    pub async fn shutdown(&self) {
        for job in self.jobs.active() {
            self.jobs.set_end_time(job.id);
        }
        let job_ids: Vec<Uuid> = self.processes.iter().map(|e| *e.key()).collect();
        for job_id in job_ids {
            self.end_process(job_id).await;
        }
        self.profiles.clear();
        info!("Adaptive streaming service shut down");
    }
}

/// Periodically sweep for inactive jobs until the handle is aborted.
pub fn spawn_job_reaper(service: Arc<AdaptiveStreamingService>) -> JoinHandle<()> {
    let interval = service.config.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            service.reap_inactive_jobs().await;
        }
    })
}
