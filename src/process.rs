//! Transcode process supervision.
//!
//! Wraps one spawned transcoder subprocess. The process's diagnostic
//! output (stderr) is drained by a background task for the whole process
//! lifetime — an unconsumed pipe would eventually block the subprocess
//! and stall segment production. Pipe EOF doubles as the exit signal:
//! when the drain task sees the stream close, the process is marked
//! ended.

use crate::error::Result;
use crate::profile::AdaptiveStreamingProfile;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Lifecycle of a transcode process. Transitions only move forward:
/// `Starting -> Running -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessState {
    Starting = 0,
    Running = 1,
    Ended = 2,
}

impl ProcessState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            _ => Self::Ended,
        }
    }
}

/// One running (or finished) transcoder subprocess for a job.
pub struct TranscodeProcess {
    job_id: Uuid,
    profile: AdaptiveStreamingProfile,
    child: Mutex<Child>,
    drain_task: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    /// Last segment index a client requested from this process; used as
    /// the seek-ahead heuristic by segment delivery.
    current_segment: AtomicU32,
}

impl TranscodeProcess {
    /// Spawn the transcoder and start draining its diagnostic output.
    ///
    /// The output directory is created if missing. The returned process
    /// is in the `Running` state.
    pub async fn spawn(
        job_id: Uuid,
        profile: AdaptiveStreamingProfile,
        transcoder: &Path,
        args: &[String],
    ) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&profile.output_dir).await?;

        let mut child = Command::new(transcoder)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stderr = child.stderr.take();

        let process = Arc::new(Self {
            job_id,
            current_segment: AtomicU32::new(profile.segment_offset),
            profile,
            child: Mutex::new(child),
            drain_task: Mutex::new(None),
            state: AtomicU8::new(ProcessState::Starting as u8),
        });

        if let Some(stderr) = stderr {
            let handle = tokio::spawn(Self::drain_stderr(Arc::clone(&process), stderr));
            *process.drain_task.lock().await = Some(handle);
        }
        process.state.store(ProcessState::Running as u8, Ordering::SeqCst);

        info!(
            job_id = %job_id,
            segment_offset = process.profile.segment_offset,
            "Started transcode process"
        );
        Ok(process)
    }

    /// Consume stderr lines until the pipe closes, then mark the process
    /// ended. Exits only when the subprocess does.
    async fn drain_stderr(process: Arc<Self>, stderr: tokio::process::ChildStderr) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "transcoder", job_id = %process.job_id, "{}", line);
        }
        process
            .state
            .store(ProcessState::Ended as u8, Ordering::SeqCst);
        debug!(job_id = %process.job_id, "Transcoder diagnostic stream closed");
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn profile(&self) -> &AdaptiveStreamingProfile {
        &self.profile
    }

    pub fn state(&self) -> ProcessState {
        ProcessState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the subprocess has exited or been terminated.
    pub fn has_ended(&self) -> bool {
        self.state() == ProcessState::Ended
    }

    /// Last segment index recorded as requested from this process.
    pub fn current_segment(&self) -> u32 {
        self.current_segment.load(Ordering::SeqCst)
    }

    /// Record that a client was served the given segment.
    pub fn set_current_segment(&self, segment: u32) {
        self.current_segment.store(segment, Ordering::SeqCst);
    }

    /// Kill the subprocess and wait for the drain task to finish.
    ///
    /// Safe to call repeatedly and safe to call on a subprocess that has
    /// already exited; killing a dead handle is not an error.
    pub async fn terminate(&self) {
        self.state
            .store(ProcessState::Ended as u8, Ordering::SeqCst);

        {
            let mut child = self.child.lock().await;
            if let Err(e) = child.start_kill() {
                // Already exited
                debug!(job_id = %self.job_id, error = %e, "Kill on finished process");
            }
            let _ = child.wait().await;
        }

        let drain = self.drain_task.lock().await.take();
        if let Some(handle) = drain {
            let _ = handle.await;
        }

        info!(job_id = %self.job_id, "Terminated transcode process");
    }
}

impl std::fmt::Debug for TranscodeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscodeProcess")
            .field("job_id", &self.job_id)
            .field("state", &self.state())
            .field("current_segment", &self.current_segment())
            .field("segment_offset", &self.profile.segment_offset)
            .finish()
    }
}
