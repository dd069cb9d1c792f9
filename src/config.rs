//! Streaming engine configuration.
//!
//! Loaded from a TOML file or built from defaults. Every field has a
//! default so an empty file is a valid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Root directory for server state. Segments are written under
    /// `<home_dir>/stream/<job id>/`.
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,

    /// Path to the transcoder binary. When unset, `ffmpeg` is looked up
    /// on PATH at startup.
    #[serde(default)]
    pub transcoder_path: Option<PathBuf>,

    /// Segment length in seconds.
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u32,

    /// Interval between availability checks while a request waits for a
    /// segment that is still being produced.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum total time a segment request may wait before giving up.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Jobs idle for longer than this are force-ended by the reaper.
    #[serde(default = "default_inactivity_secs")]
    pub inactivity_secs: u64,

    /// How often the job reaper sweeps active jobs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Channel count above which audio is downmixed unless the profile
    /// enables multichannel output.
    #[serde(default = "default_max_channels")]
    pub max_channels: u32,
}

fn default_home_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.vodcast").as_ref())
}
fn default_segment_duration() -> u32 {
    10
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_max_wait_secs() -> u64 {
    120
}
fn default_inactivity_secs() -> u64 {
    60 * 60
}
fn default_sweep_interval_secs() -> u64 {
    15 * 60
}
fn default_max_channels() -> u32 {
    2
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            transcoder_path: None,
            segment_duration: default_segment_duration(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
            inactivity_secs: default_inactivity_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_channels: default_max_channels(),
        }
    }
}

impl StreamingConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("failed to parse config: {e}")))
    }

    /// Resolve the transcoder binary, falling back to `ffmpeg` on PATH.
    pub fn resolve_transcoder(&self) -> Result<PathBuf> {
        match &self.transcoder_path {
            Some(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(Error::TranscoderNotFound(path.display().to_string()))
                }
            }
            None => which::which("ffmpeg")
                .map_err(|_| Error::TranscoderNotFound("ffmpeg".to_string())),
        }
    }

    /// Directory that holds per-job segment output directories.
    pub fn stream_dir(&self) -> PathBuf {
        self.home_dir.join("stream")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn inactivity_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.inactivity_secs as i64)
    }

    /// Check invariants that serde defaults cannot enforce. Run on load
    /// and again when a service is built from a hand-constructed config.
    pub fn validate(&self) -> Result<()> {
        if self.segment_duration == 0 {
            return Err(Error::config("segment_duration must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll_interval_ms must be > 0"));
        }
        Ok(())
    }
}
