//! Common error types used throughout vodcast.
//!
//! Covers the failure cases of the streaming core: missing jobs, media
//! elements or processes, command-building failures, and I/O errors from
//! the transcoder and the segment directory.

use uuid::Uuid;

/// Which kind of stream a track index referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Subtitle,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Common error type for vodcast.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No job exists with the given ID, or it has already been ended.
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// No media element exists with the given ID.
    #[error("Media element not found: {0}")]
    MediaNotFound(Uuid),

    /// No transcode process is registered for the given job.
    #[error("No transcode process registered for job {0}")]
    ProcessNotFound(Uuid),

    /// A requested audio/subtitle track index is out of range.
    #[error("{kind} track {index} not found ({available} available)")]
    TrackNotFound {
        kind: TrackKind,
        index: usize,
        available: usize,
    },

    /// The job store refused to create a job record.
    #[error("Failed to create job: {0}")]
    JobCreationFailed(String),

    /// No transcode command could be built for the media/profile pair.
    #[error("Could not build a transcode command")]
    CommandBuildFailed,

    /// The external transcoder binary could not be located.
    #[error("Transcoder not found: {0}")]
    TranscoderNotFound(String),

    /// Waited longer than the configured maximum for a segment to appear.
    #[error("Timed out waiting for segment {segment} of job {job_id}")]
    SegmentTimeout { job_id: Uuid, segment: u32 },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();

        let err = Error::JobNotFound(id);
        assert!(err.to_string().starts_with("Job not found"));

        let err = Error::TrackNotFound {
            kind: TrackKind::Audio,
            index: 5,
            available: 2,
        };
        assert_eq!(err.to_string(), "audio track 5 not found (2 available)");

        let err = Error::CommandBuildFailed;
        assert_eq!(err.to_string(), "Could not build a transcode command");

        let err = Error::invalid_input("bad stream type");
        assert_eq!(err.to_string(), "Invalid input: bad stream type");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(
            Error::invalid_input("x"),
            Error::InvalidInput(_)
        ));
        assert!(matches!(Error::internal("x"), Error::Internal(_)));
        assert!(matches!(Error::config("x"), Error::Config(_)));
    }
}
