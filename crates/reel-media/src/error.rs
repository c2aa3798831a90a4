//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing, rendering, stitching or composing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Probe failed for {path}: {message}")]
    ProbeFailed {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("Segment {segment} ({image}) failed to render: {message}")]
    RenderFailed {
        segment: usize,
        image: PathBuf,
        message: String,
    },

    #[error("Stitch failed: {message}")]
    StitchFailed { message: String },

    #[error("Compose failed: {message}")]
    ComposeFailed { message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        stderr: Option<String>,
    ) -> Self {
        Self::ProbeFailed {
            path: path.into(),
            message: message.into(),
            stderr,
        }
    }

    /// Create a segment render failure error.
    pub fn render_failed(
        segment: usize,
        image: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self::RenderFailed {
            segment,
            image: image.into(),
            message: message.into(),
        }
    }

    /// Create a stitch failure error.
    pub fn stitch_failed(message: impl Into<String>) -> Self {
        Self::StitchFailed {
            message: message.into(),
        }
    }

    /// Create a compose failure error.
    pub fn compose_failed(message: impl Into<String>) -> Self {
        Self::ComposeFailed {
            message: message.into(),
        }
    }

    /// Captured ffmpeg/ffprobe stderr, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. } | MediaError::ProbeFailed { stderr, .. } => {
                stderr.as_deref()
            }
            _ => None,
        }
    }
}
