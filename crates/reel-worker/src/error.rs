//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid render configuration: {0}")]
    RenderConfig(#[from] reel_models::ConfigError),

    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Invalid artifact {}: {message}", path.display())]
    InvalidArtifact { path: PathBuf, message: String },

    #[error("Image for beat {key} not found: {}", path.display())]
    MissingImage { key: String, path: PathBuf },

    #[error("No runs with narration.json and storyboard.json under {}", .0.display())]
    NoRuns(PathBuf),

    #[error("Timing error: {0}")]
    Timing(#[from] reel_timing::TimingError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_artifact(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidArtifact {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Bad inputs rather than a failed render step.
    pub fn is_input_error(&self) -> bool {
        match self {
            WorkerError::Config(_)
            | WorkerError::RenderConfig(_)
            | WorkerError::MissingArtifact(_)
            | WorkerError::InvalidArtifact { .. }
            | WorkerError::MissingImage { .. }
            | WorkerError::NoRuns(_) => true,
            WorkerError::Timing(e) => e.is_configuration(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors() {
        assert!(WorkerError::MissingArtifact(PathBuf::from("run/narration.json")).is_input_error());
        assert!(WorkerError::config("RENDER_FPS: not a number").is_input_error());
        let io = WorkerError::from(std::io::Error::other("disk"));
        assert!(!io.is_input_error());
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = WorkerError::MissingImage {
            key: "b004".to_string(),
            path: PathBuf::from("run/img/b004"),
        };
        assert_eq!(err.to_string(), "Image for beat b004 not found: run/img/b004");
    }
}
