//! Run directory layout and artifact I/O.
//!
//! ```text
//! <run>/narration.json     NarrationTiming
//! <run>/storyboard.json    Storyboard
//! <run>/img/               beat stills
//! <run>/timing_plan.json   written by `plan` and `render`
//! <run>/render/final.mp4
//! <run>/render/tmp/        scratch, recreated per attempt
//! ```

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use reel_media::{recreate_dir, write_json_atomic};
use reel_models::{NarrationTiming, Storyboard, TimingPlan};

use crate::error::{WorkerError, WorkerResult};

pub const NARRATION_FILE: &str = "narration.json";
pub const STORYBOARD_FILE: &str = "storyboard.json";
pub const TIMING_PLAN_FILE: &str = "timing_plan.json";
pub const IMAGES_DIR: &str = "img";
pub const RENDER_DIR: &str = "render";
pub const SCRATCH_DIR: &str = "tmp";
pub const FINAL_FILE: &str = "final.mp4";

/// Narration audio used when the artifact does not name one.
pub const DEFAULT_AUDIO_FILE: &str = "vo/full.wav";

/// Extensions tried, in order, for an image reference without one.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// One run's working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    root: PathBuf,
    id: String,
}

impl RunDir {
    /// Open an existing run directory.
    pub fn open(root: impl Into<PathBuf>) -> WorkerResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WorkerError::MissingArtifact(root));
        }
        let id = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string());
        Ok(Self { root, id })
    }

    /// Most recently modified run under `runs_dir` that has both input
    /// artifacts.
    pub async fn latest(runs_dir: &Path) -> WorkerResult<Self> {
        let mut entries = tokio::fs::read_dir(runs_dir)
            .await
            .map_err(|_| WorkerError::NoRuns(runs_dir.to_path_buf()))?;

        let mut best: Option<(SystemTime, PathBuf)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir()
                || !path.join(NARRATION_FILE).is_file()
                || !path.join(STORYBOARD_FILE).is_file()
            {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if best.as_ref().map_or(true, |(t, _)| modified > *t) {
                best = Some((modified, path));
            }
        }

        let (_, path) = best.ok_or_else(|| WorkerError::NoRuns(runs_dir.to_path_buf()))?;
        debug!(run = %path.display(), "Selected latest run");
        Self::open(path)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn narration_path(&self) -> PathBuf {
        self.root.join(NARRATION_FILE)
    }

    pub fn storyboard_path(&self) -> PathBuf {
        self.root.join(STORYBOARD_FILE)
    }

    pub fn timing_plan_path(&self) -> PathBuf {
        self.root.join(TIMING_PLAN_FILE)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    pub fn render_dir(&self) -> PathBuf {
        self.root.join(RENDER_DIR)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.render_dir().join(SCRATCH_DIR)
    }

    pub fn final_path(&self) -> PathBuf {
        self.render_dir().join(FINAL_FILE)
    }

    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.scratch_dir().join(format!("segment_{:03}.mp4", index))
    }

    pub fn stitched_path(&self) -> PathBuf {
        self.scratch_dir().join("stitched.mp4")
    }

    pub fn captions_path(&self) -> PathBuf {
        self.scratch_dir().join("captions.ass")
    }

    pub async fn load_narration(&self) -> WorkerResult<NarrationTiming> {
        let path = self.narration_path();
        let narration: NarrationTiming = read_artifact(&path).await?;
        if !(narration.full_duration_seconds >= 0.0) {
            return Err(WorkerError::invalid_artifact(
                path,
                format!(
                    "full_duration_seconds must be >= 0, got {}",
                    narration.full_duration_seconds
                ),
            ));
        }
        if narration.sentences.is_empty() {
            return Err(WorkerError::invalid_artifact(path, "no sentences"));
        }
        Ok(narration)
    }

    pub async fn load_storyboard(&self) -> WorkerResult<Storyboard> {
        read_artifact(&self.storyboard_path()).await
    }

    /// Narration audio named by the artifact, relative to the run root.
    pub fn audio_path(&self, narration: &NarrationTiming) -> WorkerResult<PathBuf> {
        let relative = narration.audio_file.as_deref().unwrap_or(DEFAULT_AUDIO_FILE);
        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(WorkerError::MissingArtifact(path));
        }
        Ok(path)
    }

    /// Resolve an image reference under `img/`.
    ///
    /// A reference without an extension tries [`IMAGE_EXTENSIONS`] in order.
    pub fn resolve_image(&self, reference: &str, key: &str) -> WorkerResult<PathBuf> {
        let base = self.images_dir().join(reference);
        if base.extension().is_some() {
            if base.is_file() {
                return Ok(base);
            }
        } else {
            for ext in IMAGE_EXTENSIONS {
                let candidate = base.with_extension(ext);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(WorkerError::MissingImage {
            key: key.to_string(),
            path: base,
        })
    }

    /// Create `render/` and start from an empty scratch directory.
    pub async fn prepare_render_dirs(&self) -> WorkerResult<()> {
        tokio::fs::create_dir_all(self.render_dir()).await?;
        recreate_dir(self.scratch_dir()).await?;
        Ok(())
    }

    pub async fn write_timing_plan(&self, plan: &TimingPlan) -> WorkerResult<PathBuf> {
        let path = self.timing_plan_path();
        write_json_atomic(&path, plan).await?;
        info!(
            run_id = %self.id,
            path = %path.display(),
            beats = plan.total_beats,
            "Wrote timing plan"
        );
        Ok(path)
    }
}

async fn read_artifact<T: DeserializeOwned>(path: &Path) -> WorkerResult<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WorkerError::MissingArtifact(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes).map_err(|e| WorkerError::invalid_artifact(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NARRATION: &str = r#"{
        "audio_file": "vo/full.wav",
        "full_duration_seconds": 9.5,
        "sentences": [
            {"index": 0, "text": "It knocked.", "start": 0.0, "end": 4.0},
            {"index": 1, "text": "Twice.", "start": 4.0, "end": 9.0}
        ]
    }"#;

    const STORYBOARD: &str = r#"{
        "beats": [
            {"beat_id": 1, "timing_scope": {"line_index": 0}, "image_reference": "b001"},
            {"beat_id": 2, "timing_scope": {"line_index": 1}, "image_reference": "b002.jpg"}
        ]
    }"#;

    fn run_fixture() -> (TempDir, RunDir) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("run-1");
        std::fs::create_dir_all(root.join("img")).unwrap();
        std::fs::write(root.join(NARRATION_FILE), NARRATION).unwrap();
        std::fs::write(root.join(STORYBOARD_FILE), STORYBOARD).unwrap();
        let run = RunDir::open(&root).unwrap();
        (dir, run)
    }

    #[tokio::test]
    async fn test_load_artifacts() {
        let (_dir, run) = run_fixture();
        assert_eq!(run.id(), "run-1");

        let narration = run.load_narration().await.unwrap();
        assert_eq!(narration.sentences.len(), 2);
        assert_eq!(narration.full_duration_seconds, 9.5);

        let storyboard = run.load_storyboard().await.unwrap();
        assert_eq!(storyboard.beats.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_artifacts() {
        let (_dir, run) = run_fixture();
        std::fs::remove_file(run.storyboard_path()).unwrap();
        assert!(matches!(
            run.load_storyboard().await,
            Err(WorkerError::MissingArtifact(_))
        ));

        std::fs::write(run.narration_path(), "{\"sentences\": 3}").unwrap();
        assert!(matches!(
            run.load_narration().await,
            Err(WorkerError::InvalidArtifact { .. })
        ));
    }

    #[test]
    fn test_resolve_image_extension_order() {
        let (_dir, run) = run_fixture();
        let img = run.images_dir();
        std::fs::write(img.join("b001.jpg"), b"jpg").unwrap();
        std::fs::write(img.join("b001.webp"), b"webp").unwrap();
        assert_eq!(run.resolve_image("b001", "b001").unwrap(), img.join("b001.jpg"));

        std::fs::write(img.join("b001.png"), b"png").unwrap();
        assert_eq!(run.resolve_image("b001", "b001").unwrap(), img.join("b001.png"));
    }

    #[test]
    fn test_resolve_image_explicit_extension() {
        let (_dir, run) = run_fixture();
        let img = run.images_dir();
        std::fs::write(img.join("b002.png"), b"png").unwrap();

        let err = run.resolve_image("b002.jpg", "b002").unwrap_err();
        assert!(matches!(err, WorkerError::MissingImage { ref key, .. } if key == "b002"));
    }

    #[test]
    fn test_audio_path() {
        let (_dir, run) = run_fixture();
        let narration: NarrationTiming = serde_json::from_str(NARRATION).unwrap();
        assert!(matches!(
            run.audio_path(&narration),
            Err(WorkerError::MissingArtifact(_))
        ));

        std::fs::create_dir_all(run.root().join("vo")).unwrap();
        std::fs::write(run.root().join("vo/full.wav"), b"RIFF").unwrap();
        assert_eq!(
            run.audio_path(&narration).unwrap(),
            run.root().join("vo/full.wav")
        );
    }

    #[tokio::test]
    async fn test_latest_run_requires_both_artifacts() {
        let (dir, run) = run_fixture();
        std::fs::create_dir_all(dir.path().join("incomplete")).unwrap();
        std::fs::write(dir.path().join("incomplete").join(NARRATION_FILE), NARRATION).unwrap();

        let latest = RunDir::latest(dir.path()).await.unwrap();
        assert_eq!(latest, run);

        let empty = TempDir::new().unwrap();
        assert!(matches!(
            RunDir::latest(empty.path()).await,
            Err(WorkerError::NoRuns(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_render_dirs_clears_scratch() {
        let (_dir, run) = run_fixture();
        run.prepare_render_dirs().await.unwrap();
        std::fs::write(run.segment_path(0), b"stale").unwrap();

        run.prepare_render_dirs().await.unwrap();
        assert!(run.scratch_dir().is_dir());
        assert!(!run.segment_path(0).exists());
    }
}
