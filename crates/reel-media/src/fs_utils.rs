//! Filesystem helpers for scratch directories and move-on-success outputs.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is tried first. On EXDEV the file is copied next to `dst`
/// and renamed into place, so `dst` never holds a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("partial");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Delete `dir` if present and create it empty.
pub async fn recreate_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

/// Temporary path next to `final_path` used while an output is produced.
///
/// Keeps the extension so ffmpeg can infer the container.
pub fn staging_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match final_path.extension() {
        Some(ext) => format!(".{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.partial", stem),
    };
    final_path.with_file_name(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> MediaResult<()> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> MediaResult<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.persist(&path).map_err(|e| MediaError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_to_subdirectory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("render").join("final.mp4");

        fs::write(&src, b"video").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.mp4");
        let dst = dir.path().join("final.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }

    #[tokio::test]
    async fn test_recreate_dir_clears_stale_files() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("tmp");
        fs::create_dir_all(&scratch).await.unwrap();
        fs::write(scratch.join("stale.mp4"), b"x").await.unwrap();

        recreate_dir(&scratch).await.unwrap();
        assert!(scratch.is_dir());
        assert!(!scratch.join("stale.mp4").exists());

        let fresh = dir.path().join("fresh");
        recreate_dir(&fresh).await.unwrap();
        assert!(fresh.is_dir());
    }

    #[test]
    fn test_staging_path_keeps_extension() {
        let path = staging_path(Path::new("/runs/a/render/final.mp4"));
        assert_eq!(path, Path::new("/runs/a/render/.final.partial.mp4"));
    }

    #[tokio::test]
    async fn test_write_json_atomic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/plan.json");
        write_json_atomic(&path, &serde_json::json!({"beats": 2})).await.unwrap();
        write_json_atomic(&path, &serde_json::json!({"beats": 3})).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["beats"], 3);
    }
}
