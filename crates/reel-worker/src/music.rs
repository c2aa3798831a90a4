//! Music bed discovery and selection.

use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use reel_media::seeded_rng;

pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg"];

fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MUSIC_EXTENSIONS.iter().any(|m| e.eq_ignore_ascii_case(m)))
        .unwrap_or(false)
}

/// Music files directly under `dir`, sorted by path.
///
/// A missing or unreadable directory yields an empty list.
pub async fn list_music(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Music directory not readable");
            return Vec::new();
        }
    };

    let mut tracks = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.is_file() && is_music_file(&path) {
                    tracks.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Stopped scanning music directory");
                break;
            }
        }
    }
    tracks.sort();
    debug!(dir = %dir.display(), tracks = tracks.len(), "Scanned music directory");
    tracks
}

/// Pick one track. Deterministic for a given seed and track list.
pub fn pick_music<'a>(tracks: &'a [PathBuf], seed: Option<&str>) -> Option<&'a PathBuf> {
    if tracks.is_empty() {
        return None;
    }
    let index = match seed {
        Some(seed) => seeded_rng(seed).random_range(0..tracks.len()),
        None => rand::rng().random_range(0..tracks.len()),
    };
    tracks.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_music_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp3", "a.WAV", "notes.txt", "c.ogg", "cover.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("old.mp3")).unwrap();

        let tracks = list_music(dir.path()).await;
        let names: Vec<_> = tracks
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.WAV", "b.mp3", "c.ogg"]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(list_music(&dir.path().join("nope")).await.is_empty());
    }

    #[test]
    fn test_pick_music() {
        let tracks: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("t{}.mp3", i))).collect();
        let a = pick_music(&tracks, Some("night-7"));
        assert_eq!(a, pick_music(&tracks, Some("night-7")));
        assert!(a.is_some());

        assert!(pick_music(&tracks, None).is_some());
        assert_eq!(pick_music(&[], Some("s")), None);
    }
}
