//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress pipe:2` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the expected output duration in seconds.
    pub fn percentage(&self, expected_seconds: f64) -> f64 {
        if expected_seconds <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / expected_seconds) * 100.0).clamp(0.0, 100.0)
    }

    /// Update from one `key=value` progress line.
    ///
    /// Returns a snapshot at the end of each progress block.
    pub fn update(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // ffmpeg reports out_time_ms in microseconds as well
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }
}

/// Returns true for lines that belong to the `-progress` stream rather
/// than ffmpeg's own diagnostics.
pub(crate) fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame", "fps", "stream_", "bitrate", "total_size", "out_time", "dup_frames",
        "drop_frames", "speed", "progress",
    ];
    match line.split_once('=') {
        Some((key, _)) => KEYS.iter().any(|k| key.starts_with(k)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_block() {
        let mut progress = FfmpegProgress::default();

        assert!(progress.update("frame=48").is_none());
        assert!(progress.update("out_time_ms=2000000").is_none());
        assert!(progress.update("speed=1.5x").is_none());
        assert!(progress.update("speed=N/A").is_none());

        let snapshot = progress.update("progress=continue").unwrap();
        assert_eq!(snapshot.frame, 48);
        assert_eq!(snapshot.out_time_ms, 2000);
        assert!((snapshot.speed - 1.5).abs() < 0.01);
        assert!(!snapshot.is_complete);

        let snapshot = progress.update("progress=end").unwrap();
        assert!(snapshot.is_complete);
    }

    #[test]
    fn test_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert!((progress.percentage(10.0) - 50.0).abs() < 0.01);
        assert!((progress.percentage(2.0) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0.0), 0.0);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("out_time_us=100"));
        assert!(is_progress_line("progress=end"));
        assert!(!is_progress_line("[libx264 @ 0x1] using cpu capabilities"));
        assert!(!is_progress_line("Error while opening encoder"));
    }
}
