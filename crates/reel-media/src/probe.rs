//! Duration and stream probing via ffprobe.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

/// Measure the duration of a media file in seconds.
///
/// Read-only: ffprobe is invoked and nothing is written.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let stdout = run_ffprobe(path, &["-show_entries", "format=duration"]).await?;
    let duration = parse_duration(&stdout).map_err(|message| {
        MediaError::probe_failed(path, message, None)
    })?;
    debug!(path = %path.display(), duration, "Probed duration");
    Ok(duration)
}

/// Probe duration and stream layout.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();
    let stdout = run_ffprobe(path, &["-show_format", "-show_streams"]).await?;
    parse_media_info(&stdout).map_err(|message| MediaError::probe_failed(path, message, None))
}

async fn run_ffprobe(path: &Path, entries: &[&str]) -> MediaResult<Vec<u8>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-of", "json"])
        .args(entries)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::probe_failed(
            path,
            format!("ffprobe exited with {}", output.status),
            Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        ));
    }

    Ok(output.stdout)
}

/// Extract `format.duration` from ffprobe JSON.
pub fn parse_duration(json: &[u8]) -> Result<f64, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| format!("unparsable ffprobe output: {}", e))?;
    format_duration(&probe)
}

fn format_duration(probe: &FfprobeOutput) -> Result<f64, String> {
    let raw = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .ok_or_else(|| "ffprobe reported no duration".to_string())?;
    let duration: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration {:?}", raw))?;
    if !duration.is_finite() || duration < 0.0 {
        return Err(format!("invalid duration {}", duration));
    }
    Ok(duration)
}

/// Build [`MediaInfo`] from ffprobe JSON.
pub fn parse_media_info(json: &[u8]) -> Result<MediaInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| format!("unparsable ffprobe output: {}", e))?;
    let duration = format_duration(&probe)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        duration,
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        fps: video.and_then(|v| {
            v.avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| v.r_frame_rate.as_deref().and_then(parse_frame_rate))
        }),
        has_video: video.is_some(),
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den > 0.0).then(|| num / den);
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = br#"{"format": {"duration": "11.791667"}}"#;
        assert!((parse_duration(json).unwrap() - 11.791667).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_failures() {
        assert!(parse_duration(b"not json").is_err());
        assert!(parse_duration(br#"{"format": {}}"#).is_err());
        assert!(parse_duration(br#"{"format": {"duration": "N/A"}}"#).is_err());
    }

    #[test]
    fn test_parse_media_info() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "width": 1080, "height": 1920, "avg_frame_rate": "24/1"},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "10.000000"}
        }"#;
        let info = parse_media_info(json).unwrap();
        assert_eq!(info.width, Some(1080));
        assert_eq!(info.height, Some(1920));
        assert!((info.fps.unwrap() - 24.0).abs() < 1e-9);
        assert!(info.has_video && info.has_audio);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!((parse_frame_rate("25").unwrap() - 25.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_duration("/nonexistent/narration.wav").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
