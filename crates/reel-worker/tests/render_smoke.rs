//! End-to-end render against a real ffmpeg.
//!
//! Run with `cargo test -p reel-worker -- --ignored`.

use std::path::Path;
use std::process::Command;

use reel_media::probe_media;
use reel_models::{Beat, Storyboard};
use reel_worker::{RenderPipeline, RunDir, WorkerConfig};
use tempfile::TempDir;

fn ffmpeg(args: &[&str]) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-v", "error"])
        .args(args)
        .status()
        .expect("ffmpeg should be installed");
    assert!(status.success(), "ffmpeg {:?} failed", args);
}

fn make_run(root: &Path) {
    std::fs::create_dir_all(root.join("img")).unwrap();
    std::fs::create_dir_all(root.join("vo")).unwrap();

    for (name, color) in [("b001.png", "gray"), ("b002.png", "darkred"), ("b003.jpg", "navy")] {
        let out = root.join("img").join(name);
        ffmpeg(&[
            "-f",
            "lavfi",
            "-i",
            &format!("color=c={}:s=640x960", color),
            "-frames:v",
            "1",
            out.to_str().unwrap(),
        ]);
    }
    let audio = root.join("vo/full.wav");
    ffmpeg(&[
        "-f",
        "lavfi",
        "-i",
        "sine=frequency=220:duration=6.5",
        audio.to_str().unwrap(),
    ]);

    std::fs::write(
        root.join("narration.json"),
        r#"{
            "audio_file": "vo/full.wav",
            "full_duration_seconds": 6.5,
            "sentences": [
                {"index": 0, "text": "Something moved.", "start": 0.0, "end": 2.0},
                {"index": 1, "text": "It was closer now.", "start": 2.0, "end": 4.0},
                {"index": 2, "text": "Do not turn around.", "start": 4.0, "end": 6.0}
            ],
            "words": [
                {"word": "Something", "start": 0.0, "end": 0.6},
                {"word": "moved.", "start": 0.6, "end": 1.4}
            ]
        }"#,
    )
    .unwrap();
    let storyboard = Storyboard {
        beats: vec![
            Beat::on_line(1, 0, "b001"),
            Beat::on_line(2, 1, "b002"),
            Beat::on_line(3, 2, "b003"),
        ],
    };
    std::fs::write(
        root.join("storyboard.json"),
        serde_json::to_string_pretty(&storyboard).unwrap(),
    )
    .unwrap();
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_render_matches_narration_length() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("smoke-run");
    make_run(&root);

    let mut config = WorkerConfig::default();
    config.render.width = 360;
    config.render.height = 640;
    config.render.music.enabled = false;
    config.render.grade.grain = 0.1;
    config.render.grade.vignette = true;

    let run = RunDir::open(&root).unwrap();
    let outcome = RenderPipeline::new(config).render(&run, None).await.unwrap();

    assert_eq!(outcome.segments, 3);
    assert_eq!(outcome.transitions.len(), 2);
    assert!(run.timing_plan_path().is_file());

    let info = probe_media(&outcome.output).await.unwrap();
    assert!(info.has_video && info.has_audio);
    assert_eq!((info.width, info.height), (Some(360), Some(640)));
    assert!((info.duration - 6.5).abs() <= 2.0 / 24.0, "duration {}", info.duration);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_missing_music_dir_falls_back_to_narration() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("music-run");
    make_run(&root);

    let mut config = WorkerConfig::default();
    config.render.width = 360;
    config.render.height = 640;
    config.music_dir = dir.path().join("no-music");

    let run = RunDir::open(&root).unwrap();
    let outcome = RenderPipeline::new(config).render(&run, None).await.unwrap();
    assert_eq!(outcome.music, None);
    assert!(outcome.output.is_file());
}
