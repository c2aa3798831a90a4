//! Stitch and compose planning working together, without ffmpeg.

use reel_media::{choose_transitions, plan_compose, plan_crossfade, FilterStage};
use reel_models::RenderConfig;

#[test]
fn test_stitched_track_longer_than_narration_is_trimmed() {
    let config = RenderConfig::default();
    let transitions = choose_transitions(&config.transition_pool(), 2, "run|segments|xfade");
    let stitch = plan_crossfade(&[4.0, 4.0, 4.0], 0.1, config.fps, &transitions).unwrap();
    assert!((stitch.total_duration - 11.8).abs() < 1e-9);

    let compose = plan_compose(&config, stitch.total_duration, 10.0, false, None);
    assert_eq!(compose.pad_seconds, 0.0);
    assert!(compose.graph.stages().any(|s| matches!(
        s,
        FilterStage::Trim { start: None, duration: Some(d) } if (*d - 10.0).abs() < 1e-12
    )));
    assert!(!compose
        .graph
        .stages()
        .any(|s| matches!(s, FilterStage::PadClone { .. })));
}

#[test]
fn test_short_stitched_track_is_padded_to_narration() {
    let config = RenderConfig::default();
    let x = config.crossfade_duration;
    let durations = [2.0, 3.0];
    let transitions = choose_transitions(&config.transition_pool(), 1, "pad");
    let stitch = plan_crossfade(&durations, x, config.fps, &transitions).unwrap();

    let target = 5.5;
    let compose = plan_compose(&config, stitch.total_duration, target, true, None);
    assert!((compose.pad_seconds - (target - (5.0 - x))).abs() < 1e-9);
    assert!(compose.with_music);
    assert!(compose.graph.to_ffmpeg().contains("amix=inputs=2"));
}

#[test]
fn test_every_transition_comes_from_the_pool() {
    let mut config = RenderConfig::default();
    config.enable_transitions = false;
    let transitions = choose_transitions(&config.transition_pool(), 9, "off");
    let stitch = plan_crossfade(&[1.0; 10], config.crossfade_duration, config.fps, &transitions).unwrap();

    assert_eq!(stitch.junctions.len(), 9);
    assert!(stitch
        .graph
        .to_ffmpeg()
        .split(';')
        .filter(|c| c.contains("xfade"))
        .all(|c| c.contains("transition=fade:")));
}
