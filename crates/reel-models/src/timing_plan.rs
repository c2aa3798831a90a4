//! Timed beats and the timing plan artifact.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::beat::{BeatId, CameraHint, MicrobeatId};

/// Schema name written into `timing_plan.json`.
pub const TIMING_PLAN_SCHEMA: &str = "reel.timing_plan";

/// Schema version written into `timing_plan.json`.
pub const TIMING_PLAN_VERSION: u32 = 4;

/// A beat (or microbeat) with a concrete slot on the render timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimedBeat {
    pub beat_id: BeatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microbeat_id: Option<MicrobeatId>,
    pub image_reference: String,
    pub start_time_seconds: f64,
    pub end_time_seconds: f64,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraHint>,
}

impl TimedBeat {
    pub fn new(
        beat_id: BeatId,
        image_reference: impl Into<String>,
        start_time_seconds: f64,
        end_time_seconds: f64,
    ) -> Self {
        Self {
            beat_id,
            microbeat_id: None,
            image_reference: image_reference.into(),
            start_time_seconds,
            end_time_seconds,
            duration_seconds: end_time_seconds - start_time_seconds,
            camera: None,
        }
    }

    /// Move the start and keep `duration_seconds` consistent.
    pub fn set_start(&mut self, start: f64) {
        self.start_time_seconds = start;
        self.duration_seconds = self.end_time_seconds - self.start_time_seconds;
    }

    /// Move the end and keep `duration_seconds` consistent.
    pub fn set_end(&mut self, end: f64) {
        self.end_time_seconds = end;
        self.duration_seconds = self.end_time_seconds - self.start_time_seconds;
    }

    /// Stable key used in file names and seeds, e.g. `b003` or `b003m1`.
    pub fn key(&self) -> String {
        match self.microbeat_id {
            Some(mb) => format!("b{:03}m{}", self.beat_id, mb),
            None => format!("b{:03}", self.beat_id),
        }
    }
}

/// The timing plan artifact (`timing_plan.json`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimingPlan {
    pub schema: String,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub full_duration_seconds: f64,
    pub total_beats: usize,
    pub beats: Vec<TimedBeat>,
}

impl TimingPlan {
    pub fn new(beats: Vec<TimedBeat>, full_duration_seconds: f64) -> Self {
        Self {
            schema: TIMING_PLAN_SCHEMA.to_string(),
            schema_version: TIMING_PLAN_VERSION,
            created_at: Utc::now(),
            full_duration_seconds,
            total_beats: beats.len(),
            beats,
        }
    }

    /// End of the last beat, i.e. the covered timeline length.
    pub fn covered_duration(&self) -> f64 {
        self.beats.last().map(|b| b.end_time_seconds).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_beat_duration_tracking() {
        let mut beat = TimedBeat::new(1, "a.png", 2.0, 5.0);
        assert!((beat.duration_seconds - 3.0).abs() < 1e-9);

        beat.set_end(4.0);
        assert!((beat.duration_seconds - 2.0).abs() < 1e-9);

        beat.set_start(0.0);
        assert!((beat.duration_seconds - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_key() {
        let mut beat = TimedBeat::new(3, "a.png", 0.0, 1.0);
        assert_eq!(beat.key(), "b003");
        beat.microbeat_id = Some(2);
        assert_eq!(beat.key(), "b003m2");
    }

    #[test]
    fn test_plan_metadata() {
        let plan = TimingPlan::new(
            vec![
                TimedBeat::new(0, "a.png", 0.0, 2.0),
                TimedBeat::new(1, "b.png", 2.0, 9.5),
            ],
            9.5,
        );
        assert_eq!(plan.schema, TIMING_PLAN_SCHEMA);
        assert_eq!(plan.total_beats, 2);
        assert!((plan.covered_duration() - 9.5).abs() < 1e-9);

        let json = serde_json::to_value(&plan).unwrap();
        assert!(json["beats"][0].get("microbeat_id").is_none());
    }
}
