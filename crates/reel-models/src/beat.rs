//! Storyboard beats and their narration anchors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Beat identifier as assigned by the storyboard planner.
pub type BeatId = u32;

/// Microbeat identifier, unique within its parent beat.
pub type MicrobeatId = u32;

/// Narration span(s) a beat is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TimingScope {
    /// A single narration line
    Line { line_index: usize },
    /// An inclusive range of narration lines
    Range { start_line: usize, end_line: usize },
}

impl TimingScope {
    /// First referenced line.
    pub fn start_line(&self) -> usize {
        match *self {
            TimingScope::Line { line_index } => line_index,
            TimingScope::Range { start_line, .. } => start_line,
        }
    }

    /// Last referenced line (inclusive).
    pub fn end_line(&self) -> usize {
        match *self {
            TimingScope::Line { line_index } => line_index,
            TimingScope::Range { end_line, .. } => end_line,
        }
    }

    /// All referenced line indices.
    pub fn lines(&self) -> RangeInclusive<usize> {
        self.start_line()..=self.end_line()
    }

    pub fn contains(&self, line_index: usize) -> bool {
        self.lines().contains(&line_index)
    }
}

/// How much screen time a beat asks for relative to its neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttentionWeight {
    Light,
    #[default]
    Normal,
    Heavy,
}

impl AttentionWeight {
    pub const ALL: &'static [AttentionWeight] = &[
        AttentionWeight::Light,
        AttentionWeight::Normal,
        AttentionWeight::Heavy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionWeight::Light => "light",
            AttentionWeight::Normal => "normal",
            AttentionWeight::Heavy => "heavy",
        }
    }
}

impl fmt::Display for AttentionWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an attention weight.
#[derive(Debug, Error)]
#[error("Invalid attention weight: {0}")]
pub struct ParseAttentionWeightError(String);

impl FromStr for AttentionWeight {
    type Err = ParseAttentionWeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(AttentionWeight::Light),
            "normal" | "" => Ok(AttentionWeight::Normal),
            "heavy" => Ok(AttentionWeight::Heavy),
            other => Err(ParseAttentionWeightError(other.to_string())),
        }
    }
}

/// Camera distance requested by the storyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CameraDistance {
    Wide,
    Medium,
    Close,
}

/// Camera angle requested by the storyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CameraAngle {
    Level,
    Tilted,
    OffAxis,
}

/// Framing hint used to bias shot motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CameraHint {
    #[serde(default, alias = "camera_distance")]
    pub distance: Option<CameraDistance>,
    #[serde(default, alias = "camera_angle")]
    pub angle: Option<CameraAngle>,
}

/// A visual variation that subdivides its parent beat's time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Microbeat {
    pub microbeat_id: MicrobeatId,
    #[serde(alias = "image_file")]
    pub image_reference: String,
    /// Relative share of the parent interval (defaults to 1.0)
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub camera: Option<CameraHint>,
}

impl Microbeat {
    pub fn share(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// One unit of visual content anchored to narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Beat {
    pub beat_id: BeatId,
    pub timing_scope: TimingScope,
    #[serde(default)]
    pub attention_weight: AttentionWeight,
    #[serde(alias = "image_file")]
    pub image_reference: String,
    #[serde(default)]
    pub microbeats: Vec<Microbeat>,
    #[serde(default)]
    pub camera: Option<CameraHint>,
}

impl Beat {
    /// Beat anchored to a single narration line with normal weight.
    pub fn on_line(beat_id: BeatId, line_index: usize, image_reference: impl Into<String>) -> Self {
        Self {
            beat_id,
            timing_scope: TimingScope::Line { line_index },
            attention_weight: AttentionWeight::Normal,
            image_reference: image_reference.into(),
            microbeats: Vec::new(),
            camera: None,
        }
    }

    /// Beat anchored to an inclusive range of narration lines.
    pub fn on_lines(
        beat_id: BeatId,
        start_line: usize,
        end_line: usize,
        image_reference: impl Into<String>,
    ) -> Self {
        Self {
            timing_scope: TimingScope::Range {
                start_line,
                end_line,
            },
            ..Self::on_line(beat_id, start_line, image_reference)
        }
    }

    pub fn with_weight(mut self, weight: AttentionWeight) -> Self {
        self.attention_weight = weight;
        self
    }

    pub fn with_microbeats(mut self, microbeats: Vec<Microbeat>) -> Self {
        self.microbeats = microbeats;
        self
    }
}

/// The storyboard artifact (`storyboard.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Storyboard {
    pub beats: Vec<Beat>,
}
