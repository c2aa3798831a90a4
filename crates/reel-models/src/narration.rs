//! Narration timing produced by the speech aligner.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One contiguous interval of spoken audio (usually a sentence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationSpan {
    /// Ordinal position of the span within the narration track
    pub index: usize,
    /// Spoken text
    #[serde(default)]
    pub text: String,
    /// Start time in seconds
    #[serde(alias = "start")]
    pub start_time: f64,
    /// End time in seconds
    #[serde(alias = "end")]
    pub end_time: f64,
}

impl NarrationSpan {
    pub fn new(index: usize, text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            index,
            text: text.into(),
            start_time,
            end_time,
        }
    }

    /// Length of the span in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Word-level timestamp, used for burned-in captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// The narration timing artifact (`narration.json`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NarrationTiming {
    /// Narration audio file, relative to the run directory
    #[serde(default)]
    pub audio_file: Option<String>,

    /// Full duration of the narration audio, including any trailing
    /// non-speech tail
    pub full_duration_seconds: f64,

    /// Duration of the spoken part only. Falls back to the end of the
    /// last sentence when absent.
    #[serde(default)]
    pub spoken_duration_seconds: Option<f64>,

    /// Sentence spans in track order
    pub sentences: Vec<NarrationSpan>,

    /// Word timestamps (optional)
    #[serde(default)]
    pub words: Vec<NarrationWord>,
}

impl NarrationTiming {
    /// Duration of the spoken part of the track.
    pub fn spoken_duration(&self) -> f64 {
        self.spoken_duration_seconds.unwrap_or_else(|| {
            self.sentences
                .iter()
                .map(|s| s.end_time)
                .fold(0.0, f64::max)
        })
    }
}
