//! Error types for timeline allocation.

use reel_models::{BeatId, MicrobeatId};
use thiserror::Error;

/// Result type for timing operations.
pub type TimingResult<T> = Result<T, TimingError>;

/// Errors raised while turning narration spans and beats into a timeline.
#[derive(Debug, Error)]
pub enum TimingError {
    #[error("Narration span {index} has invalid bounds [{start}, {end}]")]
    InvalidSpan { index: usize, start: f64, end: f64 },

    #[error("Narration span index {index} appears more than once")]
    DuplicateSpanIndex { index: usize },

    #[error("Beat {beat_id} references narration line {line_index}, but only {span_count} spans exist")]
    UnknownSpan {
        beat_id: BeatId,
        line_index: usize,
        span_count: usize,
    },

    #[error("Beat {beat_id} has an inverted timing scope ({start_line} > {end_line})")]
    InvertedScope {
        beat_id: BeatId,
        start_line: usize,
        end_line: usize,
    },

    #[error("Beat id {beat_id} appears more than once in the storyboard")]
    DuplicateBeat { beat_id: BeatId },

    #[error("Narration span {index} is referenced by beats {beat_ids:?} with zero total weight")]
    ZeroWeight { index: usize, beat_ids: Vec<BeatId> },

    #[error("Beat {beat_id} microbeat {microbeat_id} has invalid weight {weight}")]
    InvalidMicrobeatWeight {
        beat_id: BeatId,
        microbeat_id: u32,
        weight: f64,
    },

    #[error("Storyboard has no beats")]
    EmptyStoryboard,

    #[error("Beat {beat_id} collapsed to [{start:.3}, {end:.3}] after clamping against its neighbour")]
    DegenerateBeat { beat_id: BeatId, start: f64, end: f64 },

    #[error(
        "Beat {beat_id} (microbeat {microbeat_id:?}) lasts {duration:.3}s, \
         not longer than the {min:.3}s minimum"
    )]
    TooShort {
        beat_id: BeatId,
        microbeat_id: Option<MicrobeatId>,
        duration: f64,
        min: f64,
    },

    #[error(
        "Beat timeline ends at {covered:.3}s but narration is spoken until {spoken:.3}s \
         (required {tolerance:.0}%): storyboard is missing script content"
    )]
    Coverage {
        covered: f64,
        spoken: f64,
        tolerance: f64,
    },
}

impl TimingError {
    /// Malformed or out-of-range input artifacts.
    pub fn is_configuration(&self) -> bool {
        !self.is_coverage()
    }

    /// The timeline does not reach the end of the spoken narration.
    pub fn is_coverage(&self) -> bool {
        matches!(self, TimingError::Coverage { .. })
    }

    pub(crate) fn coverage(covered: f64, spoken: f64, tolerance: f64) -> Self {
        Self::Coverage {
            covered,
            spoken,
            tolerance: tolerance * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = TimingError::EmptyStoryboard;
        assert!(err.is_configuration());
        assert!(!err.is_coverage());

        let err = TimingError::coverage(5.0, 9.0, 0.98);
        assert!(err.is_coverage());
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("98%"));
    }

    #[test]
    fn test_messages_carry_identifiers() {
        let err = TimingError::UnknownSpan {
            beat_id: 7,
            line_index: 12,
            span_count: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Beat 7"));
        assert!(msg.contains("12"));
    }
}
