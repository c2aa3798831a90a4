//! Weighted beat timeline allocation.
//!
//! Each narration span is shared between the beats that reference it in
//! proportion to their attention weights. A beat that spans several lines
//! ends up with the union of its fragments. The resulting intervals are
//! sorted, made contiguous starting at zero, checked against the spoken
//! duration, and the last one is stretched over any trailing audio.

use std::collections::{HashMap, HashSet};

use reel_models::{
    AttentionWeights, Beat, BeatId, NarrationSpan, NarrationTiming, RenderConfig, Storyboard,
    TimedBeat, TimingPlan,
};
use tracing::{debug, info};

use crate::error::{TimingError, TimingResult};

/// Default fraction of the spoken duration the timeline must reach.
pub const DEFAULT_COVERAGE_TOLERANCE: f64 = 0.98;

/// Aggregated interval for one beat across every span fragment it touched.
#[derive(Debug, Clone, Copy)]
struct Interval {
    beat: usize,
    start: f64,
    end: f64,
}

/// Computes gap-free beat timelines from narration timestamps.
#[derive(Debug, Clone)]
pub struct TimelineAllocator {
    weights: AttentionWeights,
    coverage_tolerance: f64,
    /// Every timed beat must last strictly longer than this
    min_duration: f64,
}

impl Default for TimelineAllocator {
    fn default() -> Self {
        Self::new(AttentionWeights::default(), DEFAULT_COVERAGE_TOLERANCE)
    }
}

impl TimelineAllocator {
    pub fn new(weights: AttentionWeights, coverage_tolerance: f64) -> Self {
        Self {
            weights,
            coverage_tolerance,
            min_duration: 0.0,
        }
    }

    /// Beats no longer than the crossfade cannot be stitched, so they are
    /// rejected here rather than after every segment has rendered.
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.weights, config.coverage_tolerance)
            .with_min_duration(config.crossfade_duration)
    }

    pub fn with_min_duration(mut self, seconds: f64) -> Self {
        self.min_duration = seconds.max(0.0);
        self
    }

    /// Allocate beats over the given spans.
    ///
    /// The spoken duration used for the coverage check is the end of the
    /// latest span.
    pub fn allocate(
        &self,
        spans: &[NarrationSpan],
        beats: &[Beat],
        full_audio_duration: f64,
    ) -> TimingResult<Vec<TimedBeat>> {
        let spoken = spans.iter().map(|s| s.end_time).fold(0.0, f64::max);
        self.allocate_with_spoken(spans, beats, full_audio_duration, spoken)
    }

    /// Allocate beats, checking coverage against an explicit spoken duration.
    pub fn allocate_with_spoken(
        &self,
        spans: &[NarrationSpan],
        beats: &[Beat],
        full_audio_duration: f64,
        spoken_duration: f64,
    ) -> TimingResult<Vec<TimedBeat>> {
        let span_positions = index_spans(spans)?;
        self.validate_beats(beats, &span_positions, spans.len())?;

        let mut intervals = self.distribute(spans, beats)?;
        intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        make_contiguous(&mut intervals, beats)?;

        let covered = intervals.last().map(|iv| iv.end).unwrap_or(0.0);
        let required = self.coverage_tolerance * spoken_duration;
        if covered < required {
            return Err(TimingError::coverage(
                covered,
                spoken_duration,
                self.coverage_tolerance,
            ));
        }

        if let Some(last) = intervals.last_mut() {
            if full_audio_duration > last.end {
                debug!(
                    beat_id = beats[last.beat].beat_id,
                    from = last.end,
                    to = full_audio_duration,
                    "Extending last beat over audio tail"
                );
                last.end = full_audio_duration;
            }
        }

        let timed = expand_microbeats(&intervals, beats)?;
        if self.min_duration > 0.0 && timed.len() > 1 {
            if let Some(short) = timed
                .iter()
                .find(|tb| tb.duration_seconds <= self.min_duration)
            {
                return Err(TimingError::TooShort {
                    beat_id: short.beat_id,
                    microbeat_id: short.microbeat_id,
                    duration: short.duration_seconds,
                    min: self.min_duration,
                });
            }
        }

        info!(
            beats = beats.len(),
            timed_beats = timed.len(),
            covered = timed.last().map(|b| b.end_time_seconds).unwrap_or(0.0),
            "Allocated beat timeline"
        );

        Ok(timed)
    }

    /// Build the timing plan artifact for a narration track and storyboard.
    pub fn plan(
        &self,
        narration: &NarrationTiming,
        storyboard: &Storyboard,
    ) -> TimingResult<TimingPlan> {
        self.plan_for_audio(narration, storyboard, narration.full_duration_seconds)
    }

    /// Like [`plan`](Self::plan) but with a measured audio duration, which
    /// takes precedence over the one recorded by the aligner.
    pub fn plan_for_audio(
        &self,
        narration: &NarrationTiming,
        storyboard: &Storyboard,
        full_audio_duration: f64,
    ) -> TimingResult<TimingPlan> {
        let beats = self.allocate_with_spoken(
            &narration.sentences,
            &storyboard.beats,
            full_audio_duration,
            narration.spoken_duration(),
        )?;
        let full = beats
            .last()
            .map(|b| b.end_time_seconds)
            .unwrap_or(0.0)
            .max(full_audio_duration);
        Ok(TimingPlan::new(beats, full))
    }

    fn validate_beats(
        &self,
        beats: &[Beat],
        span_positions: &HashMap<usize, usize>,
        span_count: usize,
    ) -> TimingResult<()> {
        if beats.is_empty() {
            return Err(TimingError::EmptyStoryboard);
        }

        let mut seen = HashSet::with_capacity(beats.len());
        for beat in beats {
            if !seen.insert(beat.beat_id) {
                return Err(TimingError::DuplicateBeat {
                    beat_id: beat.beat_id,
                });
            }

            let scope = &beat.timing_scope;
            if scope.start_line() > scope.end_line() {
                return Err(TimingError::InvertedScope {
                    beat_id: beat.beat_id,
                    start_line: scope.start_line(),
                    end_line: scope.end_line(),
                });
            }

            for line_index in scope.lines() {
                if !span_positions.contains_key(&line_index) {
                    return Err(TimingError::UnknownSpan {
                        beat_id: beat.beat_id,
                        line_index,
                        span_count,
                    });
                }
            }

            for mb in &beat.microbeats {
                let share = mb.share();
                if !share.is_finite() || share <= 0.0 {
                    return Err(TimingError::InvalidMicrobeatWeight {
                        beat_id: beat.beat_id,
                        microbeat_id: mb.microbeat_id,
                        weight: share,
                    });
                }
            }
        }
        Ok(())
    }

    /// Split every span between its beats and union the fragments per beat.
    fn distribute(&self, spans: &[NarrationSpan], beats: &[Beat]) -> TimingResult<Vec<Interval>> {
        let mut intervals: Vec<Interval> = Vec::with_capacity(beats.len());
        let mut by_beat: HashMap<BeatId, usize> = HashMap::with_capacity(beats.len());

        for span in spans {
            let members: Vec<usize> = beats
                .iter()
                .enumerate()
                .filter(|(_, b)| b.timing_scope.contains(span.index))
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                continue;
            }

            let weights: Vec<f64> = members
                .iter()
                .map(|&i| self.weights.weight(beats[i].attention_weight))
                .collect();
            let total: f64 = weights.iter().sum();
            if !(total > 0.0) {
                return Err(TimingError::ZeroWeight {
                    index: span.index,
                    beat_ids: members.iter().map(|&i| beats[i].beat_id).collect(),
                });
            }

            let span_duration = span.duration();
            let mut cursor = span.start_time;
            for (n, (&beat, &weight)) in members.iter().zip(&weights).enumerate() {
                let start = cursor;
                let end = if n + 1 == members.len() {
                    span.end_time
                } else {
                    cursor + span_duration * weight / total
                };
                cursor = end;

                let beat_id = beats[beat].beat_id;
                match by_beat.get(&beat_id) {
                    Some(&slot) => {
                        let iv = &mut intervals[slot];
                        iv.start = iv.start.min(start);
                        iv.end = iv.end.max(end);
                    }
                    None => {
                        by_beat.insert(beat_id, intervals.len());
                        intervals.push(Interval { beat, start, end });
                    }
                }
            }
        }

        Ok(intervals)
    }
}

/// Map span `index` to its position, rejecting malformed spans.
fn index_spans(spans: &[NarrationSpan]) -> TimingResult<HashMap<usize, usize>> {
    let mut positions = HashMap::with_capacity(spans.len());
    for (pos, span) in spans.iter().enumerate() {
        let valid = span.start_time.is_finite()
            && span.end_time.is_finite()
            && span.start_time >= 0.0
            && span.end_time > span.start_time;
        if !valid {
            return Err(TimingError::InvalidSpan {
                index: span.index,
                start: span.start_time,
                end: span.end_time,
            });
        }
        if positions.insert(span.index, pos).is_some() {
            return Err(TimingError::DuplicateSpanIndex { index: span.index });
        }
    }
    Ok(positions)
}

/// Pin the first start to zero and butt every end against the next start.
fn make_contiguous(intervals: &mut [Interval], beats: &[Beat]) -> TimingResult<()> {
    if let Some(first) = intervals.first_mut() {
        first.start = 0.0;
    }
    for i in 1..intervals.len() {
        let next_start = intervals[i].start;
        let prev = &mut intervals[i - 1];
        if prev.end != next_start {
            debug!(
                beat_id = beats[prev.beat].beat_id,
                from = prev.end,
                to = next_start,
                "Clamping beat end to next start"
            );
        }
        prev.end = next_start;
    }
    for iv in intervals.iter() {
        if !(iv.end > iv.start) {
            return Err(TimingError::DegenerateBeat {
                beat_id: beats[iv.beat].beat_id,
                start: iv.start,
                end: iv.end,
            });
        }
    }
    Ok(())
}

/// Emit one timed beat per beat, or one per microbeat when a beat has them.
fn expand_microbeats(intervals: &[Interval], beats: &[Beat]) -> TimingResult<Vec<TimedBeat>> {
    let mut timed = Vec::with_capacity(intervals.len());

    for iv in intervals {
        let beat = &beats[iv.beat];
        if beat.microbeats.is_empty() {
            let mut tb = TimedBeat::new(beat.beat_id, beat.image_reference.clone(), iv.start, iv.end);
            tb.camera = beat.camera;
            timed.push(tb);
            continue;
        }

        let total: f64 = beat.microbeats.iter().map(|mb| mb.share()).sum();
        let duration = iv.end - iv.start;
        let mut cursor = iv.start;
        for (n, mb) in beat.microbeats.iter().enumerate() {
            let start = cursor;
            let end = if n + 1 == beat.microbeats.len() {
                iv.end
            } else {
                cursor + duration * mb.share() / total
            };
            cursor = end;

            if !(end > start) {
                return Err(TimingError::DegenerateBeat {
                    beat_id: beat.beat_id,
                    start,
                    end,
                });
            }

            let mut tb = TimedBeat::new(beat.beat_id, mb.image_reference.clone(), start, end);
            tb.microbeat_id = Some(mb.microbeat_id);
            tb.camera = mb.camera.or(beat.camera);
            timed.push(tb);
        }
    }

    Ok(timed)
}
