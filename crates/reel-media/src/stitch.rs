//! Crossfade stitching of rendered segments.
//!
//! With clip durations `d_0..d_n-1` and crossfade `x`, junction `i` starts
//! at `max(0, T_i - x)` where `T_i` is the running composite length, and the
//! composite grows by `d_i - x` per junction. The stitched length is
//! therefore `sum(d) - (n-1) * x`.

use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use reel_models::{RenderConfig, TransitionStyle};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filtergraph::{FilterChain, FilterGraph, FilterStage};
use crate::motion::seeded_rng;
use crate::probe::probe_duration;

/// The stitched visual track.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedTrack {
    pub path: PathBuf,
    /// Measured duration of the written file
    pub duration: f64,
    /// Duration predicted by the crossfade timeline
    pub planned_duration: f64,
    pub transitions: Vec<TransitionStyle>,
}

/// One crossfade between the running composite and the next clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    /// Index of the clip being faded in
    pub clip: usize,
    pub transition: TransitionStyle,
    pub offset: f64,
}

/// Resolved crossfade timeline plus the graph that realizes it.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadePlan {
    pub junctions: Vec<Junction>,
    pub total_duration: f64,
    pub graph: FilterGraph,
    /// Label of the final composite
    pub output_label: String,
}

/// Pick one transition per junction from `pool`, deterministically for `seed`.
///
/// Duplicate pool entries are collapsed. An empty pool falls back to a fade.
pub fn choose_transitions(
    pool: &[TransitionStyle],
    junctions: usize,
    seed: &str,
) -> Vec<TransitionStyle> {
    let mut unique: Vec<TransitionStyle> = Vec::with_capacity(pool.len());
    for style in pool {
        if !unique.contains(style) {
            unique.push(*style);
        }
    }
    if unique.is_empty() {
        unique.push(TransitionStyle::Fade);
    }

    let mut rng = seeded_rng(seed);
    (0..junctions)
        .map(|_| unique[rng.random_range(0..unique.len())])
        .collect()
}

/// Build the crossfade timeline for clips of the given durations.
pub fn plan_crossfade(
    durations: &[f64],
    crossfade: f64,
    fps: u32,
    transitions: &[TransitionStyle],
) -> MediaResult<CrossfadePlan> {
    if durations.is_empty() {
        return Err(MediaError::stitch_failed("no clips to stitch"));
    }
    if transitions.len() + 1 != durations.len() {
        return Err(MediaError::stitch_failed(format!(
            "{} transitions for {} clips",
            transitions.len(),
            durations.len()
        )));
    }
    for (i, &d) in durations.iter().enumerate() {
        if !(d > 0.0) {
            return Err(MediaError::stitch_failed(format!(
                "clip {} has invalid duration {}",
                i, d
            )));
        }
        if durations.len() > 1 && d <= crossfade {
            return Err(MediaError::stitch_failed(format!(
                "clip {} ({:.3}s) is not longer than the {:.3}s crossfade",
                i, d, crossfade
            )));
        }
    }

    let mut graph = FilterGraph::new();
    for i in 0..durations.len() {
        graph.push(
            FilterChain::from_input(format!("{}:v", i))
                .stages([
                    FilterStage::Fps(fps),
                    FilterStage::SetTimebase(fps),
                    FilterStage::ResetPts,
                ])
                .to_output(format!("v{}", i)),
        );
    }

    let mut junctions = Vec::with_capacity(transitions.len());
    let mut current = "v0".to_string();
    let mut timeline = durations[0];

    for (i, &transition) in transitions.iter().enumerate() {
        let clip = i + 1;
        let offset = (timeline - crossfade).max(0.0);
        let label = format!("vx{}", clip);

        graph.push(
            FilterChain::from_inputs([current.clone(), format!("v{}", clip)])
                .stage(FilterStage::Crossfade {
                    transition,
                    duration: crossfade,
                    offset,
                })
                .to_output(label.clone()),
        );
        timeline += durations[clip] - crossfade;
        junctions.push(Junction {
            clip,
            transition,
            offset,
        });
        current = label;
    }

    Ok(CrossfadePlan {
        junctions,
        total_duration: timeline,
        graph,
        output_label: current,
    })
}

/// Chains segment clips with crossfades.
pub struct Stitcher {
    config: RenderConfig,
    runner: FfmpegRunner,
}

impl Stitcher {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs),
            config: config.clone(),
        }
    }

    /// Stitch `clips` in order into `output`.
    ///
    /// A single clip is stream-copied. Otherwise every clip is probed, since
    /// encoders round to whole frames.
    pub async fn stitch(
        &self,
        clips: &[PathBuf],
        crossfade: f64,
        pool: &[TransitionStyle],
        seed: &str,
        output: &Path,
    ) -> MediaResult<StitchedTrack> {
        if clips.is_empty() {
            return Err(MediaError::stitch_failed("no clips to stitch"));
        }

        if let [only] = clips {
            let cmd = FfmpegCommand::new(output).input(only).copy_streams();
            self.runner.run(&cmd).await.map_err(stitch_error)?;
            let duration = probe_duration(output).await?;
            info!(duration, "Single segment, stitched by copy");
            return Ok(StitchedTrack {
                path: output.to_path_buf(),
                duration,
                planned_duration: duration,
                transitions: Vec::new(),
            });
        }

        let mut durations = Vec::with_capacity(clips.len());
        for clip in clips {
            let d = probe_duration(clip).await?;
            if !(d > 0.0) {
                return Err(MediaError::stitch_failed(format!(
                    "clip {} probed at {}s",
                    clip.display(),
                    d
                )));
            }
            durations.push(d);
        }

        let transitions = choose_transitions(pool, clips.len() - 1, seed);
        let plan = plan_crossfade(&durations, crossfade, self.config.fps, &transitions)?;
        debug!(
            clips = clips.len(),
            planned = plan.total_duration,
            "Crossfade plan"
        );

        let cmd = clips
            .iter()
            .fold(FfmpegCommand::new(output), |cmd, clip| cmd.input(clip))
            .filter_graph(&plan.graph)
            .map(format!("[{}]", plan.output_label))
            .no_audio()
            .encode_video(&self.config.encoding)
            .frame_rate(self.config.fps);
        self.runner.run(&cmd).await.map_err(stitch_error)?;

        let duration = probe_duration(output).await?;
        info!(
            clips = clips.len(),
            duration,
            planned = plan.total_duration,
            "Stitched segments"
        );

        Ok(StitchedTrack {
            path: output.to_path_buf(),
            duration,
            planned_duration: plan.total_duration,
            transitions,
        })
    }
}

fn stitch_error(e: MediaError) -> MediaError {
    match e.stderr() {
        Some(stderr) => MediaError::stitch_failed(format!("{}\n{}", e, stderr)),
        None => MediaError::stitch_failed(e.to_string()),
    }
}
