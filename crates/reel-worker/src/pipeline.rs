//! The render pipeline: plan, segments, stitch, compose.
//!
//! Stages run strictly in order and any failure aborts the render. Only the
//! segment stage fans out, bounded by `max_parallel_segments`, and its
//! results keep timeline order.

use futures::{stream, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tracing::Instrument;

use reel_media::{
    check_ffmpeg, check_ffprobe, probe_duration, write_captions, ComposeRequest, Compositor,
    RenderedSegment, SegmentRenderer, SegmentRequest, Stitcher,
};
use reel_models::{TimingPlan, TransitionStyle};
use reel_timing::TimelineAllocator;

use crate::artifacts::RunDir;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::{RenderLogger, Stage};
use crate::music::{list_music, pick_music};

/// Seed for per-segment motion.
pub fn motion_seed(run_id: &str, beat_key: &str) -> String {
    format!("{}|{}|motion", run_id, beat_key)
}

/// Seed for the stitcher's transition choices.
pub fn stitch_seed(run_id: &str) -> String {
    format!("{}|segments|xfade", run_id)
}

/// Summary of a finished render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub run_id: String,
    pub output: PathBuf,
    pub duration: f64,
    pub segments: usize,
    pub transitions: Vec<TransitionStyle>,
    pub music: Option<PathBuf>,
    pub captions: bool,
}

pub struct RenderPipeline {
    config: WorkerConfig,
    allocator: TimelineAllocator,
    renderer: SegmentRenderer,
    stitcher: Stitcher,
    compositor: Compositor,
}

impl RenderPipeline {
    pub fn new(config: WorkerConfig) -> Self {
        let render = &config.render;
        Self {
            allocator: TimelineAllocator::from_config(render),
            renderer: SegmentRenderer::new(render),
            stitcher: Stitcher::new(render),
            compositor: Compositor::new(render),
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Allocate the timeline from the artifacts alone and write
    /// `timing_plan.json`.
    pub async fn plan(&self, run: &RunDir) -> WorkerResult<TimingPlan> {
        let logger = RenderLogger::new(run.id());
        logger.stage_start(Stage::Load, "reading narration and storyboard");
        let narration = run.load_narration().await?;
        let storyboard = run.load_storyboard().await?;

        logger.stage_start(Stage::Plan, "allocating beats");
        let plan = self.allocator.plan(&narration, &storyboard)?;
        run.write_timing_plan(&plan).await?;
        logger.stage_done(
            Stage::Plan,
            &format!("{} timed beats over {:.3}s", plan.total_beats, plan.full_duration_seconds),
        );
        Ok(plan)
    }

    /// One segment request per timed beat, in timeline order.
    pub fn segment_requests(&self, run: &RunDir, plan: &TimingPlan) -> WorkerResult<Vec<SegmentRequest>> {
        plan.beats
            .iter()
            .enumerate()
            .map(|(index, beat)| {
                let key = beat.key();
                Ok(SegmentRequest {
                    index,
                    image: run.resolve_image(&beat.image_reference, &key)?,
                    duration_seconds: beat.duration_seconds,
                    motion_seed: motion_seed(run.id(), &key),
                    camera: beat.camera,
                    output: run.segment_path(index),
                })
            })
            .collect()
    }

    /// Full render of `run` into `output` (default `render/final.mp4`).
    pub async fn render(&self, run: &RunDir, output: Option<&Path>) -> WorkerResult<RenderOutcome> {
        let logger = RenderLogger::new(run.id());
        let span = logger.span();
        let result = self.render_inner(run, output, &logger).instrument(span).await;
        if let Err(e) = &result {
            logger.failure(&e.to_string());
        }
        result
    }

    async fn render_inner(
        &self,
        run: &RunDir,
        output: Option<&Path>,
        logger: &RenderLogger,
    ) -> WorkerResult<RenderOutcome> {
        let render = &self.config.render;
        check_ffmpeg()?;
        check_ffprobe()?;

        logger.stage_start(Stage::Load, "reading artifacts");
        let narration = run.load_narration().await?;
        let storyboard = run.load_storyboard().await?;
        let audio = run.audio_path(&narration)?;
        run.prepare_render_dirs().await?;

        logger.stage_start(Stage::Probe, "measuring narration audio");
        let audio_duration = probe_duration(&audio).await?;
        if (audio_duration - narration.full_duration_seconds).abs() > render.frame_duration() {
            logger.warning(
                Stage::Probe,
                &format!(
                    "narration artifact says {:.3}s, audio measures {:.3}s; using the audio",
                    narration.full_duration_seconds, audio_duration
                ),
            );
        }

        logger.stage_start(Stage::Plan, "allocating beats");
        let plan = self
            .allocator
            .plan_for_audio(&narration, &storyboard, audio_duration)?;
        run.write_timing_plan(&plan).await?;

        let requests = self.segment_requests(run, &plan)?;
        logger.stage_start(
            Stage::Segments,
            &format!(
                "rendering {} segments ({} at a time, {} motion)",
                requests.len(),
                render.max_parallel_segments,
                self.renderer.strategy_name()
            ),
        );
        let segments: Vec<RenderedSegment> = stream::iter(requests.iter().map(|r| self.renderer.render(r)))
            .buffered(render.max_parallel_segments.max(1))
            .try_collect()
            .await?;
        logger.stage_done(Stage::Segments, &format!("{} segments", segments.len()));

        logger.stage_start(Stage::Stitch, "crossfading segments");
        let clips: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        let stitched = self
            .stitcher
            .stitch(
                &clips,
                render.crossfade_duration,
                &render.transition_pool(),
                &stitch_seed(run.id()),
                &run.stitched_path(),
            )
            .await?;
        logger.stage_done(
            Stage::Stitch,
            &format!("{:.3}s (planned {:.3}s)", stitched.duration, stitched.planned_duration),
        );

        let (music_source, music_bed) = self.music_bed(run, audio_duration, logger).await;
        let captions = self.captions(run, &narration.words, logger).await?;

        logger.stage_start(Stage::Compose, "muxing narration and picture");
        let output = output.map(Path::to_path_buf).unwrap_or_else(|| run.final_path());
        let final_render = self
            .compositor
            .compose(&ComposeRequest {
                video: stitched.path.clone(),
                video_duration: stitched.duration,
                narration: audio,
                music_bed,
                captions: captions.clone(),
                target_duration: audio_duration,
                output,
            })
            .await?;
        logger.stage_done(
            Stage::Compose,
            &format!("{} ({:.3}s)", final_render.path.display(), final_render.duration),
        );

        Ok(RenderOutcome {
            run_id: run.id().to_string(),
            output: final_render.path,
            duration: final_render.duration,
            segments: segments.len(),
            transitions: stitched.transitions,
            music: music_source.filter(|_| final_render.with_music),
            captions: captions.is_some(),
        })
    }

    /// Select and prepare the music bed. Never fails the render.
    async fn music_bed(
        &self,
        run: &RunDir,
        duration: f64,
        logger: &RenderLogger,
    ) -> (Option<PathBuf>, Option<PathBuf>) {
        if !self.config.render.music.enabled {
            return (None, None);
        }
        logger.stage_start(Stage::Music, "selecting music bed");

        let tracks = list_music(&self.config.music_dir).await;
        let Some(track) = pick_music(&tracks, self.config.music_seed.as_deref()).cloned() else {
            logger.warning(
                Stage::Music,
                &format!(
                    "no music in {}, using narration only",
                    self.config.music_dir.display()
                ),
            );
            return (None, None);
        };

        let bed = self
            .compositor
            .prepare_music_bed(&track, duration, &run.scratch_dir())
            .await;
        if bed.is_some() {
            logger.stage_done(Stage::Music, &track.display().to_string());
        }
        (Some(track), bed)
    }

    async fn captions(
        &self,
        run: &RunDir,
        words: &[reel_models::NarrationWord],
        logger: &RenderLogger,
    ) -> WorkerResult<Option<PathBuf>> {
        let render = &self.config.render;
        if !render.captions.enabled {
            return Ok(None);
        }
        if words.is_empty() {
            logger.warning(Stage::Captions, "captions enabled but narration has no word timings");
            return Ok(None);
        }

        let path = run.captions_path();
        let written = write_captions(&path, words, &render.captions, render.width, render.height).await?;
        Ok(written.map(|_| path))
    }
}
