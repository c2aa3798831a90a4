//! Final audio/video composition.
//!
//! The narration audio is authoritative: the stitched picture is padded by
//! cloning its last frame, or trimmed from the end, to the narration length.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reel_models::RenderConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filtergraph::{FilterChain, FilterGraph, FilterStage};
use crate::fs_utils::{move_file, staging_path};
use crate::probe::probe_duration;

/// Grain strength (0-1) to `noise` filter strength.
fn grain_strength(grain: f64) -> Option<u32> {
    if grain <= 0.0 {
        return None;
    }
    Some(((grain * 120.0) as u32).clamp(1, 30))
}

/// Filter graph and labels for one composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposePlan {
    pub graph: FilterGraph,
    /// Seconds of cloned last frame appended to the picture
    pub pad_seconds: f64,
    pub target_duration: f64,
    pub with_music: bool,
}

impl ComposePlan {
    pub const VIDEO_OUT: &'static str = "vout";
    pub const AUDIO_OUT: &'static str = "aout";
}

/// Plan the final mix.
///
/// Inputs are `0` = stitched video, `1` = narration, `2` = prepared music
/// bed (when `with_music`).
pub fn plan_compose(
    config: &RenderConfig,
    video_duration: f64,
    target_duration: f64,
    with_music: bool,
    captions: Option<&Path>,
) -> ComposePlan {
    let pad_seconds = (target_duration - video_duration).max(0.0);

    let mut video = FilterChain::from_input("0:v");
    if pad_seconds > 0.0 {
        video = video.stage(FilterStage::PadClone {
            seconds: pad_seconds,
        });
    }
    video = video.stages([
        FilterStage::Trim {
            start: None,
            duration: Some(target_duration),
        },
        FilterStage::ResetPts,
    ]);
    if let Some(strength) = grain_strength(config.grade.grain) {
        video = video.stage(FilterStage::Noise { strength });
    }
    if config.grade.vignette {
        video = video.stage(FilterStage::Vignette);
    }
    if let Some(path) = captions {
        video = video.stage(FilterStage::Subtitles {
            path: path.to_path_buf(),
        });
    }
    video = video
        .stage(FilterStage::Format(config.encoding.pixel_format.clone()))
        .to_output(ComposePlan::VIDEO_OUT);

    let mix = &config.mix;
    let narration = FilterChain::from_input("1:a").stages([
        FilterStage::Resample {
            rate: config.encoding.sample_rate,
        },
        FilterStage::FadeOut {
            start: (target_duration - mix.fade_out_lead).max(0.0),
            duration: mix.fade_out_duration,
        },
    ]);

    let mut graph = FilterGraph::new().chain(video);
    if with_music {
        graph = graph
            .chain(narration.to_output("vo"))
            .chain(
                FilterChain::from_input("2:a")
                    .stage(FilterStage::Resample {
                        rate: config.encoding.sample_rate,
                    })
                    .to_output("bed"),
            )
            .chain(
                FilterChain::from_inputs(["vo", "bed"])
                    .stage(FilterStage::Mix { inputs: 2 })
                    .stage(FilterStage::Limiter { limit: mix.limiter })
                    .to_output(ComposePlan::AUDIO_OUT),
            );
    } else {
        graph = graph.chain(
            narration
                .stage(FilterStage::Limiter { limit: mix.limiter })
                .to_output(ComposePlan::AUDIO_OUT),
        );
    }

    ComposePlan {
        graph,
        pad_seconds,
        target_duration,
        with_music,
    }
}

/// Music bed processing chain: normalize after the loop/trim, then band-limit
/// and attenuate.
pub fn music_bed_chain(config: &RenderConfig) -> FilterChain {
    let bed = &config.music;
    FilterChain::unlabelled().stages([
        FilterStage::Loudnorm {
            integrated: bed.loudness_target,
            true_peak: bed.true_peak,
            range: bed.loudness_range,
        },
        FilterStage::Highpass { hz: bed.highpass_hz },
        FilterStage::Lowpass { hz: bed.lowpass_hz },
        FilterStage::VolumeDb(bed.gain_db),
    ])
}

/// Inputs for one final composition.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub video: PathBuf,
    /// Measured duration of `video`
    pub video_duration: f64,
    pub narration: PathBuf,
    pub music_bed: Option<PathBuf>,
    pub captions: Option<PathBuf>,
    /// Narration length; the output matches it
    pub target_duration: f64,
    pub output: PathBuf,
}

/// The finished render.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRender {
    pub path: PathBuf,
    pub duration: f64,
    pub with_music: bool,
}

/// Muxes the stitched picture with narration and an optional music bed.
pub struct Compositor {
    config: RenderConfig,
    runner: FfmpegRunner,
}

impl Compositor {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs),
            config: config.clone(),
        }
    }

    /// Loop/trim `source` to `target_duration` and process it into
    /// `scratch/music_bed.m4a`.
    ///
    /// Never fails: any problem is logged and `None` returned so the render
    /// continues with narration only.
    pub async fn prepare_music_bed(
        &self,
        source: &Path,
        target_duration: f64,
        scratch: &Path,
    ) -> Option<PathBuf> {
        if !source.is_file() {
            warn!(path = %source.display(), "Music bed not found, using narration only");
            return None;
        }

        let out = scratch.join("music_bed.m4a");
        let cmd = FfmpegCommand::new(&out)
            .looped_input(source, target_duration)
            .output_arg("-vn")
            .output_arg("-af")
            .output_arg(music_bed_chain(&self.config).to_ffmpeg())
            .encode_audio(&self.config.encoding);

        match self.runner.run(&cmd).await {
            Ok(()) => {
                info!(source = %source.display(), "Prepared music bed");
                Some(out)
            }
            Err(e) => {
                warn!(
                    source = %source.display(),
                    error = %e,
                    "Music bed processing failed, using narration only"
                );
                None
            }
        }
    }

    /// Compose the final file at `request.output`.
    ///
    /// The file is written next to the output and moved into place only once
    /// ffmpeg succeeded and the duration checks out.
    pub async fn compose(&self, request: &ComposeRequest) -> MediaResult<FinalRender> {
        for (what, path) in [
            ("stitched video", &request.video),
            ("narration audio", &request.narration),
        ] {
            if !path.is_file() {
                return Err(MediaError::compose_failed(format!(
                    "{} missing: {}",
                    what,
                    path.display()
                )));
            }
        }
        let target = request.target_duration;
        if !(target > 0.0) {
            return Err(MediaError::compose_failed(format!(
                "invalid target duration {}",
                target
            )));
        }

        let music_bed = request.music_bed.as_deref().filter(|p| {
            let exists = p.is_file();
            if !exists {
                warn!(path = %p.display(), "Music bed vanished, using narration only");
            }
            exists
        });

        let plan = plan_compose(
            &self.config,
            request.video_duration,
            target,
            music_bed.is_some(),
            request.captions.as_deref(),
        );

        let output = &request.output;
        let staging = staging_path(output);
        let mut cmd = FfmpegCommand::new(&staging)
            .input(&request.video)
            .input(&request.narration);
        if let Some(bed) = music_bed {
            cmd = cmd.input(bed);
        }
        let cmd = cmd
            .filter_graph(&plan.graph)
            .map(format!("[{}]", ComposePlan::VIDEO_OUT))
            .map(format!("[{}]", ComposePlan::AUDIO_OUT))
            .encode_video(&self.config.encoding)
            .encode_audio(&self.config.encoding)
            .frame_rate(self.config.fps)
            .duration(target);

        if let Err(e) = self.finish(&cmd, &staging, output, target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        info!(
            output = %output.display(),
            duration = target,
            padded = plan.pad_seconds,
            music = plan.with_music,
            "Composed final render"
        );

        Ok(FinalRender {
            path: output.clone(),
            duration: target,
            with_music: plan.with_music,
        })
    }

    async fn finish(
        &self,
        cmd: &FfmpegCommand,
        staging: &Path,
        output: &Path,
        target_duration: f64,
    ) -> MediaResult<()> {
        self.runner.run(cmd).await.map_err(|e| match e.stderr() {
            Some(stderr) => MediaError::compose_failed(format!("{}\n{}", e, stderr)),
            None => MediaError::compose_failed(e.to_string()),
        })?;

        let actual = probe_duration(staging).await?;
        let tolerance = 2.0 / self.config.fps as f64;
        if (actual - target_duration).abs() > tolerance {
            return Err(MediaError::compose_failed(format!(
                "composed duration {:.3}s does not match narration {:.3}s",
                actual, target_duration
            )));
        }

        move_file(staging, output).await
    }
}
