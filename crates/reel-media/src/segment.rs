//! Still image to motion clip rendering.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use reel_models::{CameraHint, RenderConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filtergraph::{FilterChain, FilterGraph, FilterStage, ScaleFit};
use crate::motion::{strategy_for, MotionSpec, MotionStrategy, ShotContext};
use crate::probe::probe_duration;

/// Everything needed to render one segment.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    /// Position in the render, 0 for the first segment
    pub index: usize,
    pub image: PathBuf,
    pub duration_seconds: f64,
    pub motion_seed: String,
    pub camera: Option<CameraHint>,
    pub output: PathBuf,
}

/// A rendered, video-only clip.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSegment {
    pub index: usize,
    pub path: PathBuf,
    /// Requested duration
    pub duration_seconds: f64,
    /// Duration reported by ffprobe
    pub probed_seconds: f64,
    pub frames: u64,
}

/// Renders stills into fixed-size, fixed-rate clips.
pub struct SegmentRenderer {
    config: RenderConfig,
    strategy: Box<dyn MotionStrategy>,
    runner: FfmpegRunner,
}

impl SegmentRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            strategy: strategy_for(config),
            runner: FfmpegRunner::new().with_timeout(config.ffmpeg_timeout_secs),
            config: config.clone(),
        }
    }

    /// Use a specific motion strategy instead of the configured one.
    pub fn with_strategy(mut self, strategy: Box<dyn MotionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Motion and filter graph for a request, without running anything.
    pub fn plan(&self, request: &SegmentRequest) -> (MotionSpec, FilterGraph) {
        let motion = self.strategy.build(
            request.duration_seconds,
            &request.motion_seed,
            &ShotContext {
                segment_index: request.index,
                camera: request.camera,
            },
        );
        let graph = self.graph_for(request, &motion);
        (motion, graph)
    }

    fn graph_for(&self, request: &SegmentRequest, motion: &MotionSpec) -> FilterGraph {
        let cfg = &self.config;
        let (w, h, fps) = (cfg.width, cfg.height, cfg.fps);
        let duration = request.duration_seconds;
        let motion_stages = motion.to_stages(w, h);
        let finish = [
            FilterStage::Format(cfg.encoding.pixel_format.clone()),
            FilterStage::Trim {
                start: None,
                duration: Some(duration),
            },
            FilterStage::ResetPts,
        ];

        let glitch = cfg.glitch_duration();
        let with_glitch = request.index == 0 && cfg.glitch.enabled && glitch > 0.0 && duration > glitch;

        if !with_glitch {
            return FilterGraph::new().chain(
                FilterChain::from_input("0:v")
                    .stages(motion_stages)
                    .stages(finish)
                    .to_output("v"),
            );
        }

        let retime = [FilterStage::Fps(fps), FilterStage::SetTimebase(fps)];
        FilterGraph::new()
            .chain(
                FilterChain::from_input("0:v")
                    .stage(FilterStage::Split { outputs: 2 })
                    .to_outputs(["gsrc", "msrc"]),
            )
            .chain(
                FilterChain::from_input("gsrc")
                    .stages([
                        FilterStage::Scale {
                            width: w,
                            height: h,
                            fit: ScaleFit::Cover,
                        },
                        FilterStage::Crop { width: w, height: h },
                        FilterStage::Eq {
                            contrast: cfg.glitch.contrast,
                            brightness: cfg.glitch.brightness,
                        },
                        FilterStage::GaussianBlur {
                            sigma: cfg.glitch.blur_sigma,
                        },
                    ])
                    .stages(retime.clone())
                    .stages([
                        FilterStage::Trim {
                            start: None,
                            duration: Some(glitch),
                        },
                        FilterStage::ResetPts,
                    ])
                    .to_output("g"),
            )
            .chain(
                FilterChain::from_input("msrc")
                    .stages(motion_stages)
                    .stages(retime)
                    .stages([
                        FilterStage::Trim {
                            start: Some(glitch),
                            duration: None,
                        },
                        FilterStage::ResetPts,
                    ])
                    .to_output("n"),
            )
            .chain(
                FilterChain::from_inputs(["g", "n"])
                    .stage(FilterStage::Concat { segments: 2 })
                    .stages(finish)
                    .to_output("v"),
            )
    }

    /// Render one segment. Fails if the image is missing or ffmpeg fails.
    pub async fn render(&self, request: &SegmentRequest) -> MediaResult<RenderedSegment> {
        if !(request.duration_seconds > 0.0) {
            return Err(MediaError::render_failed(
                request.index,
                &request.image,
                format!("non-positive duration {}", request.duration_seconds),
            ));
        }
        if !request.image.is_file() {
            return Err(MediaError::render_failed(
                request.index,
                &request.image,
                "source image not found",
            ));
        }

        let (motion, graph) = self.plan(request);
        debug!(
            segment = request.index,
            mode = ?motion.mode,
            frames = motion.frames,
            "Segment motion"
        );

        let cmd = segment_command(&self.config, &request.image, &request.output, &motion, &graph);
        self.runner.run(&cmd).await.map_err(|e| {
            let detail = match e.stderr() {
                Some(stderr) => format!("{}\n{}", e, stderr),
                None => e.to_string(),
            };
            MediaError::render_failed(request.index, &request.image, detail)
        })?;

        let probed = probe_duration(&request.output).await?;
        check_rendered_length(motion.duration(), probed, self.config.fps)
            .map_err(|msg| MediaError::render_failed(request.index, &request.image, msg))?;

        info!(
            segment = request.index,
            duration = request.duration_seconds,
            probed,
            strategy = self.strategy.name(),
            output = %request.output.display(),
            "Rendered segment"
        );

        Ok(RenderedSegment {
            index: request.index,
            path: request.output.clone(),
            duration_seconds: request.duration_seconds,
            probed_seconds: probed,
            frames: motion.frames,
        })
    }
}

/// Rejects clips more than half a frame short of the planned length.
fn check_rendered_length(expected: f64, probed: f64, fps: u32) -> Result<(), String> {
    let slack = 0.5 / fps as f64;
    if probed + slack < expected {
        return Err(format!(
            "rendered {:.3}s, expected {:.3}s",
            probed, expected
        ));
    }
    Ok(())
}

fn segment_command(
    config: &RenderConfig,
    image: &Path,
    output: &Path,
    motion: &MotionSpec,
    graph: &FilterGraph,
) -> FfmpegCommand {
    // One spare second of input so trim never runs dry
    FfmpegCommand::new(output)
        .looped_image(image, config.fps, motion.duration() + 1.0)
        .filter_graph(graph)
        .map("[v]")
        .no_audio()
        .encode_video(&config.encoding)
        .frame_rate(config.fps)
        .frames(motion.frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::{LinearKenBurns, MotionMode};
    use tempfile::TempDir;

    fn request(index: usize, duration: f64) -> SegmentRequest {
        SegmentRequest {
            index,
            image: PathBuf::from("img/b001.png"),
            duration_seconds: duration,
            motion_seed: format!("run|b{:03}|motion", index),
            camera: None,
            output: PathBuf::from(format!("tmp/segment_{:03}.mp4", index)),
        }
    }

    #[test]
    fn test_plain_segment_graph() {
        let renderer = SegmentRenderer::new(&RenderConfig::default());
        let (motion, graph) = renderer.plan(&request(3, 2.5));

        assert_eq!(motion.frames, 60);
        assert_eq!(graph.chains().len(), 1);
        let text = graph.to_ffmpeg();
        assert!(text.starts_with("[0:v]scale="));
        assert!(text.contains("zoompan="));
        assert!(text.ends_with("format=yuv420p,trim=duration=2.500000,setpts=PTS-STARTPTS[v]"));
    }

    #[test]
    fn test_first_segment_has_glitch_hook() {
        let renderer = SegmentRenderer::new(&RenderConfig::default());
        let (_, graph) = renderer.plan(&request(0, 2.5));

        assert_eq!(graph.chains().len(), 4);
        let text = graph.to_ffmpeg();
        assert!(text.contains("split=2[gsrc][msrc]"));
        assert!(text.contains("eq=contrast=1.8:brightness=-0.15"));
        assert!(text.contains("gblur=sigma=8:steps=1"));
        assert!(text.contains("trim=start=0.300000"));
        assert!(text.contains("[g][n]concat=n=2:v=1:a=0"));
    }

    #[test]
    fn test_glitch_skipped_when_disabled_or_too_short() {
        let mut config = RenderConfig::default();
        let renderer = SegmentRenderer::new(&config);
        let (_, graph) = renderer.plan(&request(0, 0.2));
        assert_eq!(graph.chains().len(), 1);

        config.glitch.enabled = false;
        let renderer = SegmentRenderer::new(&config);
        let (_, graph) = renderer.plan(&request(0, 3.0));
        assert_eq!(graph.chains().len(), 1);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let renderer = SegmentRenderer::new(&RenderConfig::default());
        let a = renderer.plan(&request(5, 3.3));
        let b = renderer.plan(&request(5, 3.3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_command_caps_frames() {
        let config = RenderConfig::default();
        let renderer = SegmentRenderer::new(&config);
        let req = request(2, 4.0);
        let (motion, graph) = renderer.plan(&req);
        let args = segment_command(&config, &req.image, &req.output, &motion, &graph).build_args();

        let frames = args.iter().position(|a| a == "-frames:v").unwrap();
        assert_eq!(args[frames + 1], "96");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"[v]".to_string()));
    }

    #[tokio::test]
    async fn test_missing_image_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let renderer = SegmentRenderer::new(&RenderConfig::default());
        let mut req = request(1, 2.0);
        req.image = dir.path().join("missing.png");
        req.output = dir.path().join("segment_001.mp4");

        let err = renderer.render(&req).await.unwrap_err();
        assert!(matches!(err, MediaError::RenderFailed { segment: 1, .. }));
        assert!(!req.output.exists());
    }

    #[test]
    fn test_short_render_rejected() {
        // 49 frames at 24 fps
        let expected = 49.0 / 24.0;
        assert!(check_rendered_length(expected, expected, 24).is_ok());
        assert!(check_rendered_length(expected, expected - 0.01, 24).is_ok());
        assert!(check_rendered_length(expected, 48.0 / 24.0, 24).is_err());
        assert!(check_rendered_length(expected, 0.0, 24).is_err());
    }

    #[test]
    fn test_strategy_override() {
        let config = RenderConfig::default();
        let renderer = SegmentRenderer::new(&config)
            .with_strategy(Box::new(LinearKenBurns::new(config.motion.clone(), config.fps)));
        assert_eq!(renderer.strategy_name(), "linear");

        let (motion, _) = renderer.plan(&request(3, 2.0));
        assert_eq!(motion.mode, MotionMode::KenBurns);
    }
}
