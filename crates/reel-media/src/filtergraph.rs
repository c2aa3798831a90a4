//! Typed filter-graph descriptors and their ffmpeg lowering.
//!
//! Renderers describe what they want as [`FilterStage`]s grouped into
//! labelled [`FilterChain`]s. Only [`FilterGraph::to_ffmpeg`] and friends
//! know ffmpeg's filter syntax.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use reel_models::TransitionStyle;

/// How a scale stage treats the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFit {
    /// Stretch to exactly the requested size
    Exact,
    /// Scale up until both dimensions are covered (pair with a crop)
    Cover,
}

/// One filter in a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterStage {
    Scale {
        width: u32,
        height: u32,
        fit: ScaleFit,
    },
    /// Centred crop
    Crop { width: u32, height: u32 },
    /// Per-frame zoom/pan window. Expressions may use `on`, `iw`, `ih`
    /// and `zoom`.
    ZoomPan {
        zoom: String,
        x: String,
        y: String,
        width: u32,
        height: u32,
        fps: u32,
    },
    /// Rotation by an angle expression in radians (may use `t`)
    Rotate { angle: String },
    Fps(u32),
    /// Timebase of `1/fps`
    SetTimebase(u32),
    ResetPts,
    Trim {
        start: Option<f64>,
        duration: Option<f64>,
    },
    /// Hold the last frame for `seconds`
    PadClone { seconds: f64 },
    Format(String),
    Eq { contrast: f64, brightness: f64 },
    GaussianBlur { sigma: f64 },
    Noise { strength: u32 },
    Vignette,
    Subtitles { path: PathBuf },
    Split { outputs: usize },
    Concat { segments: usize },
    Crossfade {
        transition: TransitionStyle,
        duration: f64,
        offset: f64,
    },
    Loudnorm {
        integrated: f64,
        true_peak: f64,
        range: f64,
    },
    Highpass { hz: u32 },
    Lowpass { hz: u32 },
    VolumeDb(f64),
    Resample { rate: u32 },
    FadeOut { start: f64, duration: f64 },
    /// Mix audio inputs, output length follows the first input
    Mix { inputs: usize },
    Limiter { limit: f64 },
}

impl FilterStage {
    /// Lower to ffmpeg filter syntax.
    pub fn to_ffmpeg(&self) -> String {
        match self {
            FilterStage::Scale { width, height, fit } => match fit {
                ScaleFit::Exact => format!("scale={}:{}", width, height),
                ScaleFit::Cover => format!(
                    "scale={}:{}:force_original_aspect_ratio=increase",
                    width, height
                ),
            },
            FilterStage::Crop { width, height } => {
                format!("crop={}:{}:(iw-ow)/2:(ih-oh)/2", width, height)
            }
            FilterStage::ZoomPan {
                zoom,
                x,
                y,
                width,
                height,
                fps,
            } => format!(
                "zoompan=z='{}':x='{}':y='{}':d=1:s={}x{}:fps={}",
                zoom, x, y, width, height, fps
            ),
            FilterStage::Rotate { angle } => format!("rotate=a='{}':c=black", angle),
            FilterStage::Fps(fps) => format!("fps={}", fps),
            FilterStage::SetTimebase(fps) => format!("settb=1/{}", fps),
            FilterStage::ResetPts => "setpts=PTS-STARTPTS".to_string(),
            FilterStage::Trim { start, duration } => {
                let mut s = "trim=".to_string();
                let mut opts = Vec::new();
                if let Some(start) = start {
                    opts.push(format!("start={:.6}", start));
                }
                if let Some(duration) = duration {
                    opts.push(format!("duration={:.6}", duration));
                }
                s.push_str(&opts.join(":"));
                s
            }
            FilterStage::PadClone { seconds } => {
                format!("tpad=stop_mode=clone:stop_duration={:.6}", seconds)
            }
            FilterStage::Format(pix_fmt) => format!("format={}", pix_fmt),
            FilterStage::Eq {
                contrast,
                brightness,
            } => format!("eq=contrast={}:brightness={}", contrast, brightness),
            FilterStage::GaussianBlur { sigma } => format!("gblur=sigma={}:steps=1", sigma),
            FilterStage::Noise { strength } => format!("noise=alls={}:allf=t+u", strength),
            FilterStage::Vignette => "vignette=PI/4".to_string(),
            FilterStage::Subtitles { path } => {
                format!("subtitles=filename='{}'", escape_filter_path(path))
            }
            FilterStage::Split { outputs } => format!("split={}", outputs),
            FilterStage::Concat { segments } => format!("concat=n={}:v=1:a=0", segments),
            FilterStage::Crossfade {
                transition,
                duration,
                offset,
            } => format!(
                "xfade=transition={}:duration={:.6}:offset={:.6}",
                transition.as_xfade_name(),
                duration,
                offset
            ),
            FilterStage::Loudnorm {
                integrated,
                true_peak,
                range,
            } => format!("loudnorm=I={}:TP={}:LRA={}", integrated, true_peak, range),
            FilterStage::Highpass { hz } => format!("highpass=f={}", hz),
            FilterStage::Lowpass { hz } => format!("lowpass=f={}", hz),
            FilterStage::VolumeDb(db) => format!("volume={}dB", db),
            FilterStage::Resample { rate } => format!("aresample={}", rate),
            FilterStage::FadeOut { start, duration } => {
                format!("afade=t=out:st={:.3}:d={:.3}", start, duration)
            }
            FilterStage::Mix { inputs } => {
                format!("amix=inputs={}:duration=first:dropout_transition=0", inputs)
            }
            FilterStage::Limiter { limit } => format!("alimiter=limit={}", limit),
        }
    }
}

/// Escape a path for use inside a quoted filter option.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// A linear run of stages between labelled pads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    inputs: Vec<String>,
    stages: Vec<FilterStage>,
    outputs: Vec<String>,
}

impl FilterChain {
    /// Chain reading from the given pad labels (`0:v`, `v1`, ...).
    pub fn from_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Chain reading from one pad.
    pub fn from_input(input: impl Into<String>) -> Self {
        Self::from_inputs([input.into()])
    }

    /// Chain with no labels, for `-vf`/`-af`.
    pub fn unlabelled() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: FilterStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages<I: IntoIterator<Item = FilterStage>>(mut self, stages: I) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Label the chain's outputs.
    pub fn to_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_output(self, output: impl Into<String>) -> Self {
        self.to_outputs([output.into()])
    }

    /// Lower to ffmpeg syntax, e.g. `[0:v]fps=24,settb=1/24[v0]`.
    pub fn to_ffmpeg(&self) -> String {
        let mut s = String::new();
        for input in &self.inputs {
            let _ = write!(s, "[{}]", input);
        }
        let body = if self.stages.is_empty() {
            "null".to_string()
        } else {
            self.stages
                .iter()
                .map(FilterStage::to_ffmpeg)
                .collect::<Vec<_>>()
                .join(",")
        };
        s.push_str(&body);
        for output in &self.outputs {
            let _ = write!(s, "[{}]", output);
        }
        s
    }
}

/// A complete `-filter_complex` graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chains.push(chain);
        self
    }

    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// All stages in graph order.
    pub fn stages(&self) -> impl Iterator<Item = &FilterStage> {
        self.chains.iter().flat_map(|c| c.stages.iter())
    }

    pub fn to_ffmpeg(&self) -> String {
        self.chains
            .iter()
            .map(FilterChain::to_ffmpeg)
            .collect::<Vec<_>>()
            .join(";")
    }
}
