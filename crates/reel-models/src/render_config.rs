//! Render configuration.
//!
//! A [`RenderConfig`] is built once per render invocation and handed to every
//! component by reference. Components never read the environment themselves.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::beat::AttentionWeight;
use crate::encoding::EncodingConfig;
use crate::transition::TransitionStyle;

/// Longest allowed first-segment glitch hook, in seconds.
pub const MAX_GLITCH_DURATION: f64 = 0.35;

/// Invalid configuration value.
#[derive(Debug, Error)]
#[error("Invalid render config `{field}`: {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Numeric weights for each attention category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttentionWeights {
    pub light: f64,
    pub normal: f64,
    pub heavy: f64,
}

impl Default for AttentionWeights {
    fn default() -> Self {
        Self {
            light: 0.6,
            normal: 1.0,
            heavy: 1.6,
        }
    }
}

impl AttentionWeights {
    pub fn weight(&self, attention: AttentionWeight) -> f64 {
        match attention {
            AttentionWeight::Light => self.light,
            AttentionWeight::Normal => self.normal,
            AttentionWeight::Heavy => self.heavy,
        }
    }
}

/// Which motion synthesizer to use for stills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionStyle {
    /// Mode-based eased camera moves with handheld drift
    #[default]
    Smooth,
    /// Constant zoom-rate Ken Burns with a slow circular drift
    Linear,
}

/// Camera motion bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MotionConfig {
    pub style: MotionStyle,
    /// Zoom at the loose end of a push/pull
    pub min_zoom: f64,
    /// Zoom at the tight end of a push/pull for the first segment
    pub max_zoom: f64,
    /// Tight-end zoom once intensity has fully escalated
    pub max_zoom_escalated: f64,
    /// Pan travel as a fraction of the frame for the first segment
    pub pan_fraction: f64,
    /// Pan travel once intensity has fully escalated
    pub pan_fraction_escalated: f64,
    /// Source overscale so moves never reveal edges
    pub overscale: f64,
    /// Number of segments over which intensity ramps from 0 to 1
    pub escalation_segments: u32,
    /// Add sinusoidal handheld drift to the pan position
    pub handheld: bool,
    /// Add a slow rotational weave after the zoom/pan
    pub gate_weave: bool,
    /// Zoom rate used by [`MotionStyle::Linear`], per second
    pub zoom_per_second: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            style: MotionStyle::Smooth,
            min_zoom: 1.015,
            max_zoom: 1.06,
            max_zoom_escalated: 1.07,
            pan_fraction: 0.05,
            pan_fraction_escalated: 0.10,
            overscale: 1.14,
            escalation_segments: 12,
            handheld: true,
            gate_weave: true,
            zoom_per_second: 0.010,
        }
    }
}

/// Music bed processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MusicBedConfig {
    pub enabled: bool,
    /// Gain applied after normalization, in dB
    pub gain_db: f64,
    pub highpass_hz: u32,
    pub lowpass_hz: u32,
    /// Integrated loudness target (LUFS)
    pub loudness_target: f64,
    /// True-peak ceiling (dBTP)
    pub true_peak: f64,
    /// Loudness range target (LU)
    pub loudness_range: f64,
}

impl Default for MusicBedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gain_db: -10.0,
            highpass_hz: 100,
            lowpass_hz: 7000,
            loudness_target: -24.0,
            true_peak: -2.0,
            loudness_range: 11.0,
        }
    }
}

/// Final audio mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MixConfig {
    /// Narration fade-out starts this many seconds before the end
    pub fade_out_lead: f64,
    pub fade_out_duration: f64,
    /// Limiter ceiling (linear, 0-1)
    pub limiter: f64,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            fade_out_lead: 0.4,
            fade_out_duration: 0.35,
            limiter: 0.98,
        }
    }
}

/// First-segment attention hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GlitchConfig {
    pub enabled: bool,
    pub duration: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub blur_sigma: f64,
}

impl Default for GlitchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: 0.30,
            contrast: 1.8,
            brightness: -0.15,
            blur_sigma: 8.0,
        }
    }
}

/// Finishing grade applied to the composed picture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradeConfig {
    /// Film grain strength, 0 disables
    pub grain: f64,
    pub vignette: bool,
}

/// Burned-in caption styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionConfig {
    pub enabled: bool,
    pub words_per_caption: usize,
    pub font: String,
    pub font_size: u32,
    /// ASS numpad alignment (5 = centre)
    pub alignment: u8,
    pub margin_v: u32,
    pub outline: u32,
    pub shadow: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            words_per_caption: 4,
            font: "Bebas Neue".to_string(),
            font_size: 200,
            alignment: 5,
            margin_v: 0,
            outline: 6,
            shadow: 6,
        }
    }
}

/// Everything a render needs to know about output format and effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Crossfade length between segments, in seconds
    pub crossfade_duration: f64,
    pub segment_transitions: Vec<TransitionStyle>,
    /// When false every junction uses a plain fade
    pub enable_transitions: bool,
    pub motion: MotionConfig,
    pub weights: AttentionWeights,
    /// Fraction of the spoken duration the beat timeline must reach
    pub coverage_tolerance: f64,
    pub music: MusicBedConfig,
    pub mix: MixConfig,
    pub glitch: GlitchConfig,
    pub grade: GradeConfig,
    pub captions: CaptionConfig,
    pub encoding: EncodingConfig,
    pub ffmpeg_timeout_secs: u64,
    pub max_parallel_segments: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 24,
            crossfade_duration: 2.0 / 24.0,
            segment_transitions: TransitionStyle::SEGMENT_POOL.to_vec(),
            enable_transitions: true,
            motion: MotionConfig::default(),
            weights: AttentionWeights::default(),
            coverage_tolerance: 0.98,
            music: MusicBedConfig::default(),
            mix: MixConfig::default(),
            glitch: GlitchConfig::default(),
            grade: GradeConfig::default(),
            captions: CaptionConfig::default(),
            encoding: EncodingConfig::default(),
            ffmpeg_timeout_secs: 1800,
            max_parallel_segments: 4,
        }
    }
}

impl RenderConfig {
    /// Duration of one output frame.
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// `WxH` size string.
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Transition pool actually used by the stitcher.
    pub fn transition_pool(&self) -> Vec<TransitionStyle> {
        if self.enable_transitions {
            self.segment_transitions.clone()
        } else {
            vec![TransitionStyle::Fade]
        }
    }

    /// Glitch hook length, capped at [`MAX_GLITCH_DURATION`].
    pub fn glitch_duration(&self) -> f64 {
        self.glitch.duration.clamp(0.0, MAX_GLITCH_DURATION)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::new("width/height", "frame size must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ConfigError::new(
                "width/height",
                format!("{} must have even dimensions for yuv420p", self.size()),
            ));
        }
        if self.fps == 0 {
            return Err(ConfigError::new("fps", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.crossfade_duration) {
            return Err(ConfigError::new(
                "crossfade_duration",
                format!("{} is outside [0, 1)", self.crossfade_duration),
            ));
        }
        if self.segment_transitions.is_empty() {
            return Err(ConfigError::new("segment_transitions", "pool is empty"));
        }
        for (name, w) in [
            ("light", self.weights.light),
            ("normal", self.weights.normal),
            ("heavy", self.weights.heavy),
        ] {
            if !(w > 0.0) {
                return Err(ConfigError::new("weights", format!("{} weight must be > 0, got {}", name, w)));
            }
        }
        if !(self.coverage_tolerance > 0.0 && self.coverage_tolerance <= 1.0) {
            return Err(ConfigError::new(
                "coverage_tolerance",
                format!("{} is outside (0, 1]", self.coverage_tolerance),
            ));
        }
        if self.motion.min_zoom < 1.0 || self.motion.max_zoom < self.motion.min_zoom {
            return Err(ConfigError::new(
                "motion",
                format!(
                    "zoom bounds must satisfy 1 <= min ({}) <= max ({})",
                    self.motion.min_zoom, self.motion.max_zoom
                ),
            ));
        }
        if self.motion.max_zoom_escalated < self.motion.max_zoom {
            return Err(ConfigError::new("motion", "max_zoom_escalated is below max_zoom"));
        }
        if self.motion.overscale < 1.0 {
            return Err(ConfigError::new("motion", "overscale must be >= 1"));
        }
        if self.captions.words_per_caption == 0 {
            return Err(ConfigError::new("captions", "words_per_caption must be >= 1"));
        }
        if self.max_parallel_segments == 0 {
            return Err(ConfigError::new("max_parallel_segments", "must be >= 1"));
        }
        if !(self.mix.limiter > 0.0 && self.mix.limiter <= 1.0) {
            return Err(ConfigError::new("mix", "limiter must be in (0, 1]"));
        }
        Ok(())
    }
}
