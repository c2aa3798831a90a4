//! Worker configuration.
//!
//! Everything the render reads from the environment is resolved here, once,
//! into a validated [`RenderConfig`] plus the worker's own paths.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use reel_models::{MotionStyle, RenderConfig, TransitionStyle};

use crate::error::{WorkerError, WorkerResult};

/// Default runs root, relative to the working directory.
pub const DEFAULT_RUNS_DIR: &str = "runs";
/// Default music library, relative to the working directory.
pub const DEFAULT_MUSIC_DIR: &str = "assets/music/horror_shorts";
/// Default crossfade length in frames.
pub const DEFAULT_XFADE_FRAMES: u32 = 2;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub render: RenderConfig,
    /// Root holding one directory per run
    pub runs_dir: PathBuf,
    /// Directory scanned for music beds
    pub music_dir: PathBuf,
    /// Makes music selection deterministic when set
    pub music_seed: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            runs_dir: PathBuf::from(DEFAULT_RUNS_DIR),
            music_dir: PathBuf::from(DEFAULT_MUSIC_DIR),
            music_seed: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let mut render = RenderConfig::default();

        if let Some(w) = vars.parse("RENDER_W")? {
            render.width = w;
        }
        if let Some(h) = vars.parse("RENDER_H")? {
            render.height = h;
        }
        if let Some(fps) = vars.parse("RENDER_FPS")? {
            render.fps = fps;
        }
        if render.fps == 0 {
            return Err(WorkerError::config("RENDER_FPS must be positive"));
        }

        let xfade_frames: u32 = vars.parse("RENDER_XFADE_FRAMES")?.unwrap_or(DEFAULT_XFADE_FRAMES);
        render.crossfade_duration = match vars.parse::<f64>("RENDER_XFADE_DUR")? {
            Some(seconds) => seconds,
            None => xfade_frames as f64 / render.fps as f64,
        };
        if let Some(pool) = vars.get("RENDER_TRANSITIONS") {
            render.segment_transitions = TransitionStyle::parse_list(&pool)
                .map_err(|e| WorkerError::config(format!("RENDER_TRANSITIONS: {}", e)))?;
        }

        if let Some(style) = vars.get("RENDER_MOTION") {
            render.motion.style = match style.trim().to_lowercase().as_str() {
                "smooth" => MotionStyle::Smooth,
                "linear" => MotionStyle::Linear,
                other => {
                    return Err(WorkerError::config(format!(
                        "RENDER_MOTION: expected smooth or linear, got {:?}",
                        other
                    )))
                }
            };
        }
        if let Some(zoom) = vars.parse("RENDER_KB_MAX_ZOOM")? {
            render.motion.max_zoom = zoom;
            render.motion.max_zoom_escalated = render.motion.max_zoom_escalated.max(zoom);
        }
        if let Some(pan) = vars.parse("RENDER_PAN_PCT")? {
            render.motion.pan_fraction = pan;
            render.motion.pan_fraction_escalated = render.motion.pan_fraction_escalated.max(pan);
        }

        if let Some(enabled) = vars.flag("RENDER_MUSIC_ENABLED")? {
            render.music.enabled = enabled;
        }
        if let Some(gain) = vars.parse("RENDER_MUSIC_GAIN_DB")? {
            render.music.gain_db = gain;
        }
        if let Some(hz) = vars.parse("RENDER_MUSIC_HP_HZ")? {
            render.music.highpass_hz = hz;
        }
        if let Some(hz) = vars.parse("RENDER_MUSIC_LP_HZ")? {
            render.music.lowpass_hz = hz;
        }

        if let Some(enabled) = vars.flag("RENDER_CAPTIONS_ENABLED")? {
            render.captions.enabled = enabled;
        }
        if let Some(grain) = vars.parse("RENDER_GRAIN")? {
            render.grade.grain = grain;
        }
        if let Some(vignette) = vars.flag("RENDER_VIGNETTE")? {
            render.grade.vignette = vignette;
        }
        if vars.flag("RENDER_NVENC")?.unwrap_or(false) {
            render.encoding = std::mem::take(&mut render.encoding).with_nvenc();
        }
        if let Some(crf) = vars.parse("RENDER_CRF")? {
            render.encoding.crf = crf;
        }
        if let Some(parallel) = vars.parse("RENDER_MAX_PARALLEL")? {
            render.max_parallel_segments = parallel;
        }
        if let Some(timeout) = vars.parse("RENDER_FFMPEG_TIMEOUT")? {
            render.ffmpeg_timeout_secs = timeout;
        }

        render.validate()?;

        Ok(Self {
            render,
            runs_dir: vars
                .get("REEL_RUNS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNS_DIR)),
            music_dir: vars
                .get("RENDER_MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MUSIC_DIR)),
            music_seed: vars.get("RENDER_MUSIC_SEED"),
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str) -> WorkerResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| WorkerError::config(format!("{}={:?}: {}", key, raw, e)))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> WorkerResult<Option<bool>> {
        self.get(key)
            .map(|raw| match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(WorkerError::config(format!(
                    "{}={:?}: expected 1 or 0",
                    key, raw
                ))),
            })
            .transpose()
    }
}
