//! Camera motion synthesis for still images.
//!
//! A [`MotionStrategy`] turns `(duration, seed)` into a [`MotionSpec`]: an
//! abstract zoom curve, pan path and optional jitter/weave, all functions of
//! the output frame index. A `MotionSpec` can be evaluated directly (tests, other
//! backends) or lowered to filter stages with [`MotionSpec::to_stages`].
//!
//! Every call seeds its own RNG from the seed string, so re-rendering one
//! segment never changes the motion of another.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use reel_models::{CameraDistance, CameraHint, MotionConfig, MotionStyle, RenderConfig};

use crate::filtergraph::{FilterStage, ScaleFit};

/// Extra size rendered before a weave rotation so the corners stay filled.
const WEAVE_MARGIN: f64 = 1.02;

/// Overscale added at full intensity.
const OVERSCALE_ESCALATION: f64 = 0.03;

/// Deterministic RNG for a seed string.
///
/// The ChaCha8 stream for a given key is fixed across rand releases.
pub fn seeded_rng(seed: &str) -> ChaCha8Rng {
    let mut key = [0u8; 32];
    key.copy_from_slice(&Sha256::digest(seed.as_bytes()));
    ChaCha8Rng::from_seed(key)
}

/// `p²(3-2p)` on `[0, 1]`.
pub fn smoothstep(p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    p * p * (3.0 - 2.0 * p)
}

/// Number of output frames for a duration, `ceil(duration * fps)`.
pub fn frame_count(duration_seconds: f64, fps: u32) -> u64 {
    // Guard against 4.0 * 24 landing a hair above 96
    ((duration_seconds * fps as f64) - 1e-9).ceil().max(1.0) as u64
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn even(x: f64) -> u32 {
    ((x / 2.0).round() * 2.0).max(2.0) as u32
}

fn smooth_expr(p: &str) -> String {
    format!("({p}*{p}*(3-2*{p}))", p = p)
}

/// The kind of camera move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionMode {
    PushIn,
    PullOut,
    PanLateral,
    PanVertical,
    PanDiagonal,
    /// Quick zoom then settle back
    Punch,
    /// Constant-rate zoom with a slow circular drift
    KenBurns,
}

impl MotionMode {
    /// Default pool. Push-in is listed twice to make it the most common move.
    pub const POOL: &'static [MotionMode] = &[
        MotionMode::PushIn,
        MotionMode::PushIn,
        MotionMode::PanLateral,
        MotionMode::PanVertical,
        MotionMode::PanDiagonal,
        MotionMode::PullOut,
        MotionMode::Punch,
    ];

    const CLOSE_POOL: &'static [MotionMode] =
        &[MotionMode::PushIn, MotionMode::PushIn, MotionMode::Punch];

    const WIDE_POOL: &'static [MotionMode] = &[
        MotionMode::PullOut,
        MotionMode::PanLateral,
        MotionMode::PanVertical,
        MotionMode::PanDiagonal,
    ];

    /// Pool narrowed by a framing hint.
    pub fn pool_for(camera: Option<CameraHint>) -> &'static [MotionMode] {
        match camera.and_then(|c| c.distance) {
            Some(CameraDistance::Close) => Self::CLOSE_POOL,
            Some(CameraDistance::Wide) => Self::WIDE_POOL,
            Some(CameraDistance::Medium) | None => Self::POOL,
        }
    }
}

/// Zoom factor as a function of progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoomCurve {
    /// Smoothstep from `from` to `to`
    Eased { from: f64, to: f64 },
    /// Smoothstep up to `peak` by `cut`, then linear to `settle`
    Punch {
        from: f64,
        peak: f64,
        settle: f64,
        cut: f64,
    },
    /// `from + per_frame * frame`, capped at `max`
    Linear { from: f64, per_frame: f64, max: f64 },
}

impl ZoomCurve {
    fn at(&self, p: f64, frame: u64) -> f64 {
        match *self {
            ZoomCurve::Eased { from, to } => lerp(from, to, smoothstep(p)),
            ZoomCurve::Punch {
                from,
                peak,
                settle,
                cut,
            } => {
                if p <= cut {
                    lerp(from, peak, smoothstep(p / cut))
                } else {
                    lerp(peak, settle, (p - cut) / (1.0 - cut))
                }
            }
            ZoomCurve::Linear {
                from,
                per_frame,
                max,
            } => (from + per_frame * frame as f64).min(max),
        }
    }

    fn expr(&self, p: &str) -> String {
        match *self {
            ZoomCurve::Eased { from, to } => {
                format!("{:.5}+({:.5})*{}", from, to - from, smooth_expr(p))
            }
            ZoomCurve::Punch {
                from,
                peak,
                settle,
                cut,
            } => {
                let q = format!("({}/{})", p, cut);
                format!(
                    "if(lte({p},{cut}),{from:.5}+({rise:.5})*{s},{peak:.5}+({fall:.5})*(({p}-{cut})/(1-{cut})))",
                    p = p,
                    cut = cut,
                    from = from,
                    rise = peak - from,
                    s = smooth_expr(&q),
                    peak = peak,
                    fall = settle - peak,
                )
            }
            ZoomCurve::Linear {
                from,
                per_frame,
                max,
            } => format!("min({:.5}+{:.8}*on,{:.5})", from, per_frame, max),
        }
    }
}

/// Eased pan travel, centred on the frame.
///
/// `dx`/`dy` are the total travel as a signed fraction of the frame size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanPath {
    pub dx: f64,
    pub dy: f64,
}

impl PanPath {
    pub const STATIC: PanPath = PanPath { dx: 0.0, dy: 0.0 };

    /// Offset from centre at progress `p`, as a fraction of the frame.
    pub fn at(&self, p: f64) -> (f64, f64) {
        let t = smoothstep(p) - 0.5;
        (self.dx * t, self.dy * t)
    }

    pub fn is_static(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0
    }
}

/// Small positional noise in output pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Jitter {
    /// Two detuned sinusoids per axis
    Handheld {
        amplitude: f64,
        fx: (f64, f64),
        fy: (f64, f64),
    },
    /// Slow ellipse with separate periods (in frames) per axis
    Circular {
        amplitude: f64,
        period_x: f64,
        period_y: f64,
    },
}

impl Jitter {
    /// Secondary sinusoid weight for handheld jitter.
    const SECONDARY: f64 = 0.6;

    pub fn at(&self, frame: u64) -> (f64, f64) {
        let on = frame as f64;
        match *self {
            Jitter::Handheld { amplitude, fx, fy } => (
                (on * fx.0).sin() * amplitude + (on * fx.1).sin() * amplitude * Self::SECONDARY,
                (on * fy.0).cos() * amplitude + (on * fy.1).cos() * amplitude * Self::SECONDARY,
            ),
            Jitter::Circular {
                amplitude,
                period_x,
                period_y,
            } => (
                amplitude * (std::f64::consts::TAU * on / period_x).sin(),
                amplitude * (std::f64::consts::TAU * on / period_y).cos(),
            ),
        }
    }

    fn exprs(&self) -> (String, String) {
        match *self {
            Jitter::Handheld { amplitude, fx, fy } => {
                let a2 = amplitude * Self::SECONDARY;
                (
                    format!(
                        "sin(on*{:.5})*{:.2}+sin(on*{:.5})*{:.2}",
                        fx.0, amplitude, fx.1, a2
                    ),
                    format!(
                        "cos(on*{:.5})*{:.2}+cos(on*{:.5})*{:.2}",
                        fy.0, amplitude, fy.1, a2
                    ),
                )
            }
            Jitter::Circular {
                amplitude,
                period_x,
                period_y,
            } => (
                format!("{:.2}*sin(2*PI*on/{:.1})", amplitude, period_x),
                format!("{:.2}*cos(2*PI*on/{:.1})", amplitude, period_y),
            ),
        }
    }
}

/// Slow film-gate rotation applied after the zoom/pan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateWeave {
    /// Peak angle in radians
    pub amplitude: f64,
    pub frequency_hz: f64,
}

/// A complete camera move over a fixed number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSpec {
    pub mode: MotionMode,
    pub frames: u64,
    pub fps: u32,
    /// Source overscale that gives pans and jitter room to move
    pub overscale: f64,
    pub zoom: ZoomCurve,
    pub pan: PanPath,
    pub jitter: Option<Jitter>,
    pub weave: Option<GateWeave>,
}

impl MotionSpec {
    /// Normalized progress `frame / (frames - 1)`.
    pub fn progress(&self, frame: u64) -> f64 {
        if self.frames <= 1 {
            return 0.0;
        }
        (frame as f64 / (self.frames - 1) as f64).min(1.0)
    }

    /// Zoompan factor on the overscaled source at `frame`.
    pub fn zoom_at(&self, frame: u64) -> f64 {
        self.zoom.at(self.progress(frame), frame)
    }

    /// Pan offset from centre at `frame`, as a fraction of the frame.
    pub fn pan_at(&self, frame: u64) -> (f64, f64) {
        self.pan.at(self.progress(frame))
    }

    /// Jitter offset at `frame`, in output pixels.
    pub fn jitter_at(&self, frame: u64) -> (f64, f64) {
        self.jitter.as_ref().map(|j| j.at(frame)).unwrap_or((0.0, 0.0))
    }

    /// Rendered duration, `frames / fps`.
    pub fn duration(&self) -> f64 {
        self.frames as f64 / self.fps as f64
    }

    /// Lower to filter stages producing a `width`x`height` picture.
    pub fn to_stages(&self, width: u32, height: u32) -> Vec<FilterStage> {
        let src_w = even(width as f64 * self.overscale);
        let src_h = even(height as f64 * self.overscale);
        let (out_w, out_h) = match self.weave {
            Some(_) => (even(width as f64 * WEAVE_MARGIN), even(height as f64 * WEAVE_MARGIN)),
            None => (width, height),
        };

        let denom = self.frames.saturating_sub(1).max(1);
        let p = format!("min(on/{},1)", denom);

        // The source is already overscaled, so zoompan gets the bare curve
        let zoom = self.zoom.expr(&p);

        let (jitter_x, jitter_y) = self
            .jitter
            .as_ref()
            .map(Jitter::exprs)
            .unwrap_or_else(|| ("0".to_string(), "0".to_string()));
        let pan_term = |travel: f64, size: u32| {
            if travel == 0.0 {
                "0".to_string()
            } else {
                format!("{:.2}*({}-0.5)", travel * size as f64, smooth_expr(&p))
            }
        };
        let x = format!(
            "(iw-iw/zoom)/2+{}+({})",
            pan_term(self.pan.dx, width),
            jitter_x
        );
        let y = format!(
            "(ih-ih/zoom)/2+{}+({})",
            pan_term(self.pan.dy, height),
            jitter_y
        );

        let mut stages = vec![
            FilterStage::Scale {
                width: src_w,
                height: src_h,
                fit: ScaleFit::Cover,
            },
            FilterStage::Crop {
                width: src_w,
                height: src_h,
            },
            FilterStage::ZoomPan {
                zoom,
                x,
                y,
                width: out_w,
                height: out_h,
                fps: self.fps,
            },
        ];

        if let Some(weave) = self.weave {
            stages.push(FilterStage::Rotate {
                angle: format!(
                    "{:.6}*sin(2*PI*t*{:.3})",
                    weave.amplitude, weave.frequency_hz
                ),
            });
            stages.push(FilterStage::Crop { width, height });
        }

        stages
    }
}

/// Per-shot context beyond the seed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShotContext {
    /// Position of the segment in the render, drives intensity escalation
    pub segment_index: usize,
    pub camera: Option<CameraHint>,
}

/// A motion style. New styles are added by implementing this trait.
pub trait MotionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the motion for one shot. Must be a pure function of its inputs.
    fn build(&self, duration_seconds: f64, seed: &str, shot: &ShotContext) -> MotionSpec;
}

/// Pick the strategy configured for a render.
pub fn strategy_for(config: &RenderConfig) -> Box<dyn MotionStrategy> {
    match config.motion.style {
        MotionStyle::Smooth => Box::new(SmoothKenBurns::new(config.motion.clone(), config.fps)),
        MotionStyle::Linear => Box::new(LinearKenBurns::new(config.motion.clone(), config.fps)),
    }
}

/// Motion for a shot with no extra context.
pub fn build_motion(config: &RenderConfig, duration_seconds: f64, seed: &str) -> MotionSpec {
    strategy_for(config).build(duration_seconds, seed, &ShotContext::default())
}

/// Mode-based eased moves with handheld drift and rising intensity.
#[derive(Debug, Clone)]
pub struct SmoothKenBurns {
    config: MotionConfig,
    fps: u32,
}

impl SmoothKenBurns {
    pub fn new(config: MotionConfig, fps: u32) -> Self {
        Self { config, fps }
    }

    /// 0 for the first segment, 1 once `escalation_segments` have passed.
    fn intensity(&self, segment_index: usize) -> f64 {
        if self.config.escalation_segments == 0 {
            return 1.0;
        }
        (segment_index as f64 / self.config.escalation_segments as f64).min(1.0)
    }
}

impl MotionStrategy for SmoothKenBurns {
    fn name(&self) -> &'static str {
        "smooth"
    }

    fn build(&self, duration_seconds: f64, seed: &str, shot: &ShotContext) -> MotionSpec {
        let cfg = &self.config;
        let mut rng = seeded_rng(seed);
        let i = self.intensity(shot.segment_index);

        let pool = MotionMode::pool_for(shot.camera);
        let mode = pool[rng.random_range(0..pool.len())];

        let z_max = lerp(cfg.max_zoom, cfg.max_zoom_escalated, i);
        let z_min = (cfg.min_zoom + (cfg.max_zoom_escalated - cfg.max_zoom) * i).min(z_max);
        let travel = lerp(cfg.pan_fraction, cfg.pan_fraction_escalated, i);
        let sx = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let sy = if rng.random_bool(0.5) { 1.0 } else { -1.0 };

        // Pans keep the zoom flatter
        let pan_zoom = ZoomCurve::Eased {
            from: lerp(z_min, z_max, 0.35),
            to: lerp(z_min, z_max, 0.55),
        };

        let (zoom, pan) = match mode {
            MotionMode::PushIn | MotionMode::KenBurns => (
                ZoomCurve::Eased {
                    from: z_min,
                    to: z_max,
                },
                PanPath::STATIC,
            ),
            MotionMode::PullOut => (
                ZoomCurve::Eased {
                    from: z_max,
                    to: z_min,
                },
                PanPath::STATIC,
            ),
            MotionMode::PanLateral => (
                pan_zoom,
                PanPath {
                    dx: sx * travel,
                    dy: 0.0,
                },
            ),
            MotionMode::PanVertical => (
                pan_zoom,
                PanPath {
                    dx: 0.0,
                    dy: sy * travel * 0.8,
                },
            ),
            MotionMode::PanDiagonal => (
                pan_zoom,
                PanPath {
                    dx: sx * travel * 0.7,
                    dy: sy * travel * 0.56,
                },
            ),
            MotionMode::Punch => (
                ZoomCurve::Punch {
                    from: z_min,
                    peak: z_max,
                    settle: lerp(z_min, z_max, 0.6),
                    cut: 0.25,
                },
                PanPath::STATIC,
            ),
        };

        let amplitude = 6.0 + (10.0 * i).floor() + rng.random_range(0..=6) as f64;
        let fx = (
            0.010 + rng.random::<f64>() * 0.020,
            0.017 + rng.random::<f64>() * 0.025,
        );
        let fy = (
            0.012 + rng.random::<f64>() * 0.020,
            0.019 + rng.random::<f64>() * 0.025,
        );
        let weave = GateWeave {
            amplitude: 0.0020 + 0.0015 * i + rng.random::<f64>() * 0.0010,
            frequency_hz: 0.45 + rng.random::<f64>() * 0.35,
        };

        MotionSpec {
            mode,
            frames: frame_count(duration_seconds, self.fps),
            fps: self.fps,
            overscale: cfg.overscale + OVERSCALE_ESCALATION * i,
            zoom,
            pan,
            jitter: cfg
                .handheld
                .then_some(Jitter::Handheld { amplitude, fx, fy }),
            weave: cfg.gate_weave.then_some(weave),
        }
    }
}

/// Classic constant-rate zoom with a slow circular drift.
#[derive(Debug, Clone)]
pub struct LinearKenBurns {
    config: MotionConfig,
    fps: u32,
}

impl LinearKenBurns {
    const DRIFT_PX: f64 = 10.0;
    const DRIFT_PERIOD_X: f64 = 240.0;
    const DRIFT_PERIOD_Y: f64 = 300.0;

    pub fn new(config: MotionConfig, fps: u32) -> Self {
        Self { config, fps }
    }
}

impl MotionStrategy for LinearKenBurns {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn build(&self, duration_seconds: f64, seed: &str, _shot: &ShotContext) -> MotionSpec {
        let mut rng = seeded_rng(seed);
        let direction = if rng.random_bool(0.5) { 1.0 } else { -1.0 };

        MotionSpec {
            mode: MotionMode::KenBurns,
            frames: frame_count(duration_seconds, self.fps),
            fps: self.fps,
            overscale: self.config.overscale,
            zoom: ZoomCurve::Linear {
                from: 1.0,
                per_frame: self.config.zoom_per_second / self.fps as f64,
                max: self.config.max_zoom,
            },
            pan: PanPath::STATIC,
            jitter: Some(Jitter::Circular {
                amplitude: Self::DRIFT_PX * direction,
                period_x: Self::DRIFT_PERIOD_X,
                period_y: Self::DRIFT_PERIOD_Y,
            }),
            weave: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smooth() -> SmoothKenBurns {
        SmoothKenBurns::new(MotionConfig::default(), 24)
    }

    fn shot(segment_index: usize) -> ShotContext {
        ShotContext {
            segment_index,
            camera: None,
        }
    }

    #[test]
    fn test_seeded_rng_stream() {
        let a: Vec<u64> = (0..4).map({
            let mut rng = seeded_rng("run|b001|motion");
            move |_| rng.random()
        }).collect();
        let b: Vec<u64> = (0..4).map({
            let mut rng = seeded_rng("run|b001|motion");
            move |_| rng.random()
        }).collect();
        assert_eq!(a, b);

        let mut other = seeded_rng("run|b002|motion");
        assert_ne!(a[0], other.random::<u64>());
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(4.0, 24), 96);
        assert_eq!(frame_count(2.01, 24), 49);
        assert_eq!(frame_count(0.0, 24), 1);
    }

    #[test]
    fn test_smoothstep() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(smoothstep(2.0), 1.0);
    }

    #[test]
    fn test_same_seed_same_motion() {
        let a = smooth().build(3.2, "run1|b004|motion", &shot(4));
        let b = smooth().build(3.2, "run1|b004|motion", &shot(4));
        assert_eq!(a, b);
        assert_eq!(a.to_stages(1080, 1920), b.to_stages(1080, 1920));
    }

    #[test]
    fn test_seeds_vary_modes() {
        let modes: std::collections::HashSet<_> = (0..40)
            .map(|n| smooth().build(3.0, &format!("run|b{:03}|motion", n), &shot(n)).mode)
            .collect();
        assert!(modes.len() >= 3, "{:?}", modes);
    }

    #[test]
    fn test_amplitudes_stay_in_bounds() {
        let cfg = MotionConfig::default();
        for n in 0..60 {
            let spec = smooth().build(2.5, &format!("bounds|{}", n), &shot(n));
            for frame in 0..spec.frames {
                let z = spec.zoom_at(frame);
                assert!(z >= 1.0 && z <= cfg.max_zoom_escalated + 1e-9, "zoom {}", z);
                let (px, py) = spec.pan_at(frame);
                assert!(px.abs() <= cfg.pan_fraction_escalated / 2.0 + 1e-9);
                assert!(py.abs() <= cfg.pan_fraction_escalated / 2.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_first_segment_is_gentlest() {
        let cfg = MotionConfig::default();
        for n in 0..20 {
            let spec = smooth().build(2.0, &format!("gentle|{}", n), &shot(0));
            for frame in 0..spec.frames {
                assert!(spec.zoom_at(frame) <= cfg.max_zoom + 1e-9);
            }
            assert!((spec.overscale - cfg.overscale).abs() < 1e-12);
        }
    }

    #[test]
    fn test_close_hint_limits_pool() {
        let close = Some(CameraHint {
            distance: Some(CameraDistance::Close),
            angle: None,
        });
        for n in 0..30 {
            let spec = smooth().build(
                2.0,
                &format!("close|{}", n),
                &ShotContext {
                    segment_index: n,
                    camera: close,
                },
            );
            assert!(matches!(spec.mode, MotionMode::PushIn | MotionMode::Punch));
            assert!(spec.pan.is_static());
        }
    }

    #[test]
    fn test_push_in_eases_between_bounds() {
        let spec = MotionSpec {
            mode: MotionMode::PushIn,
            frames: 49,
            fps: 24,
            overscale: 1.14,
            zoom: ZoomCurve::Eased {
                from: 1.015,
                to: 1.06,
            },
            pan: PanPath::STATIC,
            jitter: None,
            weave: None,
        };
        assert!((spec.zoom_at(0) - 1.015).abs() < 1e-12);
        assert!((spec.zoom_at(24) - 1.0375).abs() < 1e-12);
        assert!((spec.zoom_at(48) - 1.06).abs() < 1e-12);
        // Eased: the first step is smaller than a linear step would be
        assert!(spec.zoom_at(1) - spec.zoom_at(0) < (1.06 - 1.015) / 48.0);
    }

    #[test]
    fn test_punch_peaks_then_settles() {
        let curve = ZoomCurve::Punch {
            from: 1.015,
            peak: 1.06,
            settle: 1.04,
            cut: 0.25,
        };
        assert!((curve.at(0.25, 0) - 1.06).abs() < 1e-12);
        assert!((curve.at(1.0, 0) - 1.04).abs() < 1e-12);
        assert!(curve.at(0.6, 0) < 1.06 && curve.at(0.6, 0) > 1.04);
    }

    #[test]
    fn test_linear_strategy() {
        let strategy = LinearKenBurns::new(MotionConfig::default(), 24);
        let spec = strategy.build(12.0, "kb", &ShotContext::default());
        assert_eq!(spec.mode, MotionMode::KenBurns);
        let mut last = 0.0;
        for frame in 0..spec.frames {
            let z = spec.zoom_at(frame);
            assert!(z >= last && z <= 1.06 + 1e-12);
            last = z;
        }
        assert!((last - 1.06).abs() < 1e-12);
    }

    /// Evaluates the subset of ffmpeg expression syntax emitted for zoom.
    fn eval_expr(expr: &str, on: f64) -> f64 {
        struct Parser<'a> {
            s: &'a [u8],
            i: usize,
            on: f64,
        }

        impl Parser<'_> {
            fn peek(&self) -> Option<u8> {
                self.s.get(self.i).copied()
            }

            fn eat(&mut self, c: u8) {
                assert_eq!(self.peek(), Some(c), "at {}", self.i);
                self.i += 1;
            }

            fn sum(&mut self) -> f64 {
                let mut v = self.product();
                while let Some(c @ (b'+' | b'-')) = self.peek() {
                    self.i += 1;
                    let rhs = self.product();
                    v = if c == b'+' { v + rhs } else { v - rhs };
                }
                v
            }

            fn product(&mut self) -> f64 {
                let mut v = self.atom();
                while let Some(c @ (b'*' | b'/')) = self.peek() {
                    self.i += 1;
                    let rhs = self.atom();
                    v = if c == b'*' { v * rhs } else { v / rhs };
                }
                v
            }

            fn args(&mut self) -> Vec<f64> {
                self.eat(b'(');
                let mut args = vec![self.sum()];
                while self.peek() == Some(b',') {
                    self.i += 1;
                    args.push(self.sum());
                }
                self.eat(b')');
                args
            }

            fn atom(&mut self) -> f64 {
                match self.peek() {
                    Some(b'(') => {
                        self.i += 1;
                        let v = self.sum();
                        self.eat(b')');
                        v
                    }
                    Some(b'-') => {
                        self.i += 1;
                        -self.atom()
                    }
                    Some(c) if c.is_ascii_digit() || c == b'.' => {
                        let start = self.i;
                        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
                            self.i += 1;
                        }
                        std::str::from_utf8(&self.s[start..self.i])
                            .unwrap()
                            .parse()
                            .unwrap()
                    }
                    _ => {
                        let start = self.i;
                        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
                            self.i += 1;
                        }
                        let name = std::str::from_utf8(&self.s[start..self.i]).unwrap().to_string();
                        match name.as_str() {
                            "on" => self.on,
                            "PI" => std::f64::consts::PI,
                            "min" => {
                                let a = self.args();
                                a[0].min(a[1])
                            }
                            "lte" => {
                                let a = self.args();
                                if a[0] <= a[1] { 1.0 } else { 0.0 }
                            }
                            "if" => {
                                let a = self.args();
                                if a[0] != 0.0 { a[1] } else { a[2] }
                            }
                            other => panic!("unsupported name {:?} in {}", other, std::str::from_utf8(self.s).unwrap()),
                        }
                    }
                }
            }
        }

        let mut parser = Parser {
            s: expr.as_bytes(),
            i: 0,
            on,
        };
        let v = parser.sum();
        assert_eq!(parser.i, expr.len(), "trailing input in {}", expr);
        v
    }

    fn lowered_zoom(spec: &MotionSpec) -> String {
        spec.to_stages(1080, 1920)
            .into_iter()
            .find_map(|stage| match stage {
                FilterStage::ZoomPan { zoom, .. } => Some(zoom),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_lowered_zoom_matches_curve() {
        let push_in = MotionSpec {
            mode: MotionMode::PushIn,
            frames: 49,
            fps: 24,
            overscale: 1.14,
            zoom: ZoomCurve::Eased {
                from: 1.015,
                to: 1.06,
            },
            pan: PanPath::STATIC,
            jitter: None,
            weave: None,
        };
        let punch = MotionSpec {
            mode: MotionMode::Punch,
            zoom: ZoomCurve::Punch {
                from: 1.015,
                peak: 1.06,
                settle: 1.04,
                cut: 0.25,
            },
            ..push_in.clone()
        };
        let linear = LinearKenBurns::new(MotionConfig::default(), 24).build(
            6.0,
            "kb",
            &ShotContext::default(),
        );

        for spec in [push_in, punch, linear] {
            let zoom = lowered_zoom(&spec);
            let last = spec.frames - 1;
            for frame in [0, last / 3, last] {
                let rendered = eval_expr(&zoom, frame as f64);
                assert!(
                    (rendered - spec.zoom_at(frame)).abs() < 1e-4,
                    "{:?} frame {}: rendered {} vs {}",
                    spec.mode,
                    frame,
                    rendered,
                    spec.zoom_at(frame)
                );
            }
        }
    }

    #[test]
    fn test_lowered_zoom_stays_in_bounds() {
        let cfg = MotionConfig::default();
        for n in 0..30 {
            let spec = smooth().build(2.5, &format!("lowered|{}", n), &shot(n));
            let zoom = lowered_zoom(&spec);
            for frame in [0, spec.frames - 1] {
                let z = eval_expr(&zoom, frame as f64);
                assert!(z >= 1.0 - 1e-4 && z <= cfg.max_zoom_escalated + 1e-4, "zoom {}", z);
            }
        }
    }

    #[test]
    fn test_lowering_to_stages() {
        let spec = smooth().build(4.0, "lower", &shot(12));
        let stages = spec.to_stages(1080, 1920);

        assert!(matches!(
            stages[0],
            FilterStage::Scale {
                fit: ScaleFit::Cover,
                ..
            }
        ));
        let FilterStage::ZoomPan { zoom, x, fps, .. } = &stages[2] else {
            panic!("expected zoompan, got {:?}", stages[2]);
        };
        assert!(zoom.contains("on/95"));
        assert!(x.starts_with("(iw-iw/zoom)/2"));
        assert_eq!(*fps, 24);

        assert!(matches!(stages[3], FilterStage::Rotate { .. }));
        assert_eq!(
            stages.last(),
            Some(&FilterStage::Crop {
                width: 1080,
                height: 1920
            })
        );
    }

    #[test]
    fn test_toggles_remove_jitter_and_weave() {
        let cfg = MotionConfig {
            handheld: false,
            gate_weave: false,
            ..Default::default()
        };
        let spec = SmoothKenBurns::new(cfg, 24).build(2.0, "plain", &shot(3));
        assert!(spec.jitter.is_none());
        assert!(spec.weave.is_none());
        let stages = spec.to_stages(1080, 1920);
        assert_eq!(stages.len(), 3);
        assert!(matches!(
            stages[2],
            FilterStage::ZoomPan {
                width: 1080,
                height: 1920,
                ..
            }
        ));
    }

    #[test]
    fn test_strategy_for_config() {
        let mut config = RenderConfig::default();
        assert_eq!(strategy_for(&config).name(), "smooth");
        config.motion.style = MotionStyle::Linear;
        assert_eq!(strategy_for(&config).name(), "linear");
        assert_eq!(build_motion(&config, 1.0, "x").frames, 24);
    }
}
