//! Shared data models for the reel render pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Narration timing produced by the aligner
//! - Storyboard beats, microbeats and camera hints
//! - Timed beats and the timing plan artifact
//! - Crossfade transition styles
//! - Render and encoding configuration

pub mod beat;
pub mod encoding;
pub mod narration;
pub mod render_config;
pub mod timing_plan;
pub mod transition;

// Re-export common types
pub use beat::{
    AttentionWeight, Beat, BeatId, CameraAngle, CameraDistance, CameraHint, Microbeat,
    MicrobeatId, Storyboard, TimingScope,
};
pub use encoding::EncodingConfig;
pub use narration::{NarrationSpan, NarrationTiming, NarrationWord};
pub use render_config::{
    AttentionWeights, CaptionConfig, ConfigError, GlitchConfig, GradeConfig, MixConfig,
    MotionConfig, MotionStyle, MusicBedConfig, RenderConfig,
};
pub use timing_plan::{TimedBeat, TimingPlan, TIMING_PLAN_SCHEMA, TIMING_PLAN_VERSION};
pub use transition::TransitionStyle;
