#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the reel render pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a typed filter-graph layer
//! - Progress parsing from `-progress pipe:2`
//! - Deterministic camera motion for still images
//! - Segment rendering, crossfade stitching and final composition
//! - Word-timed ASS captions

pub mod captions;
pub mod command;
pub mod compose;
pub mod error;
pub mod filtergraph;
pub mod fs_utils;
pub mod motion;
pub mod probe;
pub mod progress;
pub mod segment;
pub mod stitch;

pub use captions::{group_words, render_ass, write_captions, Caption};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{plan_compose, ComposePlan, ComposeRequest, Compositor, FinalRender};
pub use error::{MediaError, MediaResult};
pub use filtergraph::{FilterChain, FilterGraph, FilterStage, ScaleFit};
pub use fs_utils::{move_file, recreate_dir, staging_path, write_json_atomic};
pub use motion::{
    build_motion, seeded_rng, strategy_for, LinearKenBurns, MotionMode, MotionSpec,
    MotionStrategy, ShotContext, SmoothKenBurns,
};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use segment::{RenderedSegment, SegmentRenderer, SegmentRequest};
pub use stitch::{choose_transitions, plan_crossfade, StitchedTrack, Stitcher};
