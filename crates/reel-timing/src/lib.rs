//! Beat timeline allocation.
//!
//! Turns aligner sentence timestamps and storyboard beats into an ordered,
//! contiguous list of [`TimedBeat`](reel_models::TimedBeat)s that starts at
//! zero and covers the full narration audio.

pub mod allocator;
pub mod error;

pub use allocator::{TimelineAllocator, DEFAULT_COVERAGE_TOLERANCE};
pub use error::{TimingError, TimingResult};
