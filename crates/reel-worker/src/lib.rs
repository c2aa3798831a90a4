//! Render driver for narrated still-image reels.
//!
//! This crate provides:
//! - Environment configuration
//! - Run directory artifact loading
//! - Music bed selection
//! - The plan / render pipeline
//! - Structured run logging

pub mod artifacts;
pub mod config;
pub mod error;
pub mod logging;
pub mod music;
pub mod pipeline;

pub use artifacts::RunDir;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, RenderLogger, Stage};
pub use pipeline::{RenderOutcome, RenderPipeline};
