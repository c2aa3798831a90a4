//! Structured render logging.
//!
//! Every lifecycle line carries the run id and the pipeline stage so a
//! JSON log can be filtered per run.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Probe,
    Plan,
    Segments,
    Stitch,
    Music,
    Captions,
    Compose,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Probe => "probe",
            Stage::Plan => "plan",
            Stage::Segments => "segments",
            Stage::Stitch => "stitch",
            Stage::Music => "music",
            Stage::Captions => "captions",
            Stage::Compose => "compose",
        }
    }
}

/// Run-scoped logger.
#[derive(Debug, Clone)]
pub struct RenderLogger {
    run_id: String,
}

impl RenderLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage_start(&self, stage: Stage, message: &str) {
        info!(run_id = %self.run_id, stage = stage.as_str(), "Stage started: {}", message);
    }

    pub fn stage_done(&self, stage: Stage, message: &str) {
        info!(run_id = %self.run_id, stage = stage.as_str(), "Stage completed: {}", message);
    }

    pub fn warning(&self, stage: Stage, message: &str) {
        warn!(run_id = %self.run_id, stage = stage.as_str(), "{}", message);
    }

    pub fn failure(&self, message: &str) {
        error!(run_id = %self.run_id, "Render failed: {}", message);
    }

    /// Span covering a whole render.
    pub fn span(&self) -> Span {
        tracing::info_span!("render", run_id = %self.run_id)
    }
}

/// Install the global subscriber: `RUST_LOG` filtering (default
/// `reel=info`), JSON output when `LOG_FORMAT=json`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Targets match by prefix, so `reel` covers every reel_* crate
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reel=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_logger() {
        let logger = RenderLogger::new("2026-03-01_night");
        assert_eq!(logger.run_id(), "2026-03-01_night");
        logger.stage_start(Stage::Plan, "allocating");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Segments.as_str(), "segments");
        assert_eq!(Stage::Compose.as_str(), "compose");
    }
}
