//! Crossfade transition styles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A crossfade style understood by the transcoder's `xfade` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    Fade,
    Dissolve,
    FadeBlack,
    CircleOpen,
    CircleClose,
    HorzOpen,
    HorzClose,
    VertOpen,
    VertClose,
    Pixelize,
}

impl TransitionStyle {
    /// Pool used between beat segments. Soft blends only.
    pub const SEGMENT_POOL: &'static [TransitionStyle] =
        &[TransitionStyle::Fade, TransitionStyle::Dissolve];

    /// Wider pool for stitching longer sections.
    pub const STITCH_POOL: &'static [TransitionStyle] = &[
        TransitionStyle::Fade,
        TransitionStyle::Dissolve,
        TransitionStyle::CircleOpen,
        TransitionStyle::CircleClose,
        TransitionStyle::HorzOpen,
        TransitionStyle::HorzClose,
        TransitionStyle::VertOpen,
        TransitionStyle::VertClose,
        TransitionStyle::Pixelize,
    ];

    /// Name as written in an `xfade=transition=` argument.
    pub fn as_xfade_name(&self) -> &'static str {
        match self {
            TransitionStyle::Fade => "fade",
            TransitionStyle::Dissolve => "dissolve",
            TransitionStyle::FadeBlack => "fadeblack",
            TransitionStyle::CircleOpen => "circleopen",
            TransitionStyle::CircleClose => "circleclose",
            TransitionStyle::HorzOpen => "horzopen",
            TransitionStyle::HorzClose => "horzclose",
            TransitionStyle::VertOpen => "vertopen",
            TransitionStyle::VertClose => "vertclose",
            TransitionStyle::Pixelize => "pixelize",
        }
    }

    /// Parse a comma-separated list such as `fade,dissolve`.
    pub fn parse_list(s: &str) -> Result<Vec<TransitionStyle>, ParseTransitionError> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_xfade_name())
    }
}

/// Error parsing a transition style.
#[derive(Debug, Error)]
#[error("Unknown transition style: {0}")]
pub struct ParseTransitionError(String);

impl FromStr for TransitionStyle {
    type Err = ParseTransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase().replace('_', "");
        Self::STITCH_POOL
            .iter()
            .chain([TransitionStyle::FadeBlack].iter())
            .copied()
            .find(|t| t.as_xfade_name() == lower)
            .ok_or_else(|| ParseTransitionError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_names() {
        assert_eq!("circle_open".parse::<TransitionStyle>().unwrap(), TransitionStyle::CircleOpen);
        assert_eq!("fadeblack".parse::<TransitionStyle>().unwrap(), TransitionStyle::FadeBlack);
        assert!("wipe".parse::<TransitionStyle>().is_err());
    }

    #[test]
    fn test_parse_list() {
        let pool = TransitionStyle::parse_list("fade, dissolve,pixelize").unwrap();
        assert_eq!(
            pool,
            vec![TransitionStyle::Fade, TransitionStyle::Dissolve, TransitionStyle::Pixelize]
        );
        assert!(TransitionStyle::parse_list("fade,nope").is_err());
    }
}
