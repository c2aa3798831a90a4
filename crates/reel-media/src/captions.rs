//! Word-timed caption generation (ASS subtitles).

use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use reel_models::{CaptionConfig, NarrationWord};

use crate::error::MediaResult;

/// One on-screen caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Group consecutive words into captions of at most `per_caption` words.
///
/// Blank words are skipped. A caption runs from its first word's start to
/// its last word's end.
pub fn group_words(words: &[NarrationWord], per_caption: usize) -> Vec<Caption> {
    let spoken: Vec<&NarrationWord> = words.iter().filter(|w| !w.word.trim().is_empty()).collect();

    spoken
        .chunks(per_caption.max(1))
        .filter_map(|chunk| {
            let first = chunk.first()?;
            let last = chunk.last()?;
            Some(Caption {
                start: first.start,
                end: last.end.max(first.start),
                text: chunk
                    .iter()
                    .map(|w| w.word.trim())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
        })
        .collect()
}

/// ASS timestamp, `h:mm:ss.cc`.
fn ass_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let (cs, total_s) = (total_cs % 100, total_cs / 100);
    format!(
        "{}:{:02}:{:02}.{:02}",
        total_s / 3600,
        (total_s / 60) % 60,
        total_s % 60,
        cs
    )
}

fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}

/// Render a complete ASS script for a `width`x`height` frame.
pub fn render_ass(captions: &[Caption], style: &CaptionConfig, width: u32, height: u32) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "[Script Info]");
    let _ = writeln!(s, "ScriptType: v4.00+");
    let _ = writeln!(s, "PlayResX: {}", width);
    let _ = writeln!(s, "PlayResY: {}", height);
    let _ = writeln!(s, "WrapStyle: 0");
    let _ = writeln!(s, "ScaledBorderAndShadow: yes");
    let _ = writeln!(s);
    let _ = writeln!(s, "[V4+ Styles]");
    let _ = writeln!(
        s,
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
    );
    let _ = writeln!(
        s,
        "Style: Default,{},{},&H00FFFFFF,&H00000000,&H80000000,&H80000000,1,0,0,0,100,100,0,0,1,{},{},{},10,10,{},1",
        style.font, style.font_size, style.outline, style.shadow, style.alignment, style.margin_v
    );
    let _ = writeln!(s);
    let _ = writeln!(s, "[Events]");
    let _ = writeln!(
        s,
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
    );
    for caption in captions {
        let _ = writeln!(
            s,
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            ass_timestamp(caption.start),
            ass_timestamp(caption.end),
            escape_ass_text(&caption.text.to_uppercase())
        );
    }
    s
}

/// Group `words` and write the ASS script to `path`.
///
/// Returns `None` when there are no words to caption.
pub async fn write_captions(
    path: &Path,
    words: &[NarrationWord],
    style: &CaptionConfig,
    width: u32,
    height: u32,
) -> MediaResult<Option<usize>> {
    let captions = group_words(words, style.words_per_caption);
    if captions.is_empty() {
        return Ok(None);
    }
    tokio::fs::write(path, render_ass(&captions, style, width, height)).await?;
    info!(
        path = %path.display(),
        captions = captions.len(),
        "Wrote captions"
    );
    Ok(Some(captions.len()))
}
