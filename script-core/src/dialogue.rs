//! The `speaker: content` line shape shared by validation and replay.

use once_cell::sync::Lazy;
use regex::Regex;

/// `D: ...`, `JONAH: ...`, `narrator_2: ...`
static SPEAKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+):\s*(.+)$").expect("speaker line pattern must compile")
});

/// Split a trimmed line into `(speaker, content)` if it has the dialogue shape.
pub fn split_speaker(line: &str) -> Option<(&str, &str)> {
    let caps = SPEAKER_LINE.captures(line)?;
    let speaker = caps.get(1)?.as_str();
    let content = caps.get(2)?.as_str();
    Some((speaker, content))
}

/// Trimmed, non-empty lines of `text`.
pub fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}
