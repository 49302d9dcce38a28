//! Line-by-line playback of saved dialogue.
//!
//! Each line is held for a time derived from its word count, stretched on
//! short or trailing-ellipsis lines in proportion to the silence density,
//! and divided by the pace.

use crate::dialogue::{non_blank_lines, split_speaker};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Speaker given to lines without a `speaker:` prefix.
pub const UNKNOWN_SPEAKER: &str = "?";

/// Lines shorter than this read as a pause.
const SHORT_LINE_CHARS: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    #[error("Pace must be positive and finite, got {0}")]
    InvalidPace(f64),

    #[error("Words per minute must be non-zero")]
    InvalidWordsPerMinute,

    #[error("Silence density must be finite, got {0}")]
    InvalidSilenceDensity(f64),
}

/// One parsed line of dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: String,
    pub line: String,
}

impl std::fmt::Display for DialogueLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.speaker, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// 2.0 plays twice as fast.
    pub pace: f64,
    pub silence_density: f64,
    pub words_per_minute: u32,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            pace: 1.0,
            silence_density: 0.3,
            words_per_minute: 120,
        }
    }
}

impl ReplaySettings {
    pub fn with_pace(mut self, pace: f64) -> Self {
        self.pace = pace;
        self
    }

    pub fn with_silence_density(mut self, density: f64) -> Self {
        self.silence_density = density;
        self
    }

    pub fn with_words_per_minute(mut self, wpm: u32) -> Self {
        self.words_per_minute = wpm;
        self
    }

    pub fn check(&self) -> Result<(), ReplayError> {
        if !self.pace.is_finite() || self.pace <= 0.0 {
            return Err(ReplayError::InvalidPace(self.pace));
        }
        if self.words_per_minute == 0 {
            return Err(ReplayError::InvalidWordsPerMinute);
        }
        if !self.silence_density.is_finite() {
            return Err(ReplayError::InvalidSilenceDensity(self.silence_density));
        }
        Ok(())
    }
}

/// Split text into speaker lines; unprefixed lines get [`UNKNOWN_SPEAKER`].
pub fn parse_dialogue(text: &str) -> Vec<DialogueLine> {
    non_blank_lines(text)
        .map(|raw| match split_speaker(raw) {
            Some((speaker, line)) => DialogueLine {
                speaker: speaker.to_string(),
                line: line.to_string(),
            },
            None => DialogueLine {
                speaker: UNKNOWN_SPEAKER.to_string(),
                line: raw.to_string(),
            },
        })
        .collect()
}

/// Seconds to speak `line` at `words_per_minute`, counting at least one word.
pub fn base_duration(line: &str, words_per_minute: u32) -> f64 {
    let words = line.split_whitespace().count().max(1);
    words as f64 / words_per_minute as f64 * 60.0
}

pub fn silence_multiplier(line: &str, silence_density: f64) -> f64 {
    if line.is_empty() || silence_density <= 0.0 {
        return 1.0;
    }
    let mut multiplier = 1.0;
    if line.chars().count() < SHORT_LINE_CHARS {
        multiplier += silence_density * 1.5;
    }
    if line.trim_end().ends_with("...") {
        multiplier += silence_density * 2.0;
    }
    multiplier
}

/// Seconds to hold `line` after emitting it.
pub fn line_delay(line: &str, settings: &ReplaySettings) -> f64 {
    base_duration(line, settings.words_per_minute)
        * silence_multiplier(line, settings.silence_density)
        / settings.pace
}

/// Every line with its delay, without sleeping.
pub fn schedule(
    text: &str,
    settings: &ReplaySettings,
) -> Result<Vec<(DialogueLine, Duration)>, ReplayError> {
    settings.check()?;
    Ok(parse_dialogue(text)
        .into_iter()
        .map(|line| {
            let delay = line_delay(&line.line, settings);
            (line, Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX))
        })
        .collect())
}

/// Play `text` back, calling `sink(line, index, total)` before each pause.
///
/// Returns the number of lines played.
pub async fn replay<F>(
    text: &str,
    settings: &ReplaySettings,
    mut sink: F,
) -> Result<usize, ReplayError>
where
    F: FnMut(&DialogueLine, usize, usize),
{
    let lines = schedule(text, settings)?;
    let total = lines.len();
    for (index, (line, delay)) in lines.iter().enumerate() {
        sink(line, index, total);
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }
    }
    Ok(total)
}
