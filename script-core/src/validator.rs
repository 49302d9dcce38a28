//! Post-generation checks against a scene's constraints.
//!
//! Hard constraints (line budget, forbidden phrases) produce errors and make
//! the text invalid. Beat coverage is soft and only ever warns.

use crate::dialogue::{non_blank_lines, split_speaker};
use crate::scene::{Character, Scene};
use serde::{Deserialize, Serialize};

/// Beat words this short are ignored when looking for coverage.
const MIN_BEAT_WORD_LEN: usize = 3;

/// Verdict for one piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Number of `speaker: content` lines.
    pub line_count: usize,
}

/// Count the dialogue lines in `text`. Lines without a speaker are ignored.
pub fn dialogue_line_count(text: &str) -> usize {
    non_blank_lines(text)
        .filter(|line| split_speaker(line).is_some())
        .count()
}

/// Scene forbidden words plus every cast member's forbidden expressions.
pub fn forbidden_phrases<'a>(scene: &'a Scene, characters: &'a [Character]) -> Vec<&'a str> {
    scene
        .constraints
        .forbidden_words
        .iter()
        .chain(characters.iter().flat_map(|c| c.forbidden_expressions.iter()))
        .map(String::as_str)
        .filter(|phrase| !phrase.is_empty())
        .collect()
}

/// Check `text` against `scene` and the characters present in it.
pub fn validate(text: &str, scene: &Scene, characters: &[Character]) -> Validation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let line_count = dialogue_line_count(text);

    if let Some(max_lines) = scene.constraints.max_lines {
        if line_count > max_lines as usize {
            errors.push(format!("Too many lines: {line_count} (max {max_lines})"));
        }
    }

    let text_lower = text.to_lowercase();

    for beat in &scene.beats {
        let beat_lower = beat.to_lowercase();
        let touched = beat_lower
            .split_whitespace()
            .filter(|word| word.chars().count() >= MIN_BEAT_WORD_LEN)
            .any(|word| text_lower.contains(word));
        if !touched {
            warnings.push(format!("Beat '{beat}' may be missing or weakly represented"));
        }
    }

    for phrase in forbidden_phrases(scene, characters) {
        if text_lower.contains(&phrase.to_lowercase()) {
            errors.push(format!("Forbidden phrase: '{}'", phrase.to_lowercase()));
        }
    }

    Validation {
        valid: errors.is_empty(),
        errors,
        warnings,
        line_count,
    }
}
