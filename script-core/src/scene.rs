//! Scene and character records.
//!
//! These mirror the JSON documents under `scripts/scenes` and
//! `scripts/characters`. Records are immutable once loaded.

use serde::{Deserialize, Serialize};

/// Default line budget used in prompts and snapshots when a scene sets none.
pub const DEFAULT_MAX_LINES: u32 = 10;

/// A node in the narrative graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub scene_id: String,

    #[serde(default)]
    pub setting: String,

    /// Story points the dialogue is expected to touch, in order.
    #[serde(default)]
    pub beats: Vec<String>,

    /// Character ids appearing in the scene.
    #[serde(default)]
    pub characters: Vec<String>,

    #[serde(default)]
    pub emotional_state: Vec<String>,

    #[serde(default)]
    pub constraints: Constraints,

    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl Scene {
    /// Create a bare scene with only an id.
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            setting: String::new(),
            beats: Vec::new(),
            characters: Vec::new(),
            emotional_state: Vec::new(),
            constraints: Constraints::default(),
            transitions: Vec::new(),
        }
    }

    pub fn with_setting(mut self, setting: impl Into<String>) -> Self {
        self.setting = setting.into();
        self
    }

    pub fn with_beat(mut self, beat: impl Into<String>) -> Self {
        self.beats.push(beat.into());
        self
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.characters.push(character_id.into());
        self
    }

    pub fn with_emotional_state(mut self, tag: impl Into<String>) -> Self {
        self.emotional_state.push(tag.into());
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_transition(mut self, target: impl Into<String>, kind: impl Into<String>) -> Self {
        self.transitions.push(Transition {
            target: Some(target.into()),
            kind: kind.into(),
        });
        self
    }
}

/// Structural and lexical limits a scene places on its dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Hard ceiling on dialogue lines. `None` means unlimited for validation.
    #[serde(default)]
    pub max_lines: Option<u32>,

    #[serde(default)]
    pub forbidden_words: Vec<String>,

    #[serde(default = "default_true")]
    pub subtext_over_text: bool,

    #[serde(default = "default_true")]
    pub no_exposition: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_lines: None,
            forbidden_words: Vec::new(),
            subtext_over_text: true,
            no_exposition: true,
        }
    }
}

impl Constraints {
    /// Line budget as stated in prompts.
    pub fn prompt_max_lines(&self) -> u32 {
        self.max_lines.unwrap_or(DEFAULT_MAX_LINES)
    }

    pub fn with_max_lines(mut self, max_lines: u32) -> Self {
        self.max_lines = Some(max_lines);
        self
    }

    pub fn with_forbidden_word(mut self, word: impl Into<String>) -> Self {
        self.forbidden_words.push(word.into());
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_transition_kind() -> String {
    "default".to_string()
}

/// A directed edge between scenes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Target scene id. Transitions without one are ignored by navigation.
    #[serde(default)]
    pub target: Option<String>,

    #[serde(rename = "type", default = "default_transition_kind")]
    pub kind: String,
}

/// A speaking character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub character_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub voice_notes: String,

    /// Phrases this character never says.
    #[serde(default)]
    pub forbidden_expressions: Vec<String>,
}

impl Character {
    pub fn new(character_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            character_id: character_id.into(),
            name: name.into(),
            voice_notes: String::new(),
            forbidden_expressions: Vec::new(),
        }
    }

    pub fn with_voice_notes(mut self, notes: impl Into<String>) -> Self {
        self.voice_notes = notes.into();
        self
    }

    pub fn with_forbidden_expression(mut self, phrase: impl Into<String>) -> Self {
        self.forbidden_expressions.push(phrase.into());
        self
    }

    /// Name used in prompts, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.character_id
        } else {
            &self.name
        }
    }
}
