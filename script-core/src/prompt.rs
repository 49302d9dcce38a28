//! Prompt assembly: scene + characters + modulation → one generation request.

use crate::controls::PromptParams;
use crate::scene::{Character, Scene};
use crate::validator::forbidden_phrases;

/// Builds dialogue prompts, optionally with extra standing instructions.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    custom_instructions: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom_instructions(mut self, instructions: Option<String>) -> Self {
        self.custom_instructions = instructions.filter(|s| !s.trim().is_empty());
        self
    }

    /// Merge scene, cast and parameters into the full prompt.
    pub fn build(&self, scene: &Scene, params: &PromptParams, characters: &[Character]) -> String {
        let mut prompt = String::new();

        prompt.push_str(include_str!("prompts/dialogue_base.txt"));

        prompt.push_str("\n## Setting\n");
        prompt.push_str(&scene.setting);
        prompt.push('\n');

        prompt.push_str("\n## Characters\n");
        prompt.push_str(&scene.characters.join(", "));
        prompt.push_str(&format_character_voices(characters));
        prompt.push('\n');

        prompt.push_str("\n## Beats\n");
        for beat in &scene.beats {
            prompt.push_str(&format!("- {beat}\n"));
        }

        prompt.push_str("\n## Emotional State\n");
        prompt.push_str(&scene.emotional_state.join(", "));
        prompt.push('\n');

        prompt.push_str("\n## Constraints\n");
        prompt.push_str(&format_constraints(scene, params, characters));

        if let Some(ref custom) = self.custom_instructions {
            prompt.push_str("\n## Additional Instructions\n");
            prompt.push_str(custom);
            prompt.push('\n');
        }

        prompt
    }
}

/// Build a prompt with no extra instructions.
pub fn build_prompt(scene: &Scene, params: &PromptParams, characters: &[Character]) -> String {
    PromptBuilder::new().build(scene, params, characters)
}

/// The constraints block: budgets, modulation values and forbidden language.
pub fn format_constraints(
    scene: &Scene,
    params: &PromptParams,
    characters: &[Character],
) -> String {
    let constraints = &scene.constraints;
    let forbidden = forbidden_phrases(scene, characters);
    let forbidden = if forbidden.is_empty() {
        "none".to_string()
    } else {
        forbidden
            .iter()
            .map(|w| format!("\"{w}\""))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut block = String::new();
    block.push_str(&format!("- Maximum lines: {}\n", constraints.prompt_max_lines()));
    block.push_str(&format!(
        "- Emotional intensity: {:.1}/10\n",
        params.emotional_intensity
    ));
    block.push_str(&format!(
        "- Emotional distance: {:.1}/10\n",
        params.emotional_distance
    ));
    block.push_str(&format!("- Silence density: {:.2}\n", params.silence_density));
    block.push_str(&format!(
        "- Subtext over text: {}\n",
        yes_no(constraints.subtext_over_text)
    ));
    block.push_str(&format!(
        "- No exposition: {}\n",
        yes_no(constraints.no_exposition)
    ));
    block.push_str(&format!("- Forbidden language: {forbidden}\n"));
    block.push('\n');
    block.push_str(include_str!("prompts/constraints_guide.txt"));
    block
}

/// Voice notes and forbidden expressions per character, or empty.
pub fn format_character_voices(characters: &[Character]) -> String {
    let mut lines = Vec::new();
    for c in characters {
        if !c.voice_notes.is_empty() {
            lines.push(format!("- {}: {}", c.display_name(), c.voice_notes));
        }
        if !c.forbidden_expressions.is_empty() {
            lines.push(format!("  Never says: {}", c.forbidden_expressions.join(", ")));
        }
    }
    if lines.is_empty() {
        return String::new();
    }
    format!("\n{}", lines.join("\n"))
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
