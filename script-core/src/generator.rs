//! The generate → validate → retry loop.
//!
//! A prompt is built once, then the model is called up to [`MAX_ATTEMPTS`]
//! times. After each invalid attempt a retry hint naming the errors is
//! appended to the prompt. The last attempt is accepted whether or not it
//! validates; [`Outcome`] records which.

use crate::controls::{default_emotional_params, ModulationParams, ParamMap, PromptParams};
use crate::model::{call_with_fallback, DialogueModel, DialogueSource, ModelError};
use crate::prompt::PromptBuilder;
use crate::scene::{Character, Scene};
use crate::validator::{validate, Validation};
use crate::versions::{ConstraintMap, VersionError, VersionStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Model calls per generation, including the first.
pub const MAX_ATTEMPTS: usize = 3;

/// Errors from a generation run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Generation failed: {0}")]
    Model(#[from] ModelError),

    #[error("Could not save version: {0}")]
    Version(#[from] VersionError),
}

/// How a generation run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The final attempt passed validation.
    Accepted,
    /// Every attempt failed; the last one was kept anyway.
    AcceptedAfterExhaustion { errors: Vec<String> },
    /// Only the prompt was built.
    DryRun,
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }
}

/// One model call and its validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: usize,
    pub source: DialogueSource,
    pub validation: Validation,
}

/// Everything a generation run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The final prompt, including any retry hints.
    pub prompt: String,
    pub dialogue: String,
    pub scene_id: String,
    pub emotional_params: ParamMap,
    pub constraints_snapshot: ConstraintMap,
    pub outcome: Outcome,
    /// Validation of the final attempt; absent on a dry run.
    pub validation: Option<Validation>,
    pub attempts: Vec<AttemptRecord>,
    /// Saved version, when dialogue was produced and persisted.
    pub version_id: Option<String>,
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub modulation: Option<ModulationParams>,
    pub dry_run: bool,
    pub parent_version_id: Option<String>,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modulation(mut self, modulation: ModulationParams) -> Self {
        self.modulation = Some(modulation);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_parent(mut self, parent_version_id: impl Into<String>) -> Self {
        self.parent_version_id = Some(parent_version_id.into());
        self
    }
}

/// Runs generation for scenes, optionally persisting results.
pub struct Generator {
    model: Option<Arc<dyn DialogueModel>>,
    prompts: PromptBuilder,
    versions: Option<VersionStore>,
}

impl Generator {
    /// A generator with no model (placeholder dialogue) and no persistence.
    pub fn new() -> Self {
        Self {
            model: None,
            prompts: PromptBuilder::new(),
            versions: None,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn DialogueModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_optional_model(mut self, model: Option<Arc<dyn DialogueModel>>) -> Self {
        self.model = model;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_version_store(mut self, versions: VersionStore) -> Self {
        self.versions = Some(versions);
        self
    }

    /// Generate dialogue for `scene` with its resolved `characters`.
    pub async fn generate(
        &self,
        scene: &Scene,
        characters: &[Character],
        options: &GenerateOptions,
    ) -> Result<GenerationResult, GenerateError> {
        let prompt_params = options
            .modulation
            .map(|m| m.to_prompt_params())
            .unwrap_or_default();
        let mut prompt = self.prompts.build(scene, &prompt_params, characters);

        if options.dry_run {
            tracing::debug!(scene_id = %scene.scene_id, "dry run, skipping model call");
            return Ok(GenerationResult {
                prompt,
                dialogue: String::new(),
                scene_id: scene.scene_id.clone(),
                emotional_params: ParamMap::new(),
                constraints_snapshot: ConstraintMap::new(),
                outcome: Outcome::DryRun,
                validation: None,
                attempts: Vec::new(),
                version_id: None,
            });
        }

        let mut attempts = Vec::with_capacity(MAX_ATTEMPTS);
        let mut dialogue = String::new();
        let mut validation = Validation::default();

        for attempt in 1..=MAX_ATTEMPTS {
            tracing::debug!(scene_id = %scene.scene_id, attempt, "calling model");
            let reply = call_with_fallback(self.model.as_deref(), &prompt, Some(scene)).await?;
            validation = validate(&reply.text, scene, characters);
            attempts.push(AttemptRecord {
                attempt,
                source: reply.source,
                validation: validation.clone(),
            });
            dialogue = reply.text;

            if validation.valid || attempt == MAX_ATTEMPTS {
                break;
            }
            tracing::debug!(
                scene_id = %scene.scene_id,
                attempt,
                errors = ?validation.errors,
                "attempt failed validation, retrying"
            );
            prompt.push_str(&retry_hint(attempt + 1, &validation.errors));
        }

        let outcome = if validation.valid {
            Outcome::Accepted
        } else {
            tracing::warn!(
                scene_id = %scene.scene_id,
                errors = ?validation.errors,
                "retries exhausted, keeping last attempt"
            );
            Outcome::AcceptedAfterExhaustion {
                errors: validation.errors.clone(),
            }
        };

        let emotional_params = reported_params(options.modulation.as_ref(), &prompt_params);
        let constraints_snapshot = constraints_snapshot(scene);

        let version_id = match self.versions {
            Some(ref store) if !dialogue.is_empty() => Some(
                store
                    .save_version(
                        &scene.scene_id,
                        &dialogue,
                        constraints_snapshot.clone(),
                        emotional_params.clone(),
                        options.parent_version_id.clone(),
                    )
                    .await?,
            ),
            _ => None,
        };

        Ok(GenerationResult {
            prompt,
            dialogue,
            scene_id: scene.scene_id.clone(),
            emotional_params,
            constraints_snapshot,
            outcome,
            validation: Some(validation),
            attempts,
            version_id,
        })
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

/// The hint appended before attempt `next` of [`MAX_ATTEMPTS`].
pub fn retry_hint(next: usize, errors: &[String]) -> String {
    format!(
        "\n\n[RETRY {next}/{MAX_ATTEMPTS}]: Previous output had issues: {}. Please fix.",
        errors.join("; ")
    )
}

/// Constraint values recorded with a version.
pub fn constraints_snapshot(scene: &Scene) -> ConstraintMap {
    let c = &scene.constraints;
    let mut snapshot = ConstraintMap::new();
    snapshot.insert("max_lines".to_string(), c.prompt_max_lines().into());
    snapshot.insert("no_exposition".to_string(), c.no_exposition.into());
    snapshot.insert("subtext_over_text".to_string(), c.subtext_over_text.into());
    snapshot
}

fn reported_params(modulation: Option<&ModulationParams>, params: &PromptParams) -> ParamMap {
    match modulation {
        Some(_) => params.normalized(),
        None => default_emotional_params(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Constraints;
    use crate::testing::ScriptedModel;

    fn scene() -> Scene {
        Scene::new("kitchen")
            .with_character("D")
            .with_character("J")
            .with_beat("letter")
            .with_constraints(Constraints::default().with_max_lines(2))
    }

    #[test]
    fn test_retry_hint_format() {
        let hint = retry_hint(2, &["Too many lines: 3 (max 2)".into(), "x".into()]);
        assert_eq!(
            hint,
            "\n\n[RETRY 2/3]: Previous output had issues: Too many lines: 3 (max 2); x. Please fix."
        );
    }

    #[test]
    fn test_constraints_snapshot_defaults() {
        let snapshot = constraints_snapshot(&Scene::new("x"));
        assert_eq!(snapshot["max_lines"], serde_json::json!(10));
        assert_eq!(snapshot["no_exposition"], serde_json::json!(true));
        assert_eq!(snapshot["subtext_over_text"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_dry_run_builds_prompt_only() {
        let model = Arc::new(ScriptedModel::always("D: letter"));
        let generator = Generator::new().with_model(model.clone());
        let result = generator
            .generate(&scene(), &[], &GenerateOptions::new().with_dry_run(true))
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::DryRun);
        assert!(!result.prompt.is_empty());
        assert_eq!(result.dialogue, "");
        assert!(result.emotional_params.is_empty());
        assert!(result.constraints_snapshot.is_empty());
        assert!(result.validation.is_none());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_valid_first_attempt() {
        let model = Arc::new(ScriptedModel::always("D: The letter.\nJ: What letter?"));
        let generator = Generator::new().with_model(model.clone());
        let result = generator
            .generate(&scene(), &[], &GenerateOptions::new())
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Accepted);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(model.calls(), 1);
        assert!(!result.prompt.contains("[RETRY"));
        assert_eq!(result.emotional_params["tension"], 0.5);
        assert_eq!(result.version_id, None);
    }

    #[tokio::test]
    async fn test_retry_then_accept() {
        let model = Arc::new(ScriptedModel::new([
            "D: The letter.\nJ: No.\nD: Yes.",
            "D: The letter.\nJ: No.",
        ]));
        let generator = Generator::new().with_model(model.clone());
        let result = generator
            .generate(&scene(), &[], &GenerateOptions::new())
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Accepted);
        assert_eq!(result.attempts.len(), 2);
        assert!(!result.attempts[0].validation.valid);
        assert!(result.attempts[1].validation.valid);

        let prompts = model.prompts();
        assert!(prompts[1].starts_with(&prompts[0]));
        assert!(prompts[1]
            .contains("[RETRY 2/3]: Previous output had issues: Too many lines: 3 (max 2)"));
        assert_eq!(result.prompt, prompts[1]);
    }

    #[tokio::test]
    async fn test_modulation_is_normalized() {
        let model = Arc::new(ScriptedModel::always("D: letter"));
        let generator = Generator::new().with_model(model);
        let options = GenerateOptions::new().with_modulation(ModulationParams::new(1.0, 0.0, 0.6));
        let result = generator.generate(&scene(), &[], &options).await.unwrap();

        assert!((result.emotional_params["tension"] - 1.0).abs() < 1e-9);
        assert!((result.emotional_params["emotional_distance"] - 0.1).abs() < 1e-9);
        assert!((result.emotional_params["silence_density"] - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_model_uses_placeholder() {
        let result = Generator::new()
            .generate(&Scene::new("s").with_beat("one"), &[], &GenerateOptions::new())
            .await
            .unwrap();
        assert_eq!(result.dialogue, "D: [Generated for 'one']");
        assert_eq!(result.attempts[0].source, DialogueSource::Fallback);
        assert_eq!(result.outcome, Outcome::Accepted);
    }
}
