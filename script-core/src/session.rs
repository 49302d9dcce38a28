//! One entry point for the CLI and the HTTP API.
//!
//! Every call reloads scenes and characters from disk; nothing is cached
//! between requests.

use crate::config::ScriptConfig;
use crate::controls::ModulationParams;
use crate::diff::{diff_versions, VersionDiff};
use crate::generator::{GenerateError, GenerateOptions, GenerationResult, Generator};
use crate::graph::{self, DanglingTransition, ScenePath};
use crate::model::{ClaudeModel, DialogueModel};
use crate::prompt::PromptBuilder;
use crate::replay::{self, DialogueLine, ReplayError, ReplaySettings};
use crate::scene::{Character, Scene};
use crate::store::{load_characters, load_scenes, SceneSet, StoreError};
use crate::versions::{Version, VersionError, VersionStore, VersionSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Version reference that resolves to the newest version of a scene.
pub const LATEST: &str = "latest";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Version not found: {scene_id} / {version_id}")]
    VersionNotFound {
        scene_id: String,
        version_id: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Replay(#[from] ReplayError),
}

impl SessionError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SessionError::SceneNotFound(_) | SessionError::VersionNotFound { .. }
        )
    }
}

/// An outgoing transition, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextScene {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A generation request against a scene id.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub scene_id: String,
    pub modulation: Option<ModulationParams>,
    pub dry_run: bool,
    pub parent_version_id: Option<String>,
}

impl GenerateRequest {
    pub fn new(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            ..Self::default()
        }
    }

    pub fn with_modulation(mut self, modulation: ModulationParams) -> Self {
        self.modulation = Some(modulation);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_parent(mut self, parent_version_id: Option<String>) -> Self {
        self.parent_version_id = parent_version_id;
        self
    }
}

/// A living-script workspace: scene definitions, version history and an
/// optional model.
pub struct LivingScript {
    config: ScriptConfig,
    model: Option<Arc<dyn DialogueModel>>,
}

impl LivingScript {
    /// A session without a model; generation uses placeholder dialogue.
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// A session using Claude when `ANTHROPIC_API_KEY` is set.
    pub fn from_config(config: ScriptConfig) -> Self {
        let model =
            ClaudeModel::from_env(&config).map(|m| Arc::new(m) as Arc<dyn DialogueModel>);
        match model {
            Some(ref m) => tracing::info!(model = m.name(), "using Claude for generation"),
            None => {
                tracing::info!("ANTHROPIC_API_KEY not set, generation uses placeholder dialogue")
            }
        }
        Self { config, model }
    }

    pub fn with_model(mut self, model: Arc<dyn DialogueModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn version_store(&self) -> VersionStore {
        VersionStore::new(self.config.versions_dir())
    }

    pub async fn scenes(&self) -> Result<SceneSet, SessionError> {
        Ok(load_scenes(self.config.scenes_dir()).await?)
    }

    pub async fn scene(&self, scene_id: &str) -> Result<Scene, SessionError> {
        self.scenes()
            .await?
            .get(scene_id)
            .cloned()
            .ok_or_else(|| SessionError::SceneNotFound(scene_id.to_string()))
    }

    /// Characters appearing in `scene`, in the scene's order.
    pub async fn characters_for(&self, scene: &Scene) -> Result<Vec<Character>, SessionError> {
        let characters = load_characters(self.config.characters_dir()).await?;
        Ok(characters.for_scene(scene))
    }

    /// Transitions pointing at scenes that do not exist.
    pub async fn transition_warnings(&self) -> Result<Vec<DanglingTransition>, SessionError> {
        let warnings = graph::validate_transitions(&self.scenes().await?);
        for warning in &warnings {
            tracing::warn!(
                source = %warning.source,
                target = %warning.target,
                "dangling transition"
            );
        }
        Ok(warnings)
    }

    pub async fn next_scenes(&self, scene_id: &str) -> Result<Vec<NextScene>, SessionError> {
        let scene = self.scene(scene_id).await?;
        Ok(graph::next_scenes(&scene)
            .into_iter()
            .map(|(target, kind)| NextScene {
                target: target.to_string(),
                kind: kind.to_string(),
            })
            .collect())
    }

    /// Every path through the graph starting at `scene_id`.
    pub async fn paths(&self, scene_id: &str) -> Result<Vec<ScenePath>, SessionError> {
        let scenes = self.scenes().await?;
        if !scenes.contains(scene_id) {
            return Err(SessionError::SceneNotFound(scene_id.to_string()));
        }
        Ok(graph::traverse(&scenes, scene_id))
    }

    /// Run generation and, unless it is a dry run, save the dialogue.
    pub async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerationResult, SessionError> {
        let scene = self.scene(&request.scene_id).await?;
        let characters = self.characters_for(&scene).await?;

        let generator = Generator::new()
            .with_optional_model(self.model.clone())
            .with_prompt_builder(
                PromptBuilder::new()
                    .with_custom_instructions(self.config.custom_instructions.clone()),
            )
            .with_version_store(self.version_store());

        let options = GenerateOptions {
            modulation: request.modulation,
            dry_run: request.dry_run,
            parent_version_id: request.parent_version_id,
        };
        Ok(generator.generate(&scene, &characters, &options).await?)
    }

    pub async fn versions(&self, scene_id: &str) -> Result<Vec<VersionSummary>, SessionError> {
        Ok(self.version_store().list_versions(scene_id).await?)
    }

    /// Load a version by id, or the newest one for [`LATEST`].
    pub async fn version(&self, scene_id: &str, version_id: &str) -> Result<Version, SessionError> {
        if version_id == LATEST {
            return self.latest_version(scene_id).await;
        }
        self.version_store()
            .load_version(scene_id, version_id)
            .await?
            .ok_or_else(|| SessionError::VersionNotFound {
                scene_id: scene_id.to_string(),
                version_id: version_id.to_string(),
            })
    }

    pub async fn latest_version(&self, scene_id: &str) -> Result<Version, SessionError> {
        self.version_store()
            .latest_version(scene_id)
            .await?
            .ok_or_else(|| SessionError::VersionNotFound {
                scene_id: scene_id.to_string(),
                version_id: LATEST.to_string(),
            })
    }

    pub async fn diff(
        &self,
        scene_id: &str,
        old_version_id: &str,
        new_version_id: &str,
    ) -> Result<VersionDiff, SessionError> {
        let old = self.version(scene_id, old_version_id).await?;
        let new = self.version(scene_id, new_version_id).await?;
        Ok(diff_versions(&old, &new))
    }

    /// Settings for replaying `version`.
    ///
    /// Silence density comes from `silence`, then the version's own
    /// parameters, then the default.
    pub fn replay_settings(version: &Version, pace: f64, silence: Option<f64>) -> ReplaySettings {
        let defaults = ReplaySettings::default();
        let silence_density = silence
            .or_else(|| version.emotional_params.get("silence_density").copied())
            .unwrap_or(defaults.silence_density);
        defaults.with_pace(pace).with_silence_density(silence_density)
    }

    /// Replay a saved version through `sink`. Returns the lines played.
    pub async fn replay_version<F>(
        &self,
        scene_id: &str,
        version_id: &str,
        pace: f64,
        silence: Option<f64>,
        sink: F,
    ) -> Result<usize, SessionError>
    where
        F: FnMut(&DialogueLine, usize, usize),
    {
        let version = self.version(scene_id, version_id).await?;
        let settings = Self::replay_settings(&version, pace, silence);
        Ok(replay::replay(&version.text, &settings, sink).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_fixture, ScriptedModel};
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> ScriptConfig {
        let scenes = [
            Scene::new("a")
                .with_character("D")
                .with_beat("start")
                .with_transition("b", "default"),
            Scene::new("b").with_transition("ghost", "branch"),
        ];
        let characters = [Character::new("D", "Dana").with_voice_notes("Clipped, tired.")];
        write_fixture(dir.path(), &scenes, &characters).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_scene() {
        let dir = TempDir::new().unwrap();
        let session = LivingScript::new(fixture(&dir));
        let err = session.scene("nope").await.unwrap_err();
        assert!(matches!(err, SessionError::SceneNotFound(ref id) if id == "nope"));
        assert!(err.is_not_found());
        assert!(session.paths("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_graph_queries() {
        let dir = TempDir::new().unwrap();
        let session = LivingScript::new(fixture(&dir));

        let next = session.next_scenes("a").await.unwrap();
        assert_eq!(
            next,
            vec![NextScene {
                target: "b".into(),
                kind: "default".into()
            }]
        );

        let warnings = session.transition_warnings().await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].to_string(), "b → ghost: target scene not found");
    }

    #[tokio::test]
    async fn test_generate_saves_and_resolves_latest() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::always("D: We start."));
        let session = LivingScript::new(fixture(&dir)).with_model(model.clone());

        let result = session.generate(GenerateRequest::new("a")).await.unwrap();
        let version_id = result.version_id.unwrap();
        assert!(model.prompts()[0].contains("- Dana: Clipped, tired."));

        let latest = session.version("a", LATEST).await.unwrap();
        assert_eq!(latest.version_id, version_id);
        assert_eq!(latest.text, "D: We start.");

        let missing = session.version("a", "a_19700101_000000").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[test]
    fn test_replay_settings_fallbacks() {
        let mut version = Version {
            version_id: "v".into(),
            scene_id: "s".into(),
            text: String::new(),
            constraints: Default::default(),
            emotional_params: Default::default(),
            timestamp: chrono::Utc::now(),
            parent_version_id: None,
        };
        let settings = LivingScript::replay_settings(&version, 1.0, None);
        assert_eq!(settings.silence_density, 0.3);

        version.emotional_params.insert("silence_density".into(), 0.8);
        let settings = LivingScript::replay_settings(&version, 2.0, None);
        assert_eq!(settings.silence_density, 0.8);
        let settings = LivingScript::replay_settings(&version, 2.0, Some(0.1));
        assert_eq!(settings.silence_density, 0.1);
        assert_eq!(settings.pace, 2.0);
    }
}
