//! Scene-graph driven dialogue generation with version history.
//!
//! This crate provides:
//! - Scene and character loading from flat JSON documents
//! - Transition integrity checks and path enumeration over the scene graph
//! - A generate, validate and retry loop around a pluggable dialogue model
//! - Immutable per-scene version history with text and metadata diffs
//! - Paced line-by-line replay
//!
//! # Quick Start
//!
//! ```ignore
//! use script_core::{GenerateRequest, LivingScript, ModulationParams, ScriptConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = LivingScript::from_config(ScriptConfig::from_env()?);
//!
//!     let request = GenerateRequest::new("kitchen_3am")
//!         .with_modulation(ModulationParams::new(0.8, 0.3, 0.5));
//!     let result = session.generate(request).await?;
//!     println!("{}", result.dialogue);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controls;
pub mod dialogue;
pub mod diff;
pub mod generator;
pub mod graph;
pub mod model;
pub mod prompt;
pub mod replay;
pub mod scene;
pub mod session;
pub mod store;
pub mod testing;
pub mod validator;
pub mod versions;

// Primary public API
pub use config::{ConfigError, ScriptConfig};
pub use controls::{ModulationParams, ParamMap, PromptParams};
pub use diff::{DiffHunk, Direction, HunkKind, MetadataDiff, VersionDiff};
pub use generator::{GenerateError, GenerationResult, Generator, Outcome, MAX_ATTEMPTS};
pub use graph::{DanglingTransition, PathStep, ScenePath};
pub use model::{ClaudeModel, DialogueModel, DialogueSource, ModelError};
pub use replay::{DialogueLine, ReplayError, ReplaySettings};
pub use scene::{Character, Constraints, Scene, Transition};
pub use session::{GenerateRequest, LivingScript, NextScene, SessionError, LATEST};
pub use store::{CharacterSet, SceneSet, StoreError};
pub use testing::{ScriptedModel, ScriptedReply};
pub use validator::Validation;
pub use versions::{Version, VersionError, VersionStore, VersionSummary};
