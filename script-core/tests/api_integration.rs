//! Integration tests that call the real Claude API.
//!
//! These tests require ANTHROPIC_API_KEY to be set (via .env file or environment).
//! Run with: `cargo test -p script-core --test api_integration -- --ignored`

use script_core::scene::Constraints;
use script_core::testing::write_fixture;
use script_core::{
    Character, DialogueSource, GenerateRequest, LivingScript, ModulationParams, Scene,
};
use tempfile::TempDir;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if API key is available
fn has_api_key() -> bool {
    std::env::var("ANTHROPIC_API_KEY").is_ok()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p script-core --test api_integration -- --ignored
async fn test_live_generation_is_versioned() {
    setup();
    if !has_api_key() {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let scene = Scene::new("kitchen_3am")
        .with_setting("A kitchen at 3am. The fridge hums.")
        .with_character("D")
        .with_character("J")
        .with_beat("D finds a letter on the table")
        .with_beat("J pretends he has not seen it")
        .with_emotional_state("suspicion")
        .with_constraints(
            Constraints::default()
                .with_max_lines(8)
                .with_forbidden_word("closure"),
        );
    let config = write_fixture(
        temp_dir.path(),
        &[scene],
        &[
            Character::new("D", "Dana").with_voice_notes("Short questions."),
            Character::new("J", "Jonah").with_voice_notes("Answers sideways."),
        ],
    )
    .expect("Failed to write fixture");

    let session = LivingScript::from_config(config);
    assert!(session.has_model());

    let result = session
        .generate(
            GenerateRequest::new("kitchen_3am")
                .with_modulation(ModulationParams::new(0.7, 0.6, 0.4)),
        )
        .await
        .expect("generation should succeed");

    println!("--- dialogue ---\n{}", result.dialogue);
    println!("outcome: {:?}", result.outcome);

    assert!(!result.dialogue.is_empty(), "model should return dialogue");
    assert!(result.attempts.iter().all(|a| a.source == DialogueSource::Model));
    assert!(result.attempts.len() <= script_core::MAX_ATTEMPTS);

    let version_id = result.version_id.expect("dialogue should be saved");
    let versions = session.versions("kitchen_3am").await.unwrap();
    assert_eq!(versions[0].version_id, version_id);
}
