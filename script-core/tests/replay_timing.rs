//! Replay pacing tests on a paused tokio clock.

use script_core::replay::{replay, schedule, DialogueLine, ReplaySettings};
use script_core::testing::write_fixture;
use script_core::{LivingScript, Scene, SessionError, LATEST};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

const TEXT: &str = "D: one two three four\nJ: Well...\nstage direction here ok";

#[tokio::test(start_paused = true)]
async fn test_replay_emits_every_line_and_sleeps_the_schedule() {
    let settings = ReplaySettings::default().with_silence_density(0.0);
    let expected: Duration = schedule(TEXT, &settings)
        .unwrap()
        .iter()
        .map(|(_, delay)| *delay)
        .sum();
    // 4 words + 1 word + 4 words at 120 wpm.
    assert_eq!(expected, Duration::from_millis(4500));

    let mut seen: Vec<(DialogueLine, usize, usize)> = Vec::new();
    let start = Instant::now();
    let played = replay(TEXT, &settings, |line, index, total| {
        seen.push((line.clone(), index, total));
    })
    .await
    .unwrap();

    assert_eq!(played, 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= expected, "elapsed {elapsed:?}");
    assert!(elapsed < expected + Duration::from_millis(10), "elapsed {elapsed:?}");
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].0.speaker, "?");
    assert_eq!(seen[2].1, 2);
    assert!(seen.iter().all(|(_, _, total)| *total == 3));
}

#[tokio::test(start_paused = true)]
async fn test_double_pace_halves_the_run() {
    let normal = ReplaySettings::default();
    let fast = ReplaySettings::default().with_pace(2.0);

    let start = Instant::now();
    replay(TEXT, &normal, |_, _, _| {}).await.unwrap();
    let normal_elapsed = start.elapsed();

    let start = Instant::now();
    replay(TEXT, &fast, |_, _, _| {}).await.unwrap();
    let fast_elapsed = start.elapsed();

    let ratio = normal_elapsed.as_secs_f64() / fast_elapsed.as_secs_f64();
    assert!((ratio - 2.0).abs() < 1e-2, "ratio was {ratio}");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_pace_plays_nothing() {
    let mut calls = 0;
    let result = replay(TEXT, &ReplaySettings::default().with_pace(0.0), |_, _, _| {
        calls += 1
    })
    .await;
    assert!(result.is_err());
    assert_eq!(calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_replay_latest_saved_version() {
    let dir = TempDir::new().unwrap();
    let scenes = [Scene::new("s").with_beat("opening")];
    let config = write_fixture(dir.path(), &scenes, &[]).unwrap();
    let session = LivingScript::new(config);

    let err = session
        .replay_version("s", LATEST, 1.0, None, |_, _, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::VersionNotFound { .. }));

    session
        .generate(script_core::GenerateRequest::new("s"))
        .await
        .unwrap();

    let mut lines = Vec::new();
    let played = session
        .replay_version("s", LATEST, 4.0, None, |line, _, _| lines.push(line.to_string()))
        .await
        .unwrap();
    assert_eq!(played, 1);
    assert_eq!(lines, vec!["D: [Generated for 'opening']"]);
}
