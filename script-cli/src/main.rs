//! Living Script command line.
//!
//! ```bash
//! living-script generate kitchen_3am --tension 0.8 --silence 0.6
//! living-script replay kitchen_3am latest --pace 1.5
//! living-script serve --addr 127.0.0.1:8000
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); dialogue goes to stdout.

mod server;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use script_core::diff::unified_diff_text;
use script_core::{
    GenerateRequest, LivingScript, ModulationParams, Outcome, ScriptConfig, LATEST,
};
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "living-script",
    version,
    about = "Scene graph driven dialogue generation with version history"
)]
struct Cli {
    /// Directory holding scenes/ and characters/
    #[arg(long, global = true, value_name = "DIR")]
    scripts_dir: Option<PathBuf>,

    /// Directory holding versions/
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate dialogue for a scene and save it as a new version
    Generate(GenerateArgs),
    /// Show a scene's next scenes and any graph integrity warnings
    Graph {
        /// Scene id (defaults to the first scene)
        scene: Option<String>,
    },
    /// List every path through the graph from a scene
    Paths {
        /// Scene id (defaults to the first scene)
        scene: Option<String>,
    },
    /// Play a saved version back line by line
    Replay(ReplayArgs),
    /// List saved versions of a scene, newest first
    Versions { scene: String },
    /// Compare two saved versions
    Diff(DiffArgs),
    /// Serve the JSON HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: SocketAddr,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Scene id (defaults to the first scene)
    scene: Option<String>,

    /// Build and print the prompt without calling the model
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = 0.5)]
    tension: f64,

    #[arg(long, default_value_t = 0.5)]
    distance: f64,

    #[arg(long, default_value_t = 0.3)]
    silence: f64,

    /// Version this one was derived from
    #[arg(long, value_name = "VERSION_ID")]
    parent: Option<String>,
}

#[derive(Args)]
struct ReplayArgs {
    scene: String,

    /// Version id, or `latest`
    #[arg(default_value = LATEST)]
    version: String,

    /// Playback speed; 2.0 is twice as fast
    #[arg(long, default_value_t = 1.0)]
    pace: f64,

    /// Silence density (defaults to the version's own)
    #[arg(long)]
    silence: Option<f64>,
}

#[derive(Args)]
struct DiffArgs {
    scene: String,
    old: String,
    new: String,

    /// Print a unified text diff instead of JSON
    #[arg(long)]
    unified: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ScriptConfig::from_env().context("invalid configuration")?;
    if let Some(dir) = cli.scripts_dir {
        config = config.with_scripts_dir(dir);
    }
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    let session = LivingScript::from_config(config);

    match cli.command {
        Command::Generate(args) => generate(&session, args).await,
        Command::Graph { scene } => graph(&session, scene).await,
        Command::Paths { scene } => paths(&session, scene).await,
        Command::Replay(args) => replay(&session, args).await,
        Command::Versions { scene } => versions(&session, &scene).await,
        Command::Diff(args) => diff(&session, args).await,
        Command::Serve { addr } => server::serve(session, addr).await,
    }
}

/// The requested scene id, or the first loaded scene.
async fn resolve_scene(session: &LivingScript, scene: Option<String>) -> anyhow::Result<String> {
    let scenes = session.scenes().await?;
    let Some(first) = scenes.first() else {
        bail!("No scenes found in {}", session.config().scenes_dir().display());
    };
    let scene_id = scene.unwrap_or_else(|| first.scene_id.clone());
    if !scenes.contains(&scene_id) {
        bail!(
            "Unknown scene: {scene_id}\nAvailable: {}",
            scenes.ids().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(scene_id)
}

async fn generate(session: &LivingScript, args: GenerateArgs) -> anyhow::Result<()> {
    let scene_id = resolve_scene(session, args.scene).await?;
    let request = GenerateRequest::new(&scene_id)
        .with_modulation(ModulationParams::new(args.tension, args.distance, args.silence))
        .with_dry_run(args.dry_run)
        .with_parent(args.parent);

    let result = session.generate(request).await?;

    if let Outcome::DryRun = result.outcome {
        println!("=== PROMPT (dry run) ===");
        println!("{}", result.prompt);
        return Ok(());
    }

    println!("=== DIALOGUE ===");
    println!("{}", result.dialogue);

    if let Outcome::AcceptedAfterExhaustion { ref errors } = result.outcome {
        eprintln!("Warning: kept after {} attempts with issues:", result.attempts.len());
        for error in errors {
            eprintln!("  - {error}");
        }
    }
    if let Some(ref validation) = result.validation {
        for warning in &validation.warnings {
            eprintln!("Note: {warning}");
        }
    }
    if let Some(ref version_id) = result.version_id {
        eprintln!("Saved version {version_id}");
    }
    Ok(())
}

async fn graph(session: &LivingScript, scene: Option<String>) -> anyhow::Result<()> {
    let scene_id = resolve_scene(session, scene).await?;
    for warning in session.transition_warnings().await? {
        eprintln!("Warning: {warning}");
    }

    let scene = session.scene(&scene_id).await?;
    let next = session.next_scenes(&scene_id).await?;
    println!("Scene {}: {}", scene.scene_id, scene.setting);
    println!("Emotional state: {}", scene.emotional_state.join(", "));
    println!("Valid next scenes:");
    for n in &next {
        println!("  → {} ({})", n.target, n.kind);
    }
    if next.is_empty() {
        println!("  (dead end)");
    }
    Ok(())
}

async fn paths(session: &LivingScript, scene: Option<String>) -> anyhow::Result<()> {
    let scene_id = resolve_scene(session, scene).await?;
    for path in session.paths(&scene_id).await? {
        let steps: Vec<String> = path.iter().map(ToString::to_string).collect();
        println!("{}", steps.join(" → "));
    }
    Ok(())
}

async fn replay(session: &LivingScript, args: ReplayArgs) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    session
        .replay_version(&args.scene, &args.version, args.pace, args.silence, |line, _, _| {
            let _ = writeln!(stdout, "{line}");
            let _ = stdout.flush();
        })
        .await?;
    Ok(())
}

async fn versions(session: &LivingScript, scene: &str) -> anyhow::Result<()> {
    let versions = session.versions(scene).await?;
    if versions.is_empty() {
        eprintln!("No versions for {scene}");
        return Ok(());
    }
    for v in versions {
        let tension = v
            .emotional_params
            .get("tension")
            .map(|t| format!("{t:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let parent = v.parent_version_id.as_deref().unwrap_or("-");
        println!(
            "{}  {}  tension={}  parent={}",
            v.version_id,
            v.timestamp.format("%Y-%m-%d %H:%M:%S"),
            tension,
            parent
        );
    }
    Ok(())
}

async fn diff(session: &LivingScript, args: DiffArgs) -> anyhow::Result<()> {
    if args.unified {
        let old = session.version(&args.scene, &args.old).await?;
        let new = session.version(&args.scene, &args.new).await?;
        print!(
            "{}",
            unified_diff_text(&old.text, &new.text, &old.version_id, &new.version_id)
        );
        return Ok(());
    }

    let diff = session.diff(&args.scene, &args.old, &args.new).await?;
    println!("{}", serde_json::to_string_pretty(&diff)?);
    Ok(())
}
