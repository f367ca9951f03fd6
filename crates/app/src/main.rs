use std::path::PathBuf;

use clap::{Parser, Subcommand};
use show_orchestrator_core::{
    HeadlessSurface, Millis, Scene, Show, ShowConfig, ShowEvent, SimulatedTrack,
};
use tracing_subscriber::EnvFilter;

fn main() -> show_orchestrator_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seed,
            frame_ms,
            max_ms,
            path,
            snapshot,
        } => run_show(RunOptions {
            config,
            seed,
            frame_ms,
            max_ms,
            path,
            snapshot,
        }),
        Commands::Config => {
            println!("{}", ShowConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

struct RunOptions {
    config: Option<PathBuf>,
    seed: u64,
    frame_ms: Millis,
    max_ms: Millis,
    path: String,
    snapshot: bool,
}

/// Plays the show headlessly, acting like a viewer who begins as soon as the
/// prompt appears and picks `path` when offered a choice.
fn run_show(options: RunOptions) -> show_orchestrator_core::Result<()> {
    let config = match &options.config {
        Some(path) => ShowConfig::load(path)?,
        None => ShowConfig::default(),
    };
    tracing::info!(seed = options.seed, path = %options.path, "starting headless playthrough");

    let track = SimulatedTrack::new(180.0, 120.0);
    let mut show = Show::new(config, options.seed, track);
    let mut surface = HeadlessSurface::new();
    let frame_ms = options.frame_ms.max(1);

    while show.now() < options.max_ms {
        for signal in show.backend_mut().poll(frame_ms) {
            show.apply_asset_signal(signal);
        }
        show.tick(frame_ms, &mut surface)?;

        let snapshot = show.snapshot();
        if snapshot.transitioning {
            continue;
        }
        match snapshot.scene {
            Scene::Intro if snapshot.prompt_ready => show.begin()?,
            Scene::BranchChoice => show.choose_path(&options.path)?,
            Scene::Ending if snapshot.replay_ready => break,
            _ => {}
        }
    }

    let entered: Vec<String> = show
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            ShowEvent::SceneEntered { to, .. } => Some(to.to_string()),
            _ => None,
        })
        .collect();
    tracing::info!(
        now_ms = show.now(),
        frames = surface.frames_presented(),
        scenes = %entered.join(" -> "),
        "playthrough finished"
    );

    if options.snapshot {
        println!("{}", serde_json::to_string_pretty(&show.snapshot())?);
    }

    show.shutdown();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted interactive show orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a full playthrough against a simulated track and renderer.
    Run {
        /// Optional JSON configuration file; defaults apply to missing keys.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed for particle layout and effect throttling.
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Simulated milliseconds per rendered frame.
        #[arg(long, default_value_t = 16)]
        frame_ms: Millis,
        /// Stop after this much simulated time even if the show is unfinished.
        #[arg(long, default_value_t = 300_000)]
        max_ms: Millis,
        /// Branch path chosen when the choice is offered.
        #[arg(short, long, default_value = "romantic")]
        path: String,
        /// Print the final snapshot as JSON.
        #[arg(long)]
        snapshot: bool,
    },
    /// Print the default configuration as JSON.
    Config,
}
