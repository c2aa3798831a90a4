//! Reel render binary.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

use reel_models::{NarrationTiming, Storyboard, TimingPlan};
use reel_worker::{init_tracing, RenderPipeline, RunDir, WorkerConfig, WorkerResult};

#[derive(Parser, Debug)]
#[command(name = "reel", version, about = "Beat timing and video assembly for narrated reels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Allocate beats and write timing_plan.json
    Plan {
        /// Run directory (defaults to the latest run)
        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// Render the final video
    Render {
        /// Run directory (defaults to the latest run)
        #[arg(long)]
        run_dir: Option<PathBuf>,
        /// Output file (defaults to <run>/render/final.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the JSON schema of an artifact
    Schema {
        #[arg(value_enum)]
        artifact: Artifact,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Artifact {
    TimingPlan,
    Narration,
    Storyboard,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> WorkerResult<()> {
    if let Commands::Schema { artifact } = cli.command {
        let schema = match artifact {
            Artifact::TimingPlan => schemars::schema_for!(TimingPlan),
            Artifact::Narration => schemars::schema_for!(NarrationTiming),
            Artifact::Storyboard => schemars::schema_for!(Storyboard),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = WorkerConfig::from_env()?;
    info!(
        size = %config.render.size(),
        fps = config.render.fps,
        runs_dir = %config.runs_dir.display(),
        "Loaded configuration"
    );

    match cli.command {
        Commands::Plan { run_dir } => {
            let run = open_run(run_dir, &config).await?;
            let plan = RenderPipeline::new(config).plan(&run).await?;
            info!(
                run_id = run.id(),
                beats = plan.total_beats,
                duration = plan.full_duration_seconds,
                "Timing plan ready"
            );
        }
        Commands::Render { run_dir, output } => {
            let run = open_run(run_dir, &config).await?;
            let outcome = RenderPipeline::new(config)
                .render(&run, output.as_deref())
                .await?;
            info!(
                run_id = %outcome.run_id,
                output = %outcome.output.display(),
                duration = outcome.duration,
                segments = outcome.segments,
                music = outcome.music.is_some(),
                captions = outcome.captions,
                "Render complete"
            );
        }
        Commands::Schema { .. } => {}
    }
    Ok(())
}

async fn open_run(run_dir: Option<PathBuf>, config: &WorkerConfig) -> WorkerResult<RunDir> {
    match run_dir {
        Some(dir) => RunDir::open(dir),
        None => RunDir::latest(&config.runs_dir).await,
    }
}
