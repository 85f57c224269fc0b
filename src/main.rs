//! # Frame Critic CLI (`fcrit`)
//!
//! The `fcrit` binary drives the two-stage pipeline: per-chunk frame
//! analysis followed by a whole-sequence critique.
//!
//! ## Usage
//!
//! ```bash
//! fcrit --config ./config/fcrit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fcrit run <dir>` | Analyze every chunk, then write the critique |
//! | `fcrit analyze <dir>` | Analyze every chunk and persist the results only |
//! | `fcrit critique <dir>` | Write the critique from a persisted results file |
//! | `fcrit plan <dir>` | Show the selected frames and chunk layout |
//! | `fcrit interactive` | Ask for the folder and batch settings, then run |
//!
//! ## Examples
//!
//! ```bash
//! # Every third frame, four frames per request
//! fcrit run ./frames --skip-frames 3 --chunk-size 4
//!
//! # Retry only the critique after an aggregation failure
//! fcrit critique ./frames --results ./analysis_results.json
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use frame_critic::client::LlamaClient;
use frame_critic::config::{self, Config};
use frame_critic::interactive::{self, Prompted};
use frame_critic::logging::init_logging;
use frame_critic::pipeline::{AnalysisSummary, CritiqueOutcome, Pipeline, PipelineOptions};
use frame_critic::progress::ProgressMode;
use frame_critic::report;

/// Frame Critic: batch frame analysis and sequence critique through a
/// remote multimodal model.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fcrit.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fcrit",
    about = "Analyze video frames in chunks and write a director-style critique",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/fcrit.toml`. A missing file is not an error:
    /// built-in defaults are used instead.
    #[arg(long, global = true, default_value = "./config/fcrit.toml")]
    config: PathBuf,

    /// Progress output on stderr.
    #[arg(long, global = true, value_enum, default_value_t = ProgressArg::Auto)]
    progress: ProgressArg,

    /// Debug-level logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    /// Human progress on a TTY, nothing otherwise.
    Auto,
    Human,
    Json,
    Off,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

/// Per-run overrides of the `[batch]` and `[output]` config sections.
#[derive(Args, Debug, Default)]
struct BatchArgs {
    /// Images per analyzer request.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Process every Nth image.
    #[arg(long)]
    skip_frames: Option<usize>,

    /// Minimum pause between chunks, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Result artifact path (read by `critique`, written otherwise).
    #[arg(long)]
    results: Option<PathBuf>,

    /// Report path.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl BatchArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(n) = self.chunk_size {
            cfg.batch.chunk_size = n;
        }
        if let Some(n) = self.skip_frames {
            cfg.batch.skip_frames = n;
        }
        if let Some(ms) = self.delay_ms {
            cfg.batch.delay_ms = ms;
        }
        if let Some(path) = &self.results {
            cfg.output.results_path = path.clone();
        }
        if let Some(path) = &self.report {
            cfg.output.report_path = path.clone();
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every chunk, then write the critique.
    Run {
        /// Directory containing the frame images.
        dir: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Analyze every chunk and persist the results without a critique.
    Analyze {
        /// Directory containing the frame images.
        dir: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Write the critique from a previously persisted results file.
    ///
    /// The transcript, if any, is still looked up in `dir`.
    Critique {
        /// Directory containing the frames (and optional transcript).
        dir: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Show which frames would be sent and how they are chunked.
    ///
    /// Makes no remote calls and writes nothing.
    Plan {
        /// Directory containing the frame images.
        dir: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Ask for the folder, chunk size and stride, then run.
    Interactive {
        #[command(flatten)]
        batch: BatchArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let progress = cli.progress.mode();
    init_logging(cli.verbose, progress == ProgressMode::Json);

    let mut cfg = config::load_or_default(&cli.config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Run { dir, batch } => {
            batch.apply(&mut cfg);
            run(&cfg, &dir, progress, cancel).await?;
        }
        Commands::Analyze { dir, batch } => {
            batch.apply(&mut cfg);
            let pipeline = build_pipeline(&cfg, progress, cancel)?;
            let summary = pipeline.analyze(&dir).await?;
            print_analysis(&summary);
        }
        Commands::Critique { dir, batch } => {
            batch.apply(&mut cfg);
            let pipeline = build_pipeline(&cfg, progress, cancel)?;
            let results = pipeline.options().results_path.clone();
            let outcome = pipeline.critique_from_artifact(&dir, &results).await?;
            print_critique(&outcome);
        }
        Commands::Plan { dir, batch } => {
            batch.apply(&mut cfg);
            print_plan(&cfg, &dir, progress)?;
        }
        Commands::Interactive { batch } => {
            batch.apply(&mut cfg);
            let prompted = {
                let mut input = std::io::stdin().lock();
                interactive::prompt_settings(&mut input, &mut std::io::stdout())?
            };
            match prompted {
                Prompted::Quit => return Ok(()),
                Prompted::Run(settings) => {
                    cfg.batch.chunk_size = settings.chunk_size;
                    cfg.batch.skip_frames = settings.skip_frames;
                    println!(
                        "Processing {} (chunk_size={}, skip_frames={})",
                        settings.dir.display(),
                        settings.chunk_size,
                        settings.skip_frames
                    );
                    run(&cfg, &settings.dir, progress, cancel).await?;
                }
            }
        }
    }

    Ok(())
}

fn build_pipeline(
    cfg: &Config,
    progress: ProgressMode,
    cancel: CancellationToken,
) -> anyhow::Result<Pipeline> {
    let options = PipelineOptions::from_config(cfg)?;
    let client = Arc::new(LlamaClient::new(cfg).context("failed to build HTTP client")?);
    Ok(Pipeline::new(options, client.clone(), client)
        .with_progress(progress.reporter())
        .with_cancellation(cancel))
}

async fn run(
    cfg: &Config,
    dir: &Path,
    progress: ProgressMode,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(cfg, progress, cancel)?;
    let summary = pipeline.run(dir).await?;

    print_analysis(&summary.analysis);
    let critique = summary.critique;
    if let Ok(outcome) = &critique {
        print_critique(outcome);
    }
    println!(
        "\nProcessing completed in {:.2}s",
        summary.elapsed.as_secs_f64()
    );

    critique.map(|_| ()).map_err(Into::into)
}

fn print_plan(cfg: &Config, dir: &Path, progress: ProgressMode) -> anyhow::Result<()> {
    let pipeline = build_pipeline(cfg, progress, CancellationToken::new())?;
    let plan = pipeline.plan(dir)?;
    let options = pipeline.options();

    println!(
        "Found {} images, selected {} (every {}), {} chunks of up to {}",
        plan.found,
        plan.selected.len(),
        ordinal(options.skip_frames),
        plan.chunks.len(),
        options.chunk_size
    );
    for chunk in &plan.chunks {
        println!("  chunk {}: {}", chunk.index, chunk.names().join(", "));
    }
    Ok(())
}

fn print_analysis(summary: &AnalysisSummary) {
    println!(
        "\nAnalyzed {} of {} selected images ({} found) in {} chunks",
        summary.processed, summary.selected, summary.found, summary.chunks
    );
    if summary.failed_chunks > 0 {
        println!("  {} chunk(s) failed", summary.failed_chunks);
    }
    if summary.excluded > 0 {
        println!("  {} image(s) could not be read", summary.excluded);
    }
    println!("Results saved to {}", summary.results_path.display());
}

fn print_critique(outcome: &CritiqueOutcome) {
    match outcome {
        CritiqueOutcome::Skipped => {
            println!("No analysis results, critique skipped.");
        }
        CritiqueOutcome::Written { path, text } => {
            println!("Critique saved to {}", path.display());
            let (lines, truncated) = report::preview(text);
            if !lines.is_empty() {
                println!("\nPreview:");
                for line in lines {
                    println!("  {}", line);
                }
                if truncated {
                    println!("  ...");
                }
            }
        }
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}
