//! `docent-cli` – command line entry point for the tour guide.
//!
//! - `docent tour` runs one guided tour with the simulated robot, talking to
//!   the occupancy and transcription services and the dialogue model named in
//!   `~/.docent/config.toml`.  Ctrl-C ends the tour as if the visitor had
//!   said "stop": the robot says goodbye and drives home first.
//! - `docent serve` runs both backend services on this machine: a fixed
//!   occupancy reading and a transcriber fed by the operator's keyboard.
//! - `docent init` writes the default configuration file.

mod config;
mod demo;
mod operator;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use docent_memory::TourJournal;
use docent_runtime::dialogue::LlmDialogue;
use docent_runtime::tour::{RobotHandles, ServiceHandles, TourController};
use docent_services::{OccupancyClient, OccupancyServer, TranscriptionClient, TranscriptionServer};
use docent_types::{OccupancyState, TourError, TourOutcome, TourSummary};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::operator::{ConsoleVoice, OperatorRecognizer};

#[derive(Parser, Debug)]
#[command(name = "docent", version, about = "Museum tour guide robot")]
struct Cli {
    /// Config file (default: ~/.docent/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Guide one visitor through the gallery with the simulated robot.
    Tour {
        /// Tour journal file (overrides the config).
        #[arg(long)]
        journal: Option<PathBuf>,
    },
    /// Serve occupancy readings and operator-typed transcripts.
    Serve {
        /// Occupancy reported to every client, one '0'/'1' per exhibit.
        #[arg(long, default_value = "00")]
        occupancy: String,
    },
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Tracing first: the OTLP exporter must exist before the runtime does.
    let _telemetry = docent_runtime::telemetry::init_tracing("docent");

    print_banner();

    let config_file = cli.config.clone().unwrap_or_else(config::config_path);
    let cfg = match load_config(&config_file) {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "tokio runtime could not be started");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Command::Tour { journal } => {
                let journal = journal.unwrap_or_else(|| cfg.journal_path(&config_file));
                run_tour(&cfg, journal).await.map(|summary| print_summary(&summary))
            }
            Command::Serve { occupancy } => serve(&cfg, &occupancy).await,
            Command::Init { force } => init(&cfg, &config_file, force),
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}: {e}", "Error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<Config, TourError> {
    match config::load_from(path)? {
        Some(cfg) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            Ok(cfg)
        }
        None => {
            println!("  {}", "No config file, using defaults.".dimmed());
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

async fn run_tour(cfg: &Config, journal: PathBuf) -> Result<TourSummary, TourError> {
    let catalog = cfg.catalog()?;
    let robot = demo::demo_robot(&catalog);
    let handles = RobotHandles {
        actuation: robot.clone(),
        perception: robot,
        voice: Arc::new(ConsoleVoice),
    };
    let services = ServiceHandles {
        occupancy: Arc::new(OccupancyClient::new(cfg.occupancy_addr())),
        transcriber: Arc::new(TranscriptionClient::new(cfg.transcription_addr())),
        dialogue: Arc::new(LlmDialogue::new(cfg.dialogue_config()).with_catalog(&catalog)),
    };
    let journal = TourJournal::open(journal).map_err(TourError::from)?;

    println!(
        "  Occupancy at {}, transcripts at {}, journal {}\n",
        cfg.occupancy_addr().bold(),
        cfg.transcription_addr().bold(),
        journal.path().display().to_string().dimmed()
    );

    let mut controller =
        TourController::new(catalog, handles, services, cfg.tour_config()).with_journal(journal);

    let finished = tokio::select! {
        summary = controller.run() => Some(summary),
        _ = tokio::signal::ctrl_c() => None,
    };
    Ok(match finished {
        Some(summary) => summary,
        None => {
            println!();
            println!("{}", "  Ctrl-C received, ending the tour.".yellow().bold());
            controller.interrupt().await
        }
    })
}

async fn serve(cfg: &Config, occupancy: &str) -> Result<(), TourError> {
    let occupancy = OccupancyState::parse(occupancy)?;
    let occupancy_server =
        OccupancyServer::bind(&cfg.occupancy_bind_addr(), Arc::new(occupancy.clone())).await?;
    let transcription_server = TranscriptionServer::bind(
        &cfg.transcription_bind_addr(),
        Arc::new(OperatorRecognizer::from_stdin()),
    )
    .await?;

    println!(
        "  Occupancy {} on {}",
        occupancy.to_string().bold(),
        occupancy_server.local_addr()?.to_string().bold()
    );
    println!(
        "  Transcripts on {}",
        transcription_server.local_addr()?.to_string().bold()
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let occupancy_task = tokio::spawn(occupancy_server.run(shutdown_rx.clone()));
    let transcription_task = tokio::spawn(transcription_server.run(shutdown_rx));

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for (name, task) in [("occupancy", occupancy_task), ("transcription", transcription_task)] {
        if let Err(e) = task.await {
            warn!(service = name, error = %e, "service task ended abnormally");
        }
    }
    Ok(())
}

fn init(cfg: &Config, path: &Path, force: bool) -> Result<(), TourError> {
    if path.exists() && !force {
        return Err(TourError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config::save_to(cfg, path)?;
    println!(
        "\n  {} Config saved to {}\n",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_summary(summary: &TourSummary) {
    let outcome = match summary.outcome {
        TourOutcome::Completed => "completed".green().bold(),
        TourOutcome::Stopped => "stopped by visitor".yellow().bold(),
        TourOutcome::Abandoned => "abandoned".red().bold(),
    };
    let visited = summary
        .visited
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    println!();
    println!("  Tour {} ({})", summary.session_id.to_string().dimmed(), outcome);
    println!("  Exhibits visited: {}", if visited.is_empty() { "none".to_string() } else { visited });
    println!("  Attention samples: {}", summary.attention_samples);
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"      __                     __ "#.bold().cyan());
    println!("{}", r#"  ___/ /__  _______ ___  ___/ /_"#.bold().cyan());
    println!("{}", r#" / _  / _ \/ __/ -_) _ \/ _  __/"#.bold().cyan());
    println!("{}", r#" \_,_/\___/\__/\__/_//_/\__/\__/ "#.bold().cyan());
    println!("{}", "   museum tour guide".dimmed());
    println!();
}
