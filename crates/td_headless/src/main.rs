//! Headless lane-defense runner.
//!
//! This binary runs the game without graphics, controlled via JSON on stdin/stdout.
//! Designed for controller scripts, CI testing, and balance runs.
//!
//! # Usage
//!
//! ```bash
//! # Interactive session, resuming td_save.json if present
//! cargo run -p td_headless -- play
//!
//! # Ask an external advisor for the opponent's plan each round
//! cargo run -p td_headless -- play --advisor "python3 advisor.py"
//!
//! # Play one unattended game
//! cargo run -p td_headless -- simulate --seed 42
//!
//! # Run batch balance test
//! cargo run -p td_headless -- batch --count 1000 --output results/batch.json
//!
//! # Write the default rules to edit
//! cargo run -p td_headless -- rules --output rules.ron
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information; `RUST_LOG` overrides the level
//!
//! See the protocol module for command/response format.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use td_core::rules::GameRules;
use td_core::strategy::{NoAdvisor, StrategyProvider};
use td_headless::{
    advisor::ProcessAdvisor,
    batch::{run_batch, BatchConfig},
    game_runner::{run_game, GameConfig},
    rules_loader::{default_rules_ron, load_rules_or_default},
    session::Session,
    store::FileStore,
};

#[derive(Parser)]
#[command(name = "td_headless")]
#[command(about = "Headless lane-defense runner for controllers and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play an interactive game over stdin/stdout
    Play {
        /// Rules file (RON); defaults apply when absent
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Save file, resumed on start and written at checkpoints
        #[arg(short, long, default_value = "td_save.json")]
        save: PathBuf,

        /// Random seed for a new game
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Advisor command line; the fallback opponent plays when absent
        #[arg(short, long)]
        advisor: Option<String>,

        /// Time allowed for one advisor call
        #[arg(long, default_value = "10000")]
        advisor_timeout_ms: u64,
    },

    /// Play one unattended game and print the result
    Simulate {
        /// Rules file (RON)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit
        #[arg(long, default_value = "60000")]
        max_ticks: u64,
    },

    /// Run batch of games for balance testing
    Batch {
        /// Rules file (RON)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output file for results
        #[arg(short, long, default_value = "results/batch_results.json")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per game
        #[arg(long, default_value = "60000")]
        max_ticks: u64,
    },

    /// Print the default rules as RON
    Rules {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Play {
            rules,
            save,
            seed,
            advisor,
            advisor_timeout_ms,
        }) => {
            cmd_play(rules.as_deref(), save, seed, advisor.as_deref(), advisor_timeout_ms);
        }
        Some(Commands::Simulate { rules, seed, max_ticks }) => {
            cmd_simulate(rules.as_deref(), seed, max_ticks);
        }
        Some(Commands::Batch {
            rules,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => {
            cmd_batch(rules.as_deref(), count, parallel, &output, seed, max_ticks);
        }
        Some(Commands::Rules { output }) => {
            cmd_rules(output.as_deref());
        }
        None => {
            cmd_play(None, PathBuf::from("td_save.json"), 0, None, 10_000);
        }
    }
}

fn rules_or_exit(path: Option<&Path>) -> GameRules {
    match load_rules_or_default(path) {
        Ok(rules) => rules,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load rules");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_play(rules: Option<&Path>, save: PathBuf, seed: u64, advisor: Option<&str>, timeout_ms: u64) {
    let rules = rules_or_exit(rules);

    let advisor: Box<dyn StrategyProvider> = match advisor.map(ProcessAdvisor::from_command_line) {
        Some(Ok(Some(advisor))) => {
            tracing::info!(program = advisor.program(), timeout_ms, "Using external advisor");
            Box::new(advisor.with_timeout(Duration::from_millis(timeout_ms)))
        }
        Some(Err(e)) => {
            eprintln!("FATAL: Failed to start advisor runtime: {e}");
            std::process::exit(1);
        }
        Some(Ok(None)) | None => {
            tracing::info!("No advisor configured, opponent uses fallback waves");
            Box::new(NoAdvisor)
        }
    };

    tracing::info!(save = %save.display(), "Starting play session");
    let mut session = Session::open(rules, seed, FileStore::new(save), advisor);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = session.run(stdin.lock(), stdout.lock()) {
        tracing::error!(error = %e, "Session I/O failed");
        std::process::exit(1);
    }
}

fn cmd_simulate(rules: Option<&Path>, seed: u64, max_ticks: u64) {
    let config = GameConfig {
        seed,
        max_ticks,
        rules: rules_or_exit(rules),
        ..GameConfig::default()
    };
    let result = run_game(&config, &mut NoAdvisor);
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("FATAL: Failed to encode result: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_batch(rules: Option<&Path>, count: u32, parallel: u32, output: &Path, seed: u64, max_ticks: u64) {
    let config = BatchConfig {
        game_count: count,
        parallel_games: parallel,
        seed_start: seed,
        max_ticks,
        rules: rules_or_exit(rules),
        ..BatchConfig::default()
    };

    tracing::info!(
        count,
        parallel,
        seed,
        max_ticks,
        output = %output.display(),
        "Batch configuration"
    );

    let results = run_batch(config);

    if let Err(e) = results.save(output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    // Print summary
    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", summary.total_games);
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Player wins: {}  Opponent wins: {}  Undecided: {}",
        summary.player_wins, summary.ai_wins, summary.undecided
    );
    eprintln!("Player win rate: {:.1}%", summary.player_win_rate() * 100.0);
    eprintln!("Mean rounds: {:.1}", summary.mean_rounds);
    eprintln!("\nResults saved to: {}", output.display());
}

fn cmd_rules(output: Option<&Path>) {
    let text = match default_rules_ron() {
        Ok(text) => text,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("FATAL: Failed to write {}: {e}", path.display());
                std::process::exit(1);
            }
            eprintln!("Rules written to {}", path.display());
        }
        None => println!("{text}"),
    }
}
