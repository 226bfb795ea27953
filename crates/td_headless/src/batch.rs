//! Batch game runner for balance testing.
//!
//! Runs many unattended games in parallel using rayon. Every game uses the
//! local fallback opponent, so a batch is reproducible from its seeds.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use td_core::rules::GameRules;
use td_core::side::Side;
use td_core::strategy::NoAdvisor;
use tracing::{debug, info};

use crate::game_runner::{run_game, GameConfig, GameResult, PlayerPolicy};

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Starting seed; game `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Maximum ticks per game
    pub max_ticks: u64,
    /// Length of every tick
    pub dt_ms: u32,
    /// Rules in force
    pub rules: GameRules,
    /// Stand-in player
    pub policy: PlayerPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let game = GameConfig::default();
        Self {
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            max_ticks: game.max_ticks,
            dt_ms: game.dt_ms,
            rules: game.rules,
            policy: game.policy,
        }
    }
}

impl BatchConfig {
    /// Create config for `game_count` games
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick limit
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    fn game(&self, index: u32) -> GameConfig {
        GameConfig {
            seed: self.seed_start.wrapping_add(u64::from(index)),
            max_ticks: self.max_ticks,
            dt_ms: self.dt_ms,
            rules: self.rules.clone(),
            policy: self.policy.clone(),
        }
    }
}

/// Aggregate outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games played
    pub total_games: u32,
    /// Games the player won
    pub player_wins: u32,
    /// Games the opponent won
    pub ai_wins: u32,
    /// Games stopped at the tick limit
    pub undecided: u32,
    /// Mean round reached
    pub mean_rounds: f64,
    /// Mean ticks played
    pub mean_ticks: f64,
}

impl BatchSummary {
    /// Summarize finished games
    pub fn from_games(games: &[GameResult]) -> Self {
        let mut summary = Self {
            total_games: u32::try_from(games.len()).unwrap_or(u32::MAX),
            ..Self::default()
        };
        for game in games {
            match game.winner {
                Some(Side::Player) => summary.player_wins += 1,
                Some(Side::Ai) => summary.ai_wins += 1,
                None => summary.undecided += 1,
            }
        }
        if !games.is_empty() {
            let n = games.len() as f64;
            summary.mean_rounds = games.iter().map(|g| f64::from(g.rounds)).sum::<f64>() / n;
            summary.mean_ticks = games.iter().map(|g| g.ticks as f64).sum::<f64>() / n;
        }
        summary
    }

    /// Share of decided games the player won
    pub fn player_win_rate(&self) -> f64 {
        let decided = self.player_wins + self.ai_wins;
        if decided == 0 {
            return 0.0;
        }
        f64::from(self.player_wins) / f64::from(decided)
    }
}

/// Results from a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual games, in seed order
    pub games: Vec<GameResult>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run a batch of games
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let completed = AtomicU32::new(0);

    info!(games = config.game_count, seed = config.seed_start, "Starting batch run");

    // Configure thread pool if specified
    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let games: Vec<GameResult> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let result = run_game(&config.game(i), &mut NoAdvisor);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 {
                debug!("Progress: {}/{}", done, config.game_count);
            }
            result
        })
        .collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({} player / {} ai / {} undecided)",
        games.len(),
        duration_seconds,
        summary.player_wins,
        summary.ai_wins,
        summary.undecided
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
    }
}
