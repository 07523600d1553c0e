//! Command-line surface of the `coral` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use coral_core::{CoralConfig, StrategyKind, UpdateMode};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "coral",
    version,
    about = "Evolve majority-vote species grids and render when each cell last changed"
)]
pub struct Cli {
    /// Grid side length.
    #[arg(long, default_value_t = 500)]
    pub world_size: usize,

    /// Iteration cap per run; 0 runs until the grid stops changing.
    #[arg(long, default_value_t = 0)]
    pub max_iterations: u32,

    /// Number of species.
    #[arg(long, default_value_t = 5)]
    pub num_species: usize,

    /// Color-walk perturbation strength.
    #[arg(long = "mut-str", default_value_t = 1.0)]
    pub mut_str: f32,

    /// Number of independent runs; 0 or negative runs forever.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub batch: i64,

    /// Base RNG seed; run `i` uses `seed + i`. Drawn from entropy when absent.
    #[arg(long, env = "CORAL_SEED")]
    pub seed: Option<u64>,

    /// Directory receiving the PNG and JSON artifacts.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Round executor.
    #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
    pub strategy: StrategyArg,

    /// `auto` switches to the parallel executor above this side length.
    #[arg(long, default_value_t = 256)]
    pub parallel_threshold: usize,

    /// Parallel worker count (defaults to available cores).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Stage sequential writes until the end of each round, matching the
    /// parallel executor. Small grids may then oscillate forever without a cap.
    #[arg(long)]
    pub synchronous: bool,

    /// Run both executors from the same seed, compare the grids, and exit.
    #[arg(long)]
    pub verify: bool,

    /// Suppress the in-place progress line.
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Auto,
    Sequential,
    Parallel,
}

impl From<StrategyArg> for StrategyKind {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Auto => StrategyKind::Auto,
            StrategyArg::Sequential => StrategyKind::Sequential,
            StrategyArg::Parallel => StrategyKind::Parallel,
        }
    }
}

impl Cli {
    /// Engine configuration for the first run of the batch.
    #[must_use]
    pub fn engine_config(&self) -> CoralConfig {
        CoralConfig {
            world_size: self.world_size,
            num_species: self.num_species,
            max_iterations: self.max_iterations,
            strategy: self.strategy.into(),
            update_mode: if self.synchronous {
                UpdateMode::Synchronous
            } else {
                UpdateMode::InPlace
            },
            parallel_threshold: self.parallel_threshold,
            workers: self.workers,
            rng_seed: self.seed,
        }
    }

    /// Run count, or `None` for an unbounded batch.
    #[must_use]
    pub fn batch_limit(&self) -> Option<u64> {
        u64::try_from(self.batch).ok().filter(|&runs| runs > 0)
    }
}
