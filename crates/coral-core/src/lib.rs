//! Core types for the Coral majority-vote species automaton.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod active;
pub mod grid;
pub mod rule;
pub mod strategy;

pub use active::ActiveSet;
pub use grid::{CellSnapshot, Grid, MAX_SPECIES, MAX_WORLD_SIZE, moore_neighbors};
pub use rule::{DORMANT_THRESHOLD, Transition};
pub use strategy::{
    COMPACTION_INTERVAL, ExecutionStrategy, ParallelStrategy, RoundOutcome, SequentialStrategy,
    UpdateMode, available_workers,
};

/// Errors raised while configuring or running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The iteration cap was reached while cells were still changing.
    #[error("grid still changing after {iterations} iterations")]
    QuiescenceNotReached { iterations: u32 },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Which executor drives the rounds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Parallel above `parallel_threshold`, sequential otherwise.
    #[default]
    Auto,
    Sequential,
    Parallel,
}

/// Static configuration for a Coral run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoralConfig {
    /// Side length of the square world.
    pub world_size: usize,
    /// Number of distinct species, in `[1, 255]`.
    pub num_species: usize,
    /// Iteration cap; 0 runs until quiescence.
    pub max_iterations: u32,
    /// Executor selection.
    pub strategy: StrategyKind,
    /// Write visibility for the sequential executor.
    pub update_mode: UpdateMode,
    /// `Auto` switches to the parallel executor above this side length.
    pub parallel_threshold: usize,
    /// Parallel worker count; `None` uses available hardware parallelism.
    pub workers: Option<usize>,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for CoralConfig {
    fn default() -> Self {
        Self {
            world_size: 500,
            num_species: 5,
            max_iterations: 0,
            strategy: StrategyKind::Auto,
            update_mode: UpdateMode::InPlace,
            parallel_threshold: 256,
            workers: None,
            rng_seed: None,
        }
    }
}

impl CoralConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.world_size == 0 {
            return Err(SimulationError::InvalidConfig(
                "world_size must be non-zero",
            ));
        }
        if self.world_size > MAX_WORLD_SIZE {
            return Err(SimulationError::InvalidConfig(
                "world_size must not exceed 65535",
            ));
        }
        if self.num_species == 0 || self.num_species > MAX_SPECIES {
            return Err(SimulationError::InvalidConfig(
                "num_species must be between 1 and 255",
            ));
        }
        if self.workers == Some(0) {
            return Err(SimulationError::InvalidConfig(
                "workers must be non-zero when set",
            ));
        }
        Ok(())
    }

    /// Executor that `strategy` resolves to for this world size.
    #[must_use]
    pub fn resolved_strategy(&self) -> StrategyKind {
        match self.strategy {
            StrategyKind::Auto if self.world_size > self.parallel_threshold => {
                StrategyKind::Parallel
            }
            StrategyKind::Auto => StrategyKind::Sequential,
            other => other,
        }
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    fn build_strategy(&self) -> Result<Box<dyn ExecutionStrategy>, SimulationError> {
        Ok(match self.resolved_strategy() {
            StrategyKind::Parallel => {
                Box::new(ParallelStrategy::new(self.num_species, self.workers)?)
            }
            _ => Box::new(SequentialStrategy::new(self.num_species, self.update_mode)),
        })
    }
}

/// Progress report emitted after every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    pub iteration: u32,
    pub mutated: bool,
    pub evaluated: usize,
    pub active_cells: usize,
}

/// Outcome of a run that reached quiescence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Rounds executed, including the final quiescent one.
    pub total_iterations: u32,
    pub strategy: &'static str,
}

/// One live grid plus the executor evolving it.
pub struct Simulation {
    config: CoralConfig,
    grid: Grid,
    rng: SmallRng,
    strategy: Box<dyn ExecutionStrategy>,
    total_iterations: u32,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .field("total_iterations", &self.total_iterations)
            .finish()
    }
}

impl Simulation {
    /// Allocate a grid and assign every cell a random species.
    pub fn new(config: CoralConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let mut grid = Grid::new(config.world_size)?;
        grid.randomize(config.num_species, &mut rng);
        let strategy = config.build_strategy()?;
        Ok(Self {
            config,
            grid,
            rng,
            strategy,
            total_iterations: 0,
        })
    }

    /// Start from an explicit grid instead of a random one.
    pub fn with_grid(config: CoralConfig, grid: Grid) -> Result<Self, SimulationError> {
        config.validate()?;
        if grid.world_size() != config.world_size {
            return Err(SimulationError::InvalidConfig(
                "grid size does not match world_size",
            ));
        }
        if grid
            .species()
            .iter()
            .any(|&s| usize::from(s) >= config.num_species)
        {
            return Err(SimulationError::InvalidConfig(
                "grid holds species outside [0, num_species)",
            ));
        }
        let rng = config.seeded_rng();
        let strategy = config.build_strategy()?;
        Ok(Self {
            config,
            grid,
            rng,
            strategy,
            total_iterations: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CoralConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Rounds executed by the most recent run.
    #[must_use]
    pub const fn total_iterations(&self) -> u32 {
        self.total_iterations
    }

    /// Name of the executor in use.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Borrow the simulation RNG for derived seeds (e.g. the palette walk).
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Re-randomize the grid in place and zero all counters.
    pub fn reset(&mut self) {
        self.grid.randomize(self.config.num_species, &mut self.rng);
        self.grid.reset_counters();
        self.total_iterations = 0;
    }

    /// Like [`Simulation::reset`], after reseeding the RNG.
    pub fn reset_with_seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
        self.reset();
    }

    /// Run rounds until quiescence or the iteration cap.
    pub fn run(&mut self) -> Result<RunSummary, SimulationError> {
        self.run_with_observer(|_| {})
    }

    /// Same as [`Simulation::run`], reporting every finished round to `observer`.
    pub fn run_with_observer<F>(&mut self, mut observer: F) -> Result<RunSummary, SimulationError>
    where
        F: FnMut(&RoundReport),
    {
        let cap = self.config.max_iterations;
        debug!(
            world_size = self.config.world_size,
            num_species = self.config.num_species,
            strategy = self.strategy.name(),
            cap,
            "starting run"
        );
        self.strategy.begin(&self.grid, &mut self.rng);

        let mut iteration = 0u32;
        loop {
            if cap != 0 && iteration >= cap {
                self.total_iterations = iteration;
                warn!(iterations = iteration, "iteration cap reached before quiescence");
                return Err(SimulationError::QuiescenceNotReached {
                    iterations: iteration,
                });
            }
            iteration += 1;
            let outcome = self.strategy.step(&mut self.grid, iteration);
            observer(&RoundReport {
                iteration,
                mutated: outcome.mutated,
                evaluated: outcome.evaluated,
                active_cells: outcome.active_cells,
            });
            if !outcome.mutated {
                self.total_iterations = iteration;
                info!(
                    total_iterations = iteration,
                    strategy = self.strategy.name(),
                    "grid reached quiescence"
                );
                return Ok(RunSummary {
                    total_iterations: iteration,
                    strategy: self.strategy.name(),
                });
            }
        }
    }
}

/// Result of running both executors from one seed.
#[derive(Debug)]
pub struct StrategyComparison {
    pub seed: u64,
    pub sequential_iterations: u32,
    pub parallel_iterations: u32,
    pub grids_equal: bool,
}

impl StrategyComparison {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.grids_equal && self.sequential_iterations == self.parallel_iterations
    }
}

/// Diagnostic: evolve the same initial grid with the synchronous sequential
/// executor and the parallel executor, then compare the results.
///
/// Hitting the iteration cap is not an error here; both grids are compared
/// as they stand.
pub fn compare_strategies(config: &CoralConfig) -> Result<StrategyComparison, SimulationError> {
    let seed = config.rng_seed.unwrap_or_else(rand::random);
    let base = CoralConfig {
        rng_seed: Some(seed),
        ..config.clone()
    };
    let mut sequential = Simulation::new(CoralConfig {
        strategy: StrategyKind::Sequential,
        update_mode: UpdateMode::Synchronous,
        ..base.clone()
    })?;
    let mut parallel = Simulation::new(CoralConfig {
        strategy: StrategyKind::Parallel,
        ..base
    })?;
    debug_assert!(sequential.grid().equals(parallel.grid()));

    let sequential_iterations = settle(&mut sequential)?;
    let parallel_iterations = settle(&mut parallel)?;
    let grids_equal = sequential.grid().equals(parallel.grid());
    if !grids_equal {
        warn!(seed, "sequential and parallel grids diverged");
    }
    Ok(StrategyComparison {
        seed,
        sequential_iterations,
        parallel_iterations,
        grids_equal,
    })
}

fn settle(simulation: &mut Simulation) -> Result<u32, SimulationError> {
    match simulation.run() {
        Ok(summary) => Ok(summary.total_iterations),
        Err(SimulationError::QuiescenceNotReached { iterations }) => Ok(iterations),
        Err(err) => Err(err),
    }
}
