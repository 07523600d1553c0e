//! Sequential active-set and row-partitioned parallel round execution.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::RngCore;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SimulationError;
use crate::active::ActiveSet;
use crate::grid::{Grid, moore_neighbors};
use crate::rule;

/// Rounds between active-set compactions.
pub const COMPACTION_INTERVAL: u32 = 256;

/// Worker count used when hardware parallelism cannot be detected.
pub const DEFAULT_WORKERS: usize = 4;

/// What a single round did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// At least one cell changed species.
    pub mutated: bool,
    /// Cells evaluated this round.
    pub evaluated: usize,
    /// Cells scheduled for the following round.
    pub active_cells: usize,
}

/// Common interface of the round executors.
pub trait ExecutionStrategy: Send {
    /// Stable identifier used in logs and summaries.
    fn name(&self) -> &'static str;

    /// Prepare per-run state for the grid about to be evolved.
    fn begin(&mut self, grid: &Grid, rng: &mut dyn RngCore);

    /// Execute round `iteration` (1-based) against `grid`.
    fn step(&mut self, grid: &mut Grid, iteration: u32) -> RoundOutcome;
}

/// How the sequential strategy publishes species writes within a round.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Writes land immediately, so cells later in the scan observe them.
    /// Trajectories can differ from the parallel strategy.
    #[default]
    InPlace,
    /// Every read in a round sees the round's starting species; writes are
    /// staged and applied after the scan. Matches the parallel strategy
    /// round for round, but majority voting can settle into a period-2
    /// cycle that never reaches quiescence.
    Synchronous,
}

/// Round-scoped scratch, cleared between rounds with capacity retained.
#[derive(Debug, Default)]
struct RoundScratch {
    histogram: Vec<u32>,
    removed: Vec<u32>,
    woken: Vec<u32>,
    staged: Vec<(u32, u8)>,
}

impl RoundScratch {
    fn reset(&mut self) {
        self.removed.clear();
        self.woken.clear();
        self.staged.clear();
    }
}

/// Single-threaded scan over the active set.
#[derive(Debug)]
pub struct SequentialStrategy {
    mode: UpdateMode,
    active: ActiveSet,
    scratch: RoundScratch,
}

impl SequentialStrategy {
    #[must_use]
    pub fn new(num_species: usize, mode: UpdateMode) -> Self {
        Self {
            mode,
            active: ActiveSet::default(),
            scratch: RoundScratch {
                histogram: vec![0; num_species],
                ..RoundScratch::default()
            },
        }
    }

    #[must_use]
    pub const fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Cells scheduled for the next round.
    #[must_use]
    pub fn active(&self) -> &ActiveSet {
        &self.active
    }
}

impl ExecutionStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        match self.mode {
            UpdateMode::InPlace => "sequential",
            UpdateMode::Synchronous => "sequential-synchronous",
        }
    }

    fn begin(&mut self, grid: &Grid, rng: &mut dyn RngCore) {
        self.active.fill_shuffled(grid.len(), rng);
    }

    fn step(&mut self, grid: &mut Grid, iteration: u32) -> RoundOutcome {
        if iteration.is_multiple_of(COMPACTION_INTERVAL) {
            self.active.compact();
            debug!(iteration, active = self.active.len(), "compacted active set");
        }

        let Self {
            mode,
            active,
            scratch,
        } = self;
        scratch.reset();
        let world_size = grid.world_size();
        let evaluated = active.len();
        let mut mutated = false;

        for &cell in active.as_slice() {
            let index = cell as usize;
            let transition = rule::evaluate(
                grid.species(),
                world_size,
                index,
                iteration,
                &mut scratch.histogram,
            );
            if transition.dormant {
                scratch.removed.push(cell);
            }
            if transition.species == grid.species()[index] {
                continue;
            }
            mutated = true;
            match mode {
                UpdateMode::Synchronous => scratch.staged.push((cell, transition.species)),
                UpdateMode::InPlace => grid.record_mutation(index, transition.species, iteration),
            }
            scratch.woken.push(cell);
            scratch
                .woken
                .extend(moore_neighbors(world_size, index).map(|n| n as u32));
        }

        for &(cell, species) in &scratch.staged {
            grid.record_mutation(cell as usize, species, iteration);
        }
        for &cell in &scratch.removed {
            active.remove(cell);
        }
        for &cell in &scratch.woken {
            active.insert(cell);
        }

        RoundOutcome {
            mutated,
            evaluated,
            active_cells: active.len(),
        }
    }
}

/// Row-band partitioned full scan with double-buffered grids.
pub struct ParallelStrategy {
    num_species: usize,
    workers: usize,
    pool: rayon::ThreadPool,
    next: Grid,
    /// One histogram per row band, reused across rounds.
    histograms: Vec<Vec<u32>>,
}

impl std::fmt::Debug for ParallelStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelStrategy")
            .field("num_species", &self.num_species)
            .field("workers", &self.workers)
            .finish()
    }
}

impl ParallelStrategy {
    /// Build a strategy with `workers` threads, or one per available core.
    pub fn new(num_species: usize, workers: Option<usize>) -> Result<Self, SimulationError> {
        let workers = workers.unwrap_or_else(available_workers).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("coral-worker-{idx}"))
            .build()?;
        Ok(Self {
            num_species,
            workers,
            pool,
            next: Grid::default(),
            histograms: Vec::new(),
        })
    }

    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }
}

/// Hardware parallelism, falling back to [`DEFAULT_WORKERS`].
#[must_use]
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(DEFAULT_WORKERS)
}

impl ExecutionStrategy for ParallelStrategy {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn begin(&mut self, grid: &Grid, _rng: &mut dyn RngCore) {
        self.next.clone_from(grid);
    }

    fn step(&mut self, grid: &mut Grid, iteration: u32) -> RoundOutcome {
        if self.next.world_size() != grid.world_size() {
            self.next.clone_from(grid);
        }
        let world_size = grid.world_size();
        let rows_per_band = world_size.div_ceil(self.workers).max(1);
        let band_len = rows_per_band * world_size;
        let bands = grid.len().div_ceil(band_len);
        let num_species = self.num_species;
        self.histograms.resize_with(bands, || vec![0; num_species]);

        let mutated = AtomicBool::new(false);
        let current = &*grid;
        let Self {
            pool,
            next,
            histograms,
            ..
        } = &mut *self;
        let (species_out, times_out, last_out) = next.columns_mut();

        pool.install(|| {
            species_out
                .par_chunks_mut(band_len)
                .zip(times_out.par_chunks_mut(band_len))
                .zip(last_out.par_chunks_mut(band_len))
                .zip(histograms.par_iter_mut())
                .enumerate()
                .for_each(|(band, (((species_band, times_band), last_band), histogram))| {
                    let offset = band * band_len;
                    let mut band_mutated = false;
                    for local in 0..species_band.len() {
                        let index = offset + local;
                        let previous = current.species()[index];
                        let transition = rule::evaluate(
                            current.species(),
                            world_size,
                            index,
                            iteration,
                            histogram,
                        );
                        species_band[local] = transition.species;
                        if transition.species == previous {
                            times_band[local] = current.times_mutated()[index];
                            last_band[local] = current.last_mutation()[index];
                        } else {
                            band_mutated = true;
                            times_band[local] = current.times_mutated()[index] + 1;
                            last_band[local] = iteration;
                        }
                    }
                    if band_mutated {
                        let _ = mutated.compare_exchange(
                            false,
                            true,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                    }
                });
        });

        std::mem::swap(grid, &mut self.next);
        RoundOutcome {
            mutated: mutated.load(Ordering::Acquire),
            evaluated: grid.len(),
            active_cells: grid.len(),
        }
    }
}
