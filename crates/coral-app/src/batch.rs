//! Batch driver: evolve, hand finished grids to the artifact worker, reset.

use std::io::Write;

use anyhow::{Context, Result};
use coral_core::{CoralConfig, Simulation, SimulationError};
use coral_storage::{ArtifactPipeline, ArtifactWriter, PipelineReport, RunRecord};
use rand::Rng;
use tracing::{info, warn};

use crate::progress::ProgressLine;

/// Knobs for one batch invocation.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub config: CoralConfig,
    /// `None` runs until the process is stopped.
    pub runs: Option<u64>,
    pub mutation_strength: f32,
}

/// Totals for a finished batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub completed: u64,
    pub capped: u64,
    pub artifacts: PipelineReport,
}

/// Run the batch, writing artifacts for every run that reaches quiescence.
pub fn run_batch<W: Write>(
    plan: &BatchPlan,
    writer: ArtifactWriter,
    progress: &mut ProgressLine<W>,
) -> Result<BatchSummary> {
    let base_seed = plan.config.rng_seed;
    let mut simulation =
        Simulation::new(plan.config.clone()).context("failed to build simulation")?;
    let pipeline = ArtifactPipeline::new(writer).context("failed to start artifact worker")?;
    info!(
        strategy = simulation.strategy_name(),
        world_size = plan.config.world_size,
        num_species = plan.config.num_species,
        runs = ?plan.runs,
        "starting batch"
    );

    let mut summary = BatchSummary::default();
    let mut run = 0u64;
    while plan.runs.is_none_or(|limit| run < limit) {
        if run > 0 {
            match base_seed {
                Some(seed) => simulation.reset_with_seed(seed.wrapping_add(run)),
                None => simulation.reset(),
            }
        }

        let outcome = simulation.run_with_observer(|report| {
            if let Err(err) = progress.update(run, report) {
                warn!("progress line write failed: {err}");
            }
        });
        progress.finish().context("failed to finish progress line")?;

        match outcome {
            Ok(result) => {
                let render_seed = simulation.rng().random::<u64>();
                pipeline
                    .submit(RunRecord {
                        grid: simulation.grid().clone(),
                        total_iterations: result.total_iterations,
                        render_seed,
                    })
                    .context("failed to queue run artifacts")?;
                info!(run, total_iterations = result.total_iterations, "run finished");
                summary.completed += 1;
            }
            Err(SimulationError::QuiescenceNotReached { iterations }) => {
                warn!(run, iterations, "run hit the iteration cap; skipping artifacts");
                summary.capped += 1;
            }
            Err(err) => return Err(err).context("simulation run failed"),
        }
        run += 1;
    }

    summary.artifacts = pipeline.finish().context("artifact worker failed")?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coral_storage::read_sidecar;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn bounded_batch_writes_each_run() {
        let dir = temp_dir("coral-batch");
        let plan = BatchPlan {
            config: CoralConfig {
                world_size: 32,
                num_species: 2,
                max_iterations: 5_000,
                rng_seed: Some(0),
                ..CoralConfig::default()
            },
            runs: Some(3),
            mutation_strength: 4.0,
        };
        let writer = ArtifactWriter::open(&dir, plan.mutation_strength).expect("writer");
        let mut progress = ProgressLine::new(Vec::new(), false);
        let summary = run_batch(&plan, writer, &mut progress).expect("batch");
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.capped, 0);
        assert_eq!(summary.artifacts.written, 3);
        assert_eq!(summary.artifacts.failures, 0);

        // Base seed 0: run `i` replays a standalone simulation seeded with `i`.
        for (run, paths) in summary.artifacts.recent.iter().enumerate() {
            let mut expected = Simulation::new(CoralConfig {
                rng_seed: Some(run as u64),
                ..plan.config.clone()
            })
            .expect("simulation");
            let settled = expected.run().expect("quiescent");

            assert!(paths.image.exists());
            let artifact = read_sidecar(&paths.sidecar).expect("sidecar");
            assert_eq!(artifact.total_iterations, settled.total_iterations);
            assert_eq!(artifact.cells.len(), 32 * 32);
            for (cell, (&last, &times)) in artifact.cells.iter().zip(
                expected
                    .grid()
                    .last_mutation()
                    .iter()
                    .zip(expected.grid().times_mutated()),
            ) {
                assert_eq!(cell.last_update_frame, last);
                assert_eq!(cell.num_updates, times);
            }
        }
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn capped_runs_are_skipped_not_fatal() {
        let dir = temp_dir("coral-batch-capped");
        let plan = BatchPlan {
            config: CoralConfig {
                world_size: 32,
                num_species: 4,
                max_iterations: 1,
                rng_seed: Some(17),
                ..CoralConfig::default()
            },
            runs: Some(2),
            mutation_strength: 1.0,
        };
        let writer = ArtifactWriter::open(&dir, plan.mutation_strength).expect("writer");
        let mut progress = ProgressLine::new(Vec::new(), false);
        let summary = run_batch(&plan, writer, &mut progress).expect("batch");
        // A random 32x32 grid with four species always mutates in round one.
        assert_eq!(summary.capped, 2);
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.artifacts.written, 0);
        assert!(summary.artifacts.recent.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }
}
