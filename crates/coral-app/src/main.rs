use anyhow::{Context, Result, bail};
use clap::Parser;
use coral_app::{BatchPlan, Cli, ProgressLine, run_batch};
use coral_core::compare_strategies;
use coral_storage::ArtifactWriter;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.engine_config();
    config.validate().context("invalid simulation settings")?;

    if cli.verify {
        return verify(&cli);
    }

    let writer = ArtifactWriter::open(&cli.output_dir, cli.mut_str).with_context(|| {
        format!(
            "failed to prepare output directory {}",
            cli.output_dir.display()
        )
    })?;
    let plan = BatchPlan {
        config,
        runs: cli.batch_limit(),
        mutation_strength: cli.mut_str,
    };
    let mut progress = ProgressLine::stderr(!cli.no_progress);
    let summary = run_batch(&plan, writer, &mut progress)?;
    info!(
        completed = summary.completed,
        capped = summary.capped,
        written = summary.artifacts.written,
        failures = summary.artifacts.failures,
        "batch finished"
    );
    if summary.artifacts.failures > 0 {
        bail!(
            "{} run(s) failed to write artifacts",
            summary.artifacts.failures
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn verify(cli: &Cli) -> Result<()> {
    let comparison =
        compare_strategies(&cli.engine_config()).context("strategy comparison failed")?;
    println!(
        "seed {} | sequential {} | parallel {} | grids equal: {}",
        comparison.seed,
        comparison.sequential_iterations,
        comparison.parallel_iterations,
        comparison.grids_equal
    );
    if !comparison.is_consistent() {
        bail!(
            "sequential and parallel executors diverged for seed {}",
            comparison.seed
        );
    }
    Ok(())
}
