//! Batch driver plumbing for the `coral` binary.

pub mod batch;
pub mod cli;
pub mod progress;

pub use batch::{BatchPlan, BatchSummary, run_batch};
pub use cli::{Cli, StrategyArg};
pub use progress::ProgressLine;
