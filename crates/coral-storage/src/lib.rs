//! Image and JSON sidecar artifacts for finished Coral runs.

use std::{
    collections::VecDeque,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

use coral_core::Grid;
use coral_render::{RenderError, RenderSettings, render_image, save_png};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// Storage error wrapper.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sidecar serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("artifact worker error: {0}")]
    Worker(String),
}

/// Per-cell entry of the JSON sidecar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    pub last_update_frame: u32,
    pub num_updates: u32,
}

/// JSON sidecar describing one finished run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifact {
    pub total_iterations: u32,
    pub world_x: usize,
    pub world_y: usize,
    /// Row-major, `world_x * world_y` entries.
    pub cells: Vec<CellRecord>,
}

impl RunArtifact {
    /// Snapshot the counters of `grid`.
    #[must_use]
    pub fn from_grid(grid: &Grid, total_iterations: u32) -> Self {
        let cells = grid
            .last_mutation()
            .iter()
            .zip(grid.times_mutated())
            .map(|(&last_update_frame, &num_updates)| CellRecord {
                last_update_frame,
                num_updates,
            })
            .collect();
        Self {
            total_iterations,
            world_x: grid.world_size(),
            world_y: grid.world_size(),
            cells,
        }
    }
}

/// Read a sidecar previously written by [`ArtifactWriter`].
pub fn read_sidecar(path: &Path) -> Result<RunArtifact, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Paths of the two files emitted for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub image: PathBuf,
    pub sidecar: PathBuf,
}

impl ArtifactPaths {
    /// `<dir>/<timestamp>_<iterations>{suffix}.png|json`.
    #[must_use]
    pub fn new(dir: &Path, timestamp_millis: u128, iterations: u32, suffix: &str) -> Self {
        let stem = format!("{timestamp_millis}_{iterations}{suffix}");
        Self {
            image: dir.join(format!("{stem}.png")),
            sidecar: dir.join(format!("{stem}.json")),
        }
    }

    /// First free pair of names for the current wall-clock time.
    #[must_use]
    pub fn unique(dir: &Path, iterations: u32) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut paths = Self::new(dir, timestamp, iterations, "");
        let mut attempt = 1u32;
        while paths.image.exists() || paths.sidecar.exists() {
            paths = Self::new(dir, timestamp, iterations, &format!("-{attempt}"));
            attempt += 1;
        }
        paths
    }
}

/// Everything needed to emit a run's artifacts.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub grid: Grid,
    pub total_iterations: u32,
    pub render_seed: u64,
}

/// Synchronous writer for run artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    mutation_strength: f32,
}

impl ArtifactWriter {
    /// Create the output directory if needed.
    pub fn open(dir: impl Into<PathBuf>, mutation_strength: f32) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            mutation_strength,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render and write the PNG, then the JSON sidecar.
    pub fn write(&self, record: &RunRecord) -> Result<ArtifactPaths, StorageError> {
        let paths = ArtifactPaths::unique(&self.dir, record.total_iterations);
        let image = render_image(
            &record.grid,
            record.total_iterations,
            RenderSettings::new(self.mutation_strength, record.render_seed),
        )?;
        save_png(&image, &paths.image)?;

        let artifact = RunArtifact::from_grid(&record.grid, record.total_iterations);
        let mut out = BufWriter::new(File::create(&paths.sidecar)?);
        serde_json::to_writer(&mut out, &artifact)?;
        out.flush()?;

        debug!(
            image = %paths.image.display(),
            sidecar = %paths.sidecar.display(),
            "wrote run artifacts"
        );
        Ok(paths)
    }
}

/// Artifact paths retained by a [`PipelineReport`].
pub const RECENT_ARTIFACTS: usize = 16;

/// Totals reported when an [`ArtifactPipeline`] shuts down.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Runs written successfully.
    pub written: usize,
    pub failures: usize,
    /// Paths of the last [`RECENT_ARTIFACTS`] runs written, oldest first.
    pub recent: VecDeque<ArtifactPaths>,
}

impl PipelineReport {
    /// Count a written run, evicting the oldest retained paths when full.
    pub fn record(&mut self, paths: ArtifactPaths) {
        self.written += 1;
        if self.recent.len() == RECENT_ARTIFACTS {
            self.recent.pop_front();
        }
        self.recent.push_back(paths);
    }
}

#[derive(Debug)]
enum ArtifactCommand {
    Write(Box<RunRecord>),
    Shutdown,
}

/// Background worker that encodes and writes artifacts while the next run
/// proceeds.
pub struct ArtifactPipeline {
    tx: mpsc::Sender<ArtifactCommand>,
    handle: Option<thread::JoinHandle<PipelineReport>>,
}

impl ArtifactPipeline {
    pub fn new(writer: ArtifactWriter) -> Result<Self, StorageError> {
        let (tx, rx) = mpsc::channel::<ArtifactCommand>();
        let handle = thread::Builder::new()
            .name("coral-artifact-worker".into())
            .spawn(move || {
                let mut report = PipelineReport::default();
                while let Ok(command) = rx.recv() {
                    match command {
                        ArtifactCommand::Write(record) => match writer.write(&record) {
                            Ok(paths) => report.record(paths),
                            Err(err) => {
                                error!(
                                    total_iterations = record.total_iterations,
                                    "failed to write run artifacts: {err}"
                                );
                                report.failures += 1;
                            }
                        },
                        ArtifactCommand::Shutdown => break,
                    }
                }
                report
            })
            .map_err(|err| {
                StorageError::Worker(format!("failed to spawn artifact worker thread: {err}"))
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a finished run for writing.
    pub fn submit(&self, record: RunRecord) -> Result<(), StorageError> {
        self.tx
            .send(ArtifactCommand::Write(Box::new(record)))
            .map_err(|_| StorageError::Worker("artifact worker has stopped".into()))
    }

    /// Drain queued work and stop the worker.
    pub fn finish(mut self) -> Result<PipelineReport, StorageError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<PipelineReport, StorageError> {
        let _ = self.tx.send(ArtifactCommand::Shutdown);
        match self.handle.take() {
            Some(handle) => {
                let report = handle
                    .join()
                    .map_err(|_| StorageError::Worker("artifact worker panicked".into()))?;
                info!(
                    written = report.written,
                    failures = report.failures,
                    "artifact worker drained"
                );
                Ok(report)
            }
            None => Ok(PipelineReport::default()),
        }
    }
}

impl Drop for ArtifactPipeline {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_uses_camel_case_fields() {
        let mut grid = Grid::new(2).expect("grid");
        grid.record_mutation(1, 0, 4);
        let artifact = RunArtifact::from_grid(&grid, 5);
        let value = serde_json::to_value(&artifact).expect("json");
        assert_eq!(value["totalIterations"], 5);
        assert_eq!(value["worldX"], 2);
        assert_eq!(value["worldY"], 2);
        assert_eq!(value["cells"].as_array().map(Vec::len), Some(4));
        assert_eq!(value["cells"][1]["lastUpdateFrame"], 4);
        assert_eq!(value["cells"][1]["numUpdates"], 1);
        assert_eq!(value["cells"][0]["numUpdates"], 0);
    }

    #[test]
    fn report_keeps_count_but_bounds_paths() {
        let mut report = PipelineReport::default();
        let total = RECENT_ARTIFACTS as u32 + 5;
        for iterations in 0..total {
            report.record(ArtifactPaths::new(Path::new("out"), 1, iterations, ""));
        }
        assert_eq!(report.written, total as usize);
        assert_eq!(report.recent.len(), RECENT_ARTIFACTS);
        assert_eq!(
            report.recent.front().map(|p| p.image.clone()),
            Some(PathBuf::from("out/1_5.png"))
        );
        assert_eq!(
            report.recent.back().map(|p| p.image.clone()),
            Some(PathBuf::from(format!("out/1_{}.png", total - 1)))
        );
    }

    #[test]
    fn names_embed_timestamp_and_iterations() {
        let paths = ArtifactPaths::new(Path::new("out"), 1_700_000_000_123, 42, "");
        assert_eq!(paths.image, Path::new("out/1700000000123_42.png"));
        assert_eq!(paths.sidecar, Path::new("out/1700000000123_42.json"));
        let again = ArtifactPaths::new(Path::new("out"), 1, 2, "-3");
        assert_eq!(again.sidecar, Path::new("out/1_2-3.json"));
    }
}
