use coral_core::{CoralConfig, Simulation, StrategyKind};
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
}

fn coral() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_coral"));
    command.env_remove("CORAL_SEED").env("RUST_LOG", "warn");
    command
}

#[test]
fn single_run_writes_png_and_sidecar() {
    let dir = temp_dir("coral-cli");
    let output = coral()
        .args([
            "--world-size",
            "32",
            "--num-species",
            "2",
            "--max-iterations",
            "5000",
            "--batch",
            "1",
            "--seed",
            "1",
            "--strategy",
            "sequential",
            "--no-progress",
            "--output-dir",
        ])
        .arg(&dir)
        .output()
        .expect("spawn coral");
    assert!(
        output.status.success(),
        "coral failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
        .expect("output dir")
        .map(|entry| entry.expect("entry").path())
        .collect();
    entries.sort();
    let sidecars: Vec<&PathBuf> = entries
        .iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    let images: Vec<&PathBuf> = entries
        .iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    assert_eq!(sidecars.len(), 1, "entries: {entries:?}");
    assert_eq!(images.len(), 1, "entries: {entries:?}");

    // The same seed run in-process gives the reference grid.
    let mut reference = Simulation::new(CoralConfig {
        world_size: 32,
        num_species: 2,
        max_iterations: 5_000,
        strategy: StrategyKind::Sequential,
        rng_seed: Some(1),
        ..CoralConfig::default()
    })
    .expect("simulation");
    let settled = reference.run().expect("quiescent");

    let text = std::fs::read_to_string(sidecars[0]).expect("read sidecar");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["worldX"], 32);
    assert_eq!(value["worldY"], 32);
    assert_eq!(value["totalIterations"], settled.total_iterations);
    let cells = value["cells"].as_array().expect("cells");
    assert_eq!(cells.len(), 32 * 32);
    for (index, cell) in cells.iter().enumerate() {
        assert_eq!(cell["lastUpdateFrame"], reference.grid().last_mutation()[index]);
        assert_eq!(cell["numUpdates"], reference.grid().times_mutated()[index]);
    }

    let suffix = format!("_{}", settled.total_iterations);
    for path in [sidecars[0], images[0]] {
        let stem = path.file_stem().and_then(|s| s.to_str()).expect("stem");
        assert!(stem.ends_with(&suffix), "{stem} lacks {suffix}");
    }
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn verify_reports_matching_executors() {
    let output = coral()
        .args([
            "--world-size",
            "24",
            "--num-species",
            "4",
            "--max-iterations",
            "20000",
            "--seed",
            "9",
            "--workers",
            "3",
            "--verify",
        ])
        .output()
        .expect("spawn coral");
    assert!(
        output.status.success(),
        "verify failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("seed 9"));
    assert!(stdout.contains("grids equal: true"));
}

#[test]
fn rejects_zero_species() {
    let output = coral()
        .args(["--num-species", "0", "--batch", "1", "--no-progress"])
        .output()
        .expect("spawn coral");
    assert!(!output.status.success());
}
