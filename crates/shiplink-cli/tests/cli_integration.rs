//! Integration tests for shiplink-cli functionality.
//! Runs the built binary against the bundled scenarios, and checks the
//! library calls the commands rely on.

use std::path::PathBuf;
use std::process::{Command, Output};

fn scenario(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(name)
}

fn shiplink(args: &[&str], config_dir: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shiplink"))
        .arg("--config")
        .arg(config_dir)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run shiplink")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_run_dock_moves_only_what_fits() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dock = scenario("dock.toml");
    let output = shiplink(&["run", dock.to_str().unwrap()], tmpdir.path());
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.contains("Loaded 2 groups"));
    assert!(out.contains("alignment 100.0%  quota 4  moved 3"));
    assert!(out.contains("(4, 0, 1)  7 items"));
    assert!(out.contains("(0, 0, 1)  64 items"));
}

#[test]
fn test_run_json_reports() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dock = scenario("dock.toml");
    let output = shiplink(
        &["run", dock.to_str().unwrap(), "--ticks", "100", "--json"],
        tmpdir.path(),
    );
    assert!(output.status.success());

    let reports: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["records"][0]["moved"], 3);
    assert_eq!(reports[1]["records"][0]["moved"], 0);
}

#[test]
fn test_config_interval_applies() {
    let tmpdir = tempfile::tempdir().unwrap();
    std::fs::write(
        tmpdir.path().join("shiplink.toml"),
        "[transfer]\ninterval_ticks = 10\n",
    )
    .unwrap();
    let dock = scenario("dock.toml");
    let output = shiplink(&["run", dock.to_str().unwrap(), "--ticks", "5"], tmpdir.path());
    assert!(output.status.success());
    assert!(stdout(&output).contains("No scheduler run within 5 ticks."));
}

#[test]
fn test_invalid_config_fails() {
    let tmpdir = tempfile::tempdir().unwrap();
    std::fs::write(tmpdir.path().join("shiplink.toml"), "[transfer]\nbase_rate = 0\n").unwrap();
    let dock = scenario("dock.toml");
    let output = shiplink(&["run", dock.to_str().unwrap()], tmpdir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("base_rate"));
}

#[test]
fn test_double_chest_scenario_with_deferred_node() {
    let tmpdir = tempfile::tempdir().unwrap();
    let path = scenario("double_chest.toml");
    let output = shiplink(&["run", path.to_str().unwrap()], tmpdir.path());
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let out = stdout(&output);
    assert!(out.contains("1 pending"));
    assert!(out.contains("moved 4"));
    assert!(out.contains("(0, 0, -1)  124 items"));
    assert!(out.contains("(0, 1, 20)  4 items"));
}

#[test]
fn test_save_info_and_validate() {
    let tmpdir = tempfile::tempdir().unwrap();
    let world_dir = tmpdir.path().join("world");
    let dock = scenario("dock.toml");
    let output = shiplink(
        &[
            "run",
            dock.to_str().unwrap(),
            "--save",
            world_dir.to_str().unwrap(),
        ],
        tmpdir.path(),
    );
    assert!(output.status.success());
    assert!(world_dir.join("shiplink/network.json").exists());

    let info = shiplink(&["info", world_dir.to_str().unwrap()], tmpdir.path());
    assert!(info.status.success());
    let out = stdout(&info);
    assert!(out.contains("Groups: 2"));
    assert!(out.contains("Storage groups: 2"));
    assert!(out.contains("export  facing east"));

    // The double chest world keeps a node at (0, 0, 0) and nothing else of the dock.
    let other = scenario("double_chest.toml");
    let validate = shiplink(
        &[
            "validate",
            world_dir.to_str().unwrap(),
            "--scenario",
            other.to_str().unwrap(),
        ],
        tmpdir.path(),
    );
    assert!(validate.status.success());
    let out = stdout(&validate);
    assert!(out.contains("Nodes dropped: 1"));
    assert!(out.contains("Containers dropped: 2"));
    assert!(out.contains("1 groups, 0 storage groups after validation"));
}

#[test]
fn test_info_without_save() {
    let tmpdir = tempfile::tempdir().unwrap();
    let output = shiplink(&["info", tmpdir.path().to_str().unwrap()], tmpdir.path());
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No network save found"));
}

#[test]
fn test_storage_load_nonexistent() {
    let tmpdir = tempfile::tempdir().unwrap();
    let world = shiplink_core::memory::MemoryWorld::new();
    let result = shiplink_core::storage::load(
        tmpdir.path(),
        shiplink_core::ShiplinkConfig::default(),
        &world,
    );
    assert!(result.is_err(), "loading from empty dir should fail");
}

#[test]
fn test_storage_save_empty_network() {
    let tmpdir = tempfile::tempdir().unwrap();
    let mut net = shiplink_core::Network::default();
    shiplink_core::storage::save(tmpdir.path(), &mut net).unwrap();
    let saved = shiplink_core::storage::load_saved(tmpdir.path()).unwrap();
    assert_eq!(saved.version, shiplink_core::schema::CURRENT_VERSION);
    assert!(saved.groups.is_empty());
    assert!(saved.saved_at.is_some());
}
