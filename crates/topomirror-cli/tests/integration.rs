//! Integration tests for the topomirror CLI
//!
//! Each test writes a small topology snapshot into a temporary directory and
//! runs the binary against it, with HOME pointed there so no user config leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;
use topomirror_core::{Link, Node};
use topomirror_store::TopologySnapshot;

/// Get a Command for the topomirror binary, isolated in `dir`
#[allow(deprecated)]
fn topomirror(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("topomirror").expect("Failed to find topomirror binary");
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("TOPOMIRROR_TOPOLOGY")
        .env_remove("TOPOMIRROR_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Triangle sw1-sw2-sw3 with a slow shortcut, an isolated sw4 and one dangling link.
fn setup_topology() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let mut snapshot = TopologySnapshot::default();
    snapshot.push(Node::with_id("n1", "sw1").with_port("p1a").with_port("p1c").into());
    snapshot.push(Node::with_id("n2", "sw2").with_port("p2a").with_port("p2b").into());
    snapshot.push(
        Node::with_id("n3", "sw3")
            .with_port("p3b")
            .with_port("p3c")
            .with_port("p3x")
            .into(),
    );
    snapshot.push(Node::with_id("n4", "sw4").into());
    snapshot.push(
        Link::undirected("p1a", "p2a")
            .with_id("l12")
            .with_property("latency", 1)
            .into(),
    );
    snapshot.push(
        Link::undirected("p2b", "p3b")
            .with_id("l23")
            .with_property("latency", 1)
            .into(),
    );
    snapshot.push(
        Link::undirected("p1c", "p3c")
            .with_id("l13")
            .with_property("latency", 5)
            .into(),
    );
    snapshot.push(Link::directed("p3x", "remote").with_id("dangling").into());

    snapshot
        .save(&temp.path().join("topology.json"))
        .expect("Failed to write topology");
    temp
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn test_stats_counts() {
    let temp = setup_topology();

    topomirror(temp.path())
        .args(["--topology", "topology.json", "stats", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes: 4"))
        .stdout(predicate::str::contains("Links: 3"))
        .stdout(predicate::str::contains("Edges: 6"))
        .stderr(predicate::str::contains("Invariants hold"));
}

#[test]
fn test_stats_live_keeps_dangling_link_pending() {
    let temp = setup_topology();

    let output = topomirror(temp.path())
        .args(["--topology", "topology.json", "stats", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["mode"], "live");
    assert_eq!(stats["pending"], serde_json::json!(["dangling"]));
}

#[test]
fn test_stats_static_drops_dangling_link() {
    let temp = setup_topology();

    let output = topomirror(temp.path())
        .args(["--topology", "topology.json", "--mode", "static", "stats", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["mode"], "static");
    assert_eq!(stats["links"], 3);
    assert_eq!(stats["pending"], serde_json::json!([]));
}

#[test]
fn test_missing_topology_is_an_error() {
    let temp = TempDir::new().unwrap();

    topomirror(temp.path())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No topology snapshot"));
}

// ============================================================================
// Analysis
// ============================================================================

#[test]
fn test_neighbors() {
    let temp = setup_topology();

    topomirror(temp.path())
        .args(["--topology", "topology.json", "neighbors", "sw2"])
        .assert()
        .success()
        .stdout("sw1\nsw3\n");
}

#[test]
fn test_neighbors_unknown_node() {
    let temp = setup_topology();

    topomirror(temp.path())
        .args(["--topology", "topology.json", "neighbors", "sw9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Node 'sw9' not found"));
}

#[test]
fn test_sssp_json() {
    let temp = setup_topology();

    let output = topomirror(temp.path())
        .args(["--topology", "topology.json", "-q", "sssp", "sw1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let paths: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(paths["sw2"], serde_json::json!(["sw1", "sw2"]));
    assert_eq!(paths["sw3"], serde_json::json!(["sw1", "sw3"]));
    assert!(paths.get("sw4").is_none());
}

#[test]
fn test_path_by_hops_and_by_weight() {
    let temp = setup_topology();

    topomirror(temp.path())
        .args(["--topology", "topology.json", "path", "sw1", "sw3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cost: 1"))
        .stdout(predicate::str::contains("Path: sw1 -> sw3"));

    topomirror(temp.path())
        .args([
            "--topology",
            "topology.json",
            "path",
            "sw1",
            "sw3",
            "--weight",
            "latency",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cost: 2"))
        .stdout(predicate::str::contains("Path: sw1 -> sw2 -> sw3"));
}

#[test]
fn test_path_to_isolated_node() {
    let temp = setup_topology();

    topomirror(temp.path())
        .args(["--topology", "topology.json", "path", "sw1", "sw4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No path from 'sw1' to 'sw4'"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_supplies_topology_and_weights() {
    let temp = setup_topology();
    let config_path = temp.path().join("mirror.toml");
    std::fs::write(
        &config_path,
        r#"
mode = "static"

[store]
topology = "topology.json"

[analysis]
weights = ["latency"]
"#,
    )
    .unwrap();

    topomirror(temp.path())
        .args(["--config", "mirror.toml", "-q", "path", "sw1", "sw3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cost\":5.0").not())
        .stdout(predicate::str::contains("\"cost\":1.0"));

    // the attached weight is used when asked for
    topomirror(temp.path())
        .args(["--config", "mirror.toml", "-q", "path", "sw1", "sw3", "-w", "latency"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cost\":2.0"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let temp = setup_topology();

    topomirror(temp.path())
        .args(["--config", "nope.toml", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config file"));
}

#[test]
fn test_config_init_and_show() {
    let temp = TempDir::new().unwrap();

    topomirror(temp.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Created"));
    assert!(temp.path().join(".topomirror/config.toml").exists());

    topomirror(temp.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    topomirror(temp.path())
        .args(["--mode", "static", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode = \"static\""));
}

#[test]
fn test_local_config_is_picked_up() {
    let temp = setup_topology();
    std::fs::create_dir_all(temp.path().join(".topomirror")).unwrap();
    std::fs::write(
        temp.path().join(".topomirror/config.toml"),
        "[store]\ntopology = \"topology.json\"\n",
    )
    .unwrap();

    topomirror(temp.path())
        .args(["neighbors", "sw1"])
        .assert()
        .success()
        .stdout("sw2\nsw3\n");
}
