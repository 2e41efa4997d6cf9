//! CLI command implementations

pub mod analyze;
pub mod config;
pub mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use topomirror_config::{ConfigLoader, MirrorConfig};
use topomirror_core::NodeId;
use topomirror_grapher::Grapher;
use topomirror_store::{MemoryStore, TopologySnapshot};
use tracing::debug;

use crate::GlobalOptions;

/// Directory relative paths in the configuration are resolved against.
pub fn working_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration with optional config file override.
pub fn load_config(global: &GlobalOptions) -> Result<MirrorConfig> {
    let mut loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    if let Some(ref config_path) = global.config {
        return loader
            .load_from(config_path, Some(&overrides))
            .with_context(|| format!("Failed to load config file {}", config_path.display()));
    }

    loader
        .load(&working_dir()?, Some(&overrides))
        .context("Failed to load configuration")
}

/// Seed an in-memory store from the configured snapshot and build a grapher over it.
///
/// Weights listed in the configuration are attached once the mirror is loaded.
pub async fn open_grapher(config: &MirrorConfig) -> Result<Grapher> {
    let path = config.topology_path(&working_dir()?).ok_or_else(|| {
        anyhow::anyhow!("No topology snapshot given (use --topology or set store.topology)")
    })?;

    let snapshot = TopologySnapshot::load(&path)
        .with_context(|| format!("Failed to load topology from {}", path.display()))?;
    let store = Arc::new(MemoryStore::from_snapshot(snapshot));

    let grapher = Grapher::connect(store, config.mode)
        .await
        .context("Failed to build mirror")?
        .with_commit(config.store.commit);

    for weight in &config.analysis.weights {
        let edges = grapher
            .add_weight(weight)
            .with_context(|| format!("Failed to attach weight '{weight}'"))?;
        debug!(weight = %weight, edges, "attached configured weight");
    }

    Ok(grapher)
}

/// Find a node by name, falling back to its id.
pub fn resolve_node(grapher: &Grapher, name: &str) -> Result<NodeId> {
    if let Some(id) = grapher.node_id(name) {
        return Ok(id);
    }
    let id = NodeId::new(name);
    if grapher.with_graph(|g| g.contains_node(&id)) {
        return Ok(id);
    }
    anyhow::bail!("Node '{}' not found", name)
}

/// Display name of a node, or its id if it is gone.
pub fn node_name(grapher: &Grapher, id: &NodeId) -> String {
    grapher.with_graph(|g| {
        g.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    })
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
