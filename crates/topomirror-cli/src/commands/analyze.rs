//! Analysis commands - neighbors, hop-count paths and weighted paths

use anyhow::Result;
use clap::Args;
use topomirror_config::MirrorConfig;

use super::{node_name, open_grapher, resolve_node};
use crate::GlobalOptions;

/// Arguments for the neighbors command
#[derive(Args, Debug)]
pub struct NeighborsArgs {
    /// Node name (or id)
    node: String,
}

/// Arguments for the sssp command
#[derive(Args, Debug)]
pub struct SsspArgs {
    /// Source node name (or id)
    source: String,
}

/// Arguments for the path command
#[derive(Args, Debug)]
pub struct PathArgs {
    /// Start node name (or id)
    from: String,

    /// Target node name (or id)
    to: String,

    /// Link property to use as edge cost; every edge costs the default weight without it
    #[arg(long, short = 'w')]
    weight: Option<String>,
}

pub async fn execute_neighbors(
    args: NeighborsArgs,
    config: MirrorConfig,
    global: GlobalOptions,
) -> Result<()> {
    let grapher = open_grapher(&config).await?;
    let id = resolve_node(&grapher, &args.node)?;

    let mut names: Vec<String> = grapher
        .with_graph(|g| g.adjacent(&id))
        .iter()
        .map(|n| node_name(&grapher, n))
        .collect();
    names.sort();

    if names.is_empty() && !global.quiet {
        eprintln!("'{}' has no neighbors", args.node);
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub async fn execute_sssp(args: SsspArgs, config: MirrorConfig, global: GlobalOptions) -> Result<()> {
    let grapher = open_grapher(&config).await?;
    let id = resolve_node(&grapher, &args.source)?;

    let mut rows: Vec<(String, Vec<String>)> = grapher
        .with_graph(|g| g.shortest_paths_from(&id))
        .into_iter()
        .filter(|(target, _)| target != &id)
        .map(|(target, path)| {
            let names = path.iter().map(|n| node_name(&grapher, n)).collect();
            (node_name(&grapher, &target), names)
        })
        .collect();
    rows.sort();

    if global.quiet {
        let value: serde_json::Map<String, serde_json::Value> = rows
            .into_iter()
            .map(|(target, path)| (target, serde_json::json!(path)))
            .collect();
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    for (target, path) in rows {
        println!("{} ({} hops): {}", target, path.len() - 1, path.join(" -> "));
    }
    Ok(())
}

pub async fn execute_path(args: PathArgs, config: MirrorConfig, global: GlobalOptions) -> Result<()> {
    let grapher = open_grapher(&config).await?;
    let from = resolve_node(&grapher, &args.from)?;
    let to = resolve_node(&grapher, &args.to)?;

    if let Some(ref weight) = args.weight {
        if !config.analysis.weights.contains(weight) {
            grapher.add_weight(weight)?;
        }
    }

    let default_weight = config.analysis.default_weight;
    let Some((cost, path)) = grapher.with_graph(|g| {
        g.shortest_path(&from, &to, args.weight.as_deref(), default_weight)
    }) else {
        anyhow::bail!("No path from '{}' to '{}'", args.from, args.to);
    };

    let names: Vec<String> = path.iter().map(|n| node_name(&grapher, n)).collect();
    if global.quiet {
        println!("{}", serde_json::json!({ "cost": cost, "path": names }));
    } else {
        println!("Cost: {}", cost);
        println!("Path: {}", names.join(" -> "));
    }
    Ok(())
}
