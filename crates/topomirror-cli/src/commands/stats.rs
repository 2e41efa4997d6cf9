//! Stats command - mirror counts and invariant check

use anyhow::Result;
use clap::Args;
use topomirror_config::MirrorConfig;

use super::{open_grapher, print_info};
use crate::GlobalOptions;

/// Arguments for the stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Verify mirror invariants and fail if any is broken
    #[arg(long)]
    check: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the stats command
pub async fn execute(args: StatsArgs, config: MirrorConfig, global: GlobalOptions) -> Result<()> {
    let grapher = open_grapher(&config).await?;
    let stats = grapher.stats();
    let pending = grapher.pending_links();

    if args.json {
        let value = serde_json::json!({
            "mode": config.mode.to_string(),
            "nodes": stats.nodes,
            "edges": stats.edges,
            "links": stats.links,
            "pending": pending.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string(&value)?);
    } else {
        println!("Mirror Statistics ({})", config.mode);
        println!("=========================");
        println!("Nodes: {}", stats.nodes);
        println!("Links: {}", stats.links);
        println!("Edges: {}", stats.edges);
        println!("Pending links: {}", stats.pending);
        for link in &pending {
            println!("  {}", link);
        }
    }

    if args.check {
        let violations = grapher.check_invariants();
        if !violations.is_empty() {
            for violation in &violations {
                eprintln!("violation: {:?}", violation);
            }
            anyhow::bail!("{} invariant violation(s)", violations.len());
        }
        print_info("Invariants hold", global.quiet);
    }

    Ok(())
}
