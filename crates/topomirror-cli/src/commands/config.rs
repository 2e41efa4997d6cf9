//! Config command - view and initialize configuration

use anyhow::{Context, Result};
use clap::Subcommand;
use topomirror_config::{ConfigLoader, MirrorConfig};

use super::{print_info, working_dir};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a local config file with defaults
    Init,

    /// Show configuration file paths
    Path,
}

/// Execute the config command
pub async fn execute(cmd: ConfigCommand, config: MirrorConfig, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => execute_show(&config, json),
        ConfigCommand::Init => execute_init(&global),
        ConfigCommand::Path => execute_path(&global),
    }
}

fn execute_show(config: &MirrorConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!(
            "{}",
            toml::to_string_pretty(config).context("Failed to render configuration")?
        );
    }
    Ok(())
}

fn execute_init(global: &GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let dir = working_dir()?;
    let existed = loader.local_config_path(&dir).exists();

    let path = loader
        .init_local(&dir)
        .context("Failed to create local config")?;

    if existed {
        print_info(
            &format!("Config already exists at {}", path.display()),
            global.quiet,
        );
    } else {
        print_info(&format!("Created {}", path.display()), global.quiet);
    }
    Ok(())
}

fn execute_path(global: &GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let local = match global.config {
        Some(ref path) => path.clone(),
        None => loader.local_config_path(&working_dir()?),
    };

    match loader.global_config_path() {
        Some(path) => println!("global: {} ({})", path.display(), existence(path.exists())),
        None => println!("global: (no home directory)"),
    }
    println!("local: {} ({})", local.display(), existence(local.exists()));
    Ok(())
}

fn existence(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "missing"
    }
}
