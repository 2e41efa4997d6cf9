//! topomirror configuration management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.topomirror/config.toml`
//! - Local config: `.topomirror/config.toml` (in the working directory)
//! - An explicit config file given on the command line
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local (or explicit file) → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration for topomirror.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MirrorConfig {
    /// Whether local changes propagate to the store
    pub mode: GraphMode,

    /// Topology store configuration
    pub store: StoreConfig,

    /// Analysis configuration
    pub analysis: AnalysisConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Operating mode of the grapher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
    /// Mirror follows store notifications; local changes are written to the store first
    #[default]
    Live,
    /// Mirror is built once from a snapshot and only changes locally
    Static,
}

impl fmt::Display for GraphMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphMode::Live => write!(f, "live"),
            GraphMode::Static => write!(f, "static"),
        }
    }
}

impl FromStr for GraphMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(GraphMode::Live),
            "static" => Ok(GraphMode::Static),
            other => Err(ConfigError::invalid_value(
                "mode",
                format!("unknown mode '{other}', expected 'live' or 'static'"),
            )),
        }
    }
}

/// Topology store configuration.
///
/// # Example TOML
///
/// ```toml
/// [store]
/// topology = "topology.json"
/// commit = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot used to seed the in-memory store
    pub topology: Option<PathBuf>,

    /// Address of a remote store, for transports that need one
    pub url: Option<String>,

    /// Make every write durable before it returns
    pub commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            topology: None,
            url: None,
            commit: true,
        }
    }
}

/// Analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Link properties to attach as edge weights after loading
    pub weights: Vec<String>,

    /// Cost of an edge that lacks the requested weight
    pub default_weight: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            weights: Vec::new(),
            default_weight: 1.0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override operating mode
    pub mode: Option<GraphMode>,

    /// Override topology snapshot file
    pub topology: Option<PathBuf>,

    /// Override log level
    pub log_level: Option<String>,

    /// Extra weights to attach
    pub weights: Vec<String>,
}

impl MirrorConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }

        if let Some(ref topology) = overrides.topology {
            self.store.topology = Some(topology.clone());
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }

        for weight in &overrides.weights {
            if !self.analysis.weights.contains(weight) {
                self.analysis.weights.push(weight.clone());
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }
        if !self.analysis.default_weight.is_finite() || self.analysis.default_weight < 0.0 {
            return Err(ConfigError::invalid_value(
                "analysis.default_weight",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }

    /// Resolve the topology snapshot path against a base directory.
    pub fn topology_path(&self, base: &Path) -> Option<PathBuf> {
        self.store.topology.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                base.join(path)
            }
        })
    }
}
