//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.topomirror/config.toml`
//! 2. Local config: `.topomirror/config.toml` (or an explicit file)
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::ConfigError;
use crate::{ConfigOverrides, GraphMode, LogFormat, MirrorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global and local configuration directory name.
const CONFIG_DIR: &str = ".topomirror";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.topomirror`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<ConfigLayer>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.topomirror`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Get the global config file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Get the local config file path for a directory.
    pub fn local_config_path(&self, dir: &Path) -> PathBuf {
        dir.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a directory with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        dir: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<MirrorConfig, ConfigError> {
        let local = self.local_layer(dir)?;
        self.assemble(local, overrides)
    }

    /// Load configuration using an explicit file in place of the local one.
    ///
    /// Merges config in order: global → `path` → overrides. A missing file
    /// is an error here, unlike the implicit local config.
    pub fn load_from(
        &mut self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<MirrorConfig, ConfigError> {
        debug!("Loading config from {:?}", path);
        let explicit = read_layer(path)?;
        self.assemble(Some(explicit), overrides)
    }

    fn assemble(
        &mut self,
        layer: Option<ConfigLayer>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<MirrorConfig, ConfigError> {
        let mut config = MirrorConfig::default();

        if let Some(global) = self.global_layer()? {
            global.apply_to(&mut config);
        }

        if let Some(layer) = layer {
            layer.apply_to(&mut config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<MirrorConfig>, ConfigError> {
        Ok(self.global_layer()?.map(ConfigLayer::resolve))
    }

    /// Load only the local configuration for a directory.
    pub fn load_local(&self, dir: &Path) -> Result<Option<MirrorConfig>, ConfigError> {
        Ok(self.local_layer(dir)?.map(ConfigLayer::resolve))
    }

    fn global_layer(&mut self) -> Result<Option<ConfigLayer>, ConfigError> {
        if let Some(ref layer) = self.global_config {
            return Ok(Some(layer.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let layer = read_layer(&global_path)?;
        self.global_config = Some(layer.clone());

        Ok(Some(layer))
    }

    fn local_layer(&self, dir: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
        let local_path = self.local_config_path(dir);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        read_layer(&local_path).map(Some)
    }

    /// Save configuration to the local config file for a directory.
    pub fn save_local(&self, dir: &Path, config: &MirrorConfig) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(dir), config)
    }

    /// Initialize local configuration for a directory.
    ///
    /// Creates `.topomirror/config.toml` with default configuration.
    pub fn init_local(&self, dir: &Path) -> Result<PathBuf, ConfigError> {
        let config_path = self.local_config_path(dir);
        if !config_path.exists() {
            save_config_file(&config_path, &MirrorConfig::default())?;
        }
        Ok(config_path)
    }

    /// Clear cached global configuration.
    ///
    /// Forces reload on next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

/// Load a configuration file from disk.
fn read_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Save a configuration file to disk.
fn save_config_file(path: &Path, config: &MirrorConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// One config file as written.
///
/// Keys the file leaves out stay `None`, so a later file only changes what
/// it mentions and can still set a value back to its default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    mode: Option<GraphMode>,
    store: StoreLayer,
    analysis: AnalysisLayer,
    logging: LoggingLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct StoreLayer {
    topology: Option<PathBuf>,
    url: Option<String>,
    commit: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AnalysisLayer {
    weights: Vec<String>,
    default_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingLayer {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigLayer {
    /// Overlay this layer on `config`. Weight lists accumulate.
    fn apply_to(self, config: &mut MirrorConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }

        let store = &mut config.store;
        if self.store.topology.is_some() {
            store.topology = self.store.topology;
        }
        if self.store.url.is_some() {
            store.url = self.store.url;
        }
        if let Some(commit) = self.store.commit {
            store.commit = commit;
        }

        let analysis = &mut config.analysis;
        for weight in self.analysis.weights {
            if !analysis.weights.contains(&weight) {
                analysis.weights.push(weight);
            }
        }
        if let Some(default_weight) = self.analysis.default_weight {
            analysis.default_weight = default_weight;
        }

        if let Some(level) = self.logging.level {
            config.logging.level = level;
        }
        if let Some(format) = self.logging.format {
            config.logging.format = format;
        }
    }

    /// This layer on top of the defaults
    fn resolve(self) -> MirrorConfig {
        let mut config = MirrorConfig::default();
        self.apply_to(&mut config);
        config
    }
}
