use crate::domain::{config::MultiComConfig, error::{MultiComError, MultiComResult}};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "multicom.yaml";

/// On-disk configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else is read as YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    paths: Vec<PathBuf>,
}

impl ConfigManager {
    /// Create a manager over the given files, or the default file when empty
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let paths = if paths.is_empty() {
            vec![PathBuf::from(DEFAULT_CONFIG_FILE)]
        } else {
            paths
        };
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Load and merge every file in order.
    ///
    /// `on_event` sees each file before it is read and every failure; a file
    /// that fails contributes nothing.
    pub fn load_config<F>(&self, mut on_event: F) -> MultiComConfig
    where
        F: FnMut(LoadEvent<'_>),
    {
        let mut config = MultiComConfig::default();

        for path in &self.paths {
            on_event(LoadEvent::Reading(path));
            match self.load_config_from_path(path) {
                Ok(file_config) => {
                    debug!("{} defines {} device(s)", path.display(), file_config.len());
                    config.merge(file_config);
                }
                Err(e) => on_event(LoadEvent::Failed(&e)),
            }
        }

        config
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> MultiComResult<MultiComConfig> {
        let content = fs::read_to_string(path).map_err(|e| MultiComError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        parse_config(&content, ConfigFormat::from_path(path)).map_err(|message| {
            MultiComError::ConfigFile {
                path: path.to_path_buf(),
                message,
            }
        })
    }
}

/// Progress of [`ConfigManager::load_config`]
#[derive(Debug)]
pub enum LoadEvent<'a> {
    Reading(&'a Path),
    Failed(&'a MultiComError),
}

/// Decode a configuration document
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<MultiComConfig, String> {
    let root: Value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| format!("Failed to parse YAML: {}", e))?,
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {}", e))?
        }
    };

    MultiComConfig::from_value(root)
}
