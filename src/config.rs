use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{LinkerError, Result};
use crate::types::Reference;

/// Default name of the configuration file looked up next to the input.
pub const CONFIG_FILENAME: &str = "csdl-link.json";

/// Default bound on forward-reference rounds.
pub const DEFAULT_FORWARD_REFERENCE_PASSES: u32 = 16;

/// Configuration for a linking run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Aliases applied before the document's own references. The document
    /// wins when both declare the same alias.
    pub vocabulary_aliases: Vec<Reference>,
    /// How many rounds annotation lists targeting other annotations get.
    /// `1` gives a single retry after the first pass.
    pub forward_reference_passes: u32,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            vocabulary_aliases: Vec::new(),
            forward_reference_passes: DEFAULT_FORWARD_REFERENCE_PASSES,
        }
    }
}

/// Returns the path of the default configuration file inside `dir`.
pub fn get_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILENAME)
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

/// Loads a configuration file.
///
/// A missing file yields the default configuration. Files ending in `.toml`
/// are read as TOML, anything else as JSON.
pub fn load_config(path: &Path) -> Result<LinkerConfig> {
    if !path.exists() {
        return Ok(LinkerConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(|e| LinkerError::Config {
        message: format!("failed to read config file '{}': {}", path.display(), e),
    })?;

    let parsed = if is_toml(path) {
        toml::from_str::<LinkerConfig>(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<LinkerConfig>(&contents).map_err(|e| e.to_string())
    };

    parsed.map_err(|e| LinkerError::Config {
        message: format!("failed to parse config file '{}': {}", path.display(), e),
    })
}

/// Saves the configuration using an atomic write.
///
/// Writes to a temporary file first and then renames it to the final location,
/// ensuring that a partial write never corrupts the configuration.
pub fn save_config(path: &Path, config: &LinkerConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| LinkerError::Config {
            message: format!("failed to create config directory '{}': {}", parent.display(), e),
        })?;
    }

    let serialized = if is_toml(path) {
        toml::to_string_pretty(config).map_err(|e| e.to_string())
    } else {
        serde_json::to_string_pretty(config).map_err(|e| e.to_string())
    }
    .map_err(|e| LinkerError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &serialized).map_err(|e| LinkerError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, path).map_err(|e| LinkerError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            path.display(),
            e
        ),
    })?;

    Ok(())
}
