// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

use super::types::WorkspaceConfig;

/// Workspace config file names, first match wins.
pub const CONFIG_FILES: &[&str] = &[".parley.json", ".parley/config.json", "parley.config.yaml"];

/// Local config file name (personal overrides, usually gitignored).
pub const LOCAL_CONFIG_FILE: &str = ".parley.local.json";

/// Global config directory name under the home directory.
pub const GLOBAL_CONFIG_DIR: &str = ".parley";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Get the global config file path (`~/.parley/config.json`).
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Load global configuration, if present.
pub fn load_global_config() -> Result<Option<WorkspaceConfig>, ConfigError> {
    match global_config_path() {
        Some(path) => load_optional(&path),
        None => Ok(None),
    }
}

/// Load the first workspace config file found in `workspace_root`.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load `.parley.local.json` from `workspace_root`, if present.
pub fn load_local_config(workspace_root: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    load_optional(&workspace_root.join(LOCAL_CONFIG_FILE))
}

fn load_optional(path: &Path) -> Result<Option<WorkspaceConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

/// Load a configuration file. YAML by `.yaml`/`.yml` extension, JSON otherwise.
pub fn load_config_file(path: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "Loading config file");

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}
