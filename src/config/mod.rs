// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for Parley.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.parley/config.json
//! - Workspace config: .parley.json, .parley/config.json, or parley.config.yaml
//! - Local config: .parley.local.json (gitignored, for personal overrides)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > local > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    global_config_path, load_config_file, load_global_config, load_local_config,
    load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE, LOCAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, CliOptions};

pub use types::{ResolvedConfig, WorkspaceConfig, DEFAULT_API_KEY_ENV, DEFAULT_MODEL};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge and validate all configuration sources for a workspace.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;
    let local = load_local_config(workspace_root)?;

    let config = merge_config(global, workspace, local, cli_options);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        // Values may come from a global config; they must still be valid
        assert!(!config.model.is_empty());
        assert!(!config.base_url.is_empty());
    }

    #[test]
    fn test_load_config_with_workspace_and_local() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".parley.json"),
            r#"{"model": "gpt-4o", "systemPrompt": "You are terse."}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            r#"{"model": "my-local-model"}"#,
        )
        .unwrap();

        let config = load_config(temp.path(), CliOptions::default()).unwrap();
        assert_eq!(config.model, "my-local-model");
        assert_eq!(config.system_prompt.as_deref(), Some("You are terse."));
    }

    #[test]
    fn test_load_config_cli_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".parley.json"), r#"{"model": "gpt-4o"}"#).unwrap();

        let cli = CliOptions {
            model: Some("llama3.2".to_string()),
            ..Default::default()
        };

        let config = load_config(temp.path(), cli).unwrap();
        assert_eq!(config.model, "llama3.2"); // CLI wins
    }

    #[test]
    fn test_load_config_rejects_out_of_range() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".parley.json"), r#"{"temperature": 3.5}"#).unwrap();

        let result = load_config(temp.path(), CliOptions::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
