// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use super::types::{ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Local config (.parley.local.json)
/// 3. Workspace config (.parley.json)
/// 4. Global config (~/.parley/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    local: Option<WorkspaceConfig>,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    for config in [global, workspace, local].into_iter().flatten() {
        apply_workspace_config(&mut result, &config);
    }

    // CLI options (highest precedence)
    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    if let Some(ref base_url) = config.base_url {
        result.base_url = base_url.clone();
    }

    if let Some(ref model) = config.model {
        result.model = model.clone();
    }

    if let Some(ref env) = config.api_key_env {
        result.api_key_env = env.clone();
    }

    if config.system_prompt.is_some() {
        result.system_prompt = config.system_prompt.clone();
    }

    if let Some(temperature) = config.temperature {
        result.temperature = temperature;
    }

    if let Some(max_tokens) = config.max_tokens {
        result.max_tokens = max_tokens;
    }

    if let Some(top_p) = config.top_p {
        result.top_p = top_p;
    }

    if let Some(penalty) = config.frequency_penalty {
        result.frequency_penalty = penalty;
    }

    if let Some(penalty) = config.presence_penalty {
        result.presence_penalty = penalty;
    }

    if let Some(timeout) = config.timeout_ms {
        result.timeout_ms = timeout;
    }

    if let Some(buffer) = config.event_buffer {
        result.event_buffer = buffer;
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref base_url) = cli.base_url {
        result.base_url = base_url.clone();
    }

    if let Some(ref model) = cli.model {
        result.model = model.clone();
    }

    if let Some(ref env) = cli.api_key_env {
        result.api_key_env = env.clone();
    }

    if cli.system_prompt.is_some() {
        result.system_prompt = cli.system_prompt.clone();
    }

    if let Some(temperature) = cli.temperature {
        result.temperature = temperature;
    }

    if let Some(max_tokens) = cli.max_tokens {
        result.max_tokens = max_tokens;
    }
}
