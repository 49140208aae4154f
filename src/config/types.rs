// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`WorkspaceConfig`] is the on-disk shape (every field optional, camelCase,
//! JSON or YAML). [`ResolvedConfig`] is the result of merging every source
//! over the defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::events::DEFAULT_EVENT_BUFFER;
use crate::session::SessionOptions;
use crate::transport::openai::{DEFAULT_TIMEOUT_SECS, OPENAI_BASE_URL};
use crate::types::{SamplingConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

/// Default model id.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration file contents.
/// Can be defined in .parley.json, .parley/config.json or parley.config.yaml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name to use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Environment variable the API key is read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// System prompt seeding every conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    /// HTTP timeout for one generation, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Broadcast capacity of the session event bus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_buffer: Option<usize>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub timeout_ms: u64,
    pub event_buffer: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            timeout_ms: DEFAULT_TIMEOUT_SECS * 1000,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ResolvedConfig {
    /// Check value ranges the provider would reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::invalid("temperature", "must be between 0 and 2"));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::invalid("topP", "must be in (0, 1]"));
        }
        for (field, value) in [
            ("frequencyPenalty", self.frequency_penalty),
            ("presencePenalty", self.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                return Err(ConfigError::invalid(field, "must be between -2 and 2"));
            }
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid("maxTokens", "must be greater than 0"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("baseUrl", "must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model", "must not be empty"));
        }
        Ok(())
    }

    /// Sampling parameters for requests.
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }

    /// Options for a new session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            sampling: self.sampling(),
            tools: Vec::new(),
            system_prompt: self.system_prompt.clone(),
            event_buffer: self.event_buffer,
        }
    }
}
