// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types for the Parley session adapter.
//!
//! This module defines the fundamental data structures shared by the session,
//! the transports and callers: conversation messages, tool-call payloads in
//! their fragmentary and finalized forms, stream chunks, usage metering and
//! the sampling configuration sent with every request.

use serde::{Deserialize, Serialize};

use crate::tools::ToolDescriptor;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the assistant, as recorded in history.
///
/// `arguments_json` keeps the exact payload the model produced so the
/// transcript replays byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments_json: arguments_json.into(),
        }
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// Text content. Absent on assistant messages that only request tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Id of the tool call this message answers (role = tool only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls requested in this turn (role = assistant only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Create an assistant message carrying every tool call of one turn.
    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(calls),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }

    /// Text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Tool calls requested by this message, empty for anything else.
    pub fn requested_tool_calls(&self) -> &[ToolCallRequest] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    /// Check if this is an assistant message requesting tools.
    pub fn has_tool_calls(&self) -> bool {
        !self.requested_tool_calls().is_empty()
    }
}

// ============================================================================
// Tool Calls
// ============================================================================

/// A finalized tool call: arguments reassembled and parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One piece of a tool call as streamed by the provider.
///
/// `index` is the position of the call within the current turn; it is not
/// globally unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallFragment {
    /// Create an empty fragment for an index.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, chunk: impl Into<String>) -> Self {
        self.arguments = Some(chunk.into());
        self
    }
}

// ============================================================================
// Token Usage & Stream Chunks
// ============================================================================

/// Token usage reported by the provider, normally on the final chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens generated
    pub completion_tokens: u32,
    /// Total as reported by the provider
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Create a usage record from prompt and completion counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Create a usage record that only carries a total.
    pub fn with_total(total_tokens: u32) -> Self {
        Self {
            total_tokens,
            ..Default::default()
        }
    }

    /// Get total tokens, falling back to prompt + completion.
    pub fn total(&self) -> u32 {
        if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.prompt_tokens + self.completion_tokens
        }
    }
}

/// One decoded chunk of a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text increment, if the chunk carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_delta: Option<String>,
    /// Tool-call fragments in provider order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,
    /// Usage totals (terminal chunk only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    /// A chunk carrying only a text delta.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            text_delta: Some(delta.into()),
            ..Default::default()
        }
    }

    /// A chunk carrying a single tool-call fragment.
    pub fn fragment(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }

    /// A chunk carrying only usage.
    pub fn usage(usage: TokenUsage) -> Self {
        Self {
            usage: Some(usage),
            ..Default::default()
        }
    }

    /// Check if the chunk carries nothing the decoder acts on.
    pub fn is_empty(&self) -> bool {
        self.text_delta.as_deref().map_or(true, str::is_empty)
            && self.tool_calls.is_empty()
            && self.usage.is_none()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Sampling parameters sent with every generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Nucleus-sampling threshold
    pub top_p: f32,
    /// Frequency penalty (-2.0 - 2.0)
    pub frequency_penalty: f32,
    /// Presence penalty (-2.0 - 2.0)
    pub presence_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl SamplingConfig {
    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens.
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// A streaming completion request handed to a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// History snapshot, in transcript order.
    pub messages: Vec<Message>,
    pub sampling: SamplingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDescriptor>>,
    /// Always true for requests built by the session.
    pub stream: bool,
}

impl CompletionRequest {
    /// Build a streaming request.
    pub fn streaming(
        messages: Vec<Message>,
        sampling: SamplingConfig,
        tools: Option<Vec<ToolDescriptor>>,
    ) -> Self {
        Self {
            messages,
            sampling,
            tools: tools.filter(|t| !t.is_empty()),
            stream: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello, world!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.as_text(), Some("Hello, world!"));
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_assistant_tool_calls_message() {
        let msg = Message::assistant_tool_calls(vec![
            ToolCallRequest::new("a", "one", "{}"),
            ToolCallRequest::new("b", "two", "{\"x\":1}"),
        ]);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.content.is_none());
        assert_eq!(msg.requested_tool_calls().len(), 2);
    }

    #[test]
    fn test_tool_result_serialization() {
        let msg = Message::tool_result("call_1", "sunny");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"tool\""));
        assert!(json.contains("\"tool_call_id\":\"call_1\""));
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn test_token_usage_total() {
        assert_eq!(TokenUsage::new(100, 50).total(), 150);
        assert_eq!(TokenUsage::with_total(42).total(), 42);
        let partial = TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 4,
            total_tokens: 0,
        };
        assert_eq!(partial.total(), 7);
    }

    #[test]
    fn test_stream_chunk_is_empty() {
        assert!(StreamChunk::default().is_empty());
        assert!(StreamChunk::text("").is_empty());
        assert!(!StreamChunk::text("a").is_empty());
        assert!(!StreamChunk::fragment(ToolCallFragment::new(0)).is_empty());
        assert!(!StreamChunk::usage(TokenUsage::default()).is_empty());
    }

    #[test]
    fn test_completion_request_drops_empty_tools() {
        let req = CompletionRequest::streaming(vec![], SamplingConfig::default(), Some(vec![]));
        assert!(req.tools.is_none());
        assert!(req.stream);
    }

    #[test]
    fn test_sampling_defaults() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.temperature, 0.7);
        assert_eq!(sampling.max_tokens, 1000);
        assert_eq!(sampling.top_p, 1.0);
    }
}
