// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OpenAI-compatible streaming transport.
//!
//! Talks to any endpoint implementing the Chat Completions streaming
//! protocol (OpenAI, Ollama, Azure OpenAI, Together, Groq, etc.).
//!
//! # Supported Endpoints
//!
//! - **OpenAI** - `https://api.openai.com/v1` (default)
//! - **Ollama** - `http://localhost:11434/v1` (no API key needed)
//! - **Any OpenAI-compatible** - Just set base_url
//!
//! # API Reference
//!
//! See [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat)

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use super::sse::{SseData, SseLineDecoder};
use super::{ChatTransport, ChunkStream};
use crate::config::ResolvedConfig;
use crate::error::ProviderError;
use crate::tools::ToolDescriptor;
use crate::types::{
    CompletionRequest, Message, Role, StreamChunk, TokenUsage, ToolCallFragment,
};

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Ollama API base URL.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// OpenAI-compatible transport.
pub struct OpenAiTransport {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    provider_name: String,
}

impl OpenAiTransport {
    /// Create a new transport.
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let provider_name = Self::detect_provider_name(&base_url);

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url,
            timeout,
            provider_name,
        })
    }

    /// Create a transport for OpenAI.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            Some(api_key.into()),
            model,
            OPENAI_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a transport for Ollama (no API key needed).
    pub fn ollama(model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            None,
            model,
            OLLAMA_BASE_URL,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a transport from resolved configuration.
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`. It may be absent for local endpoints, but the public
    /// OpenAI endpoint refuses to start without one.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        if api_key.is_none() && config.base_url.contains("openai.com") {
            return Err(ProviderError::NotConfigured(format!(
                "{} is not set",
                config.api_key_env
            )));
        }

        Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Detect provider name from base URL.
    fn detect_provider_name(base_url: &str) -> String {
        if base_url.contains("openai.com") {
            "OpenAI".to_string()
        } else if base_url.contains("localhost:11434") || base_url.contains("ollama") {
            "Ollama".to_string()
        } else if base_url.contains("azure") {
            "Azure OpenAI".to_string()
        } else if base_url.contains("together") {
            "Together".to_string()
        } else if base_url.contains("groq") {
            "Groq".to_string()
        } else {
            "OpenAI-Compatible".to_string()
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build the request body for the Chat Completions API.
    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let sampling = &request.sampling;
        ChatRequest {
            model: self.model.clone(),
            messages: wire_messages(&request.messages),
            tools: request.tools.clone(),
            max_tokens: Some(sampling.max_tokens),
            temperature: Some(sampling.temperature),
            top_p: Some(sampling.top_p),
            frequency_penalty: Some(sampling.frequency_penalty),
            presence_penalty: Some(sampling.presence_penalty),
            stream: request.stream,
            stream_options: request.stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }

    #[cfg(feature = "telemetry")]
    fn operation_name(&self) -> String {
        format!(
            "{}.open_stream",
            self.provider_name.to_lowercase().replace(' ', "_")
        )
    }
}

#[async_trait]
impl ChatTransport for OpenAiTransport {
    async fn open_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        let body = self.build_request(&request);
        let start = Instant::now();

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.as_ref().map_or(0, Vec::len),
            "Opening chat stream"
        );

        let mut req = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json");

        if let Some(ref api_key) = self.api_key {
            req = req.header("authorization", format!("Bearer {}", api_key));
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            sent = req.json(&body).send() => sent.map_err(|e| self.map_send_error(e))?,
        };

        let status = response.status();

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation(&self.operation_name(), start.elapsed());

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(handle_error_response(status.as_u16(), &error_text));
        }

        debug!(elapsed = ?start.elapsed(), "Chat stream opened");
        Ok(sse_chunk_stream(response.bytes_stream().boxed(), cancel))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Map an error response from the API.
fn handle_error_response(status_code: u16, body: &str) -> ProviderError {
    let Ok(error) = serde_json::from_str::<ApiError>(body) else {
        return match status_code {
            401 | 403 => ProviderError::AuthError(body.to_string()),
            429 => ProviderError::RateLimited(body.to_string()),
            _ => ProviderError::api(body.to_string(), status_code),
        };
    };

    let detail = error.error;
    let kinds = [
        detail.error_type.as_deref(),
        detail.code.as_ref().and_then(|c| c.as_str()),
    ];
    let is = |names: &[&str]| kinds.iter().flatten().any(|k| names.contains(k));

    if is(&["authentication_error", "invalid_api_key"]) || matches!(status_code, 401 | 403) {
        ProviderError::AuthError(detail.message)
    } else if is(&["rate_limit_error", "rate_limit_exceeded"]) || status_code == 429 {
        ProviderError::RateLimited(detail.message)
    } else if is(&["model_not_found"]) {
        ProviderError::ModelNotFound(detail.message)
    } else {
        ProviderError::api(detail.message, status_code)
    }
}

// ============================================================================
// SSE Body Decoding
// ============================================================================

/// Read state of one response body.
struct SseStream<S> {
    body: S,
    lines: SseLineDecoder,
    pending: VecDeque<Result<StreamChunk, ProviderError>>,
    finished: bool,
    cancel: CancellationToken,
}

impl<S> SseStream<S> {
    fn enqueue(&mut self, data: SseData) {
        if self.finished {
            return;
        }
        match data {
            SseData::Done => {
                trace!("Stream terminator received");
                self.finished = true;
            }
            SseData::Payload(json) => match parse_stream_payload(&json) {
                Ok(Some(chunk)) => self.pending.push_back(Ok(chunk)),
                Ok(None) => {}
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                }
            },
        }
    }
}

/// Turn a raw SSE byte stream into a chunk stream.
///
/// Every read races `cancel`; on cancellation the stream ends and the body
/// is dropped. The stream also ends at `[DONE]` or at the first error.
pub(crate) fn sse_chunk_stream<S, B, E>(body: S, cancel: CancellationToken) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseStream {
        body,
        lines: SseLineDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        cancel,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            let read = tokio::select! {
                biased;
                _ = st.cancel.cancelled() => {
                    trace!("Body read cancelled");
                    return None;
                }
                read = st.body.next() => read,
            };

            match read {
                Some(Ok(bytes)) => {
                    for data in st.lines.push(bytes.as_ref()) {
                        st.enqueue(data);
                    }
                }
                Some(Err(e)) => {
                    st.pending
                        .push_back(Err(ProviderError::StreamError(e.to_string())));
                    st.finished = true;
                }
                None => {
                    for data in st.lines.finish() {
                        st.enqueue(data);
                    }
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

/// Decode one `data:` payload. Chunks carrying nothing are dropped.
fn parse_stream_payload(json: &str) -> Result<Option<StreamChunk>, ProviderError> {
    let chunk: ChatStreamChunk = serde_json::from_str(json)
        .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, json)))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::StreamError(error.message));
    }

    let chunk = StreamChunk::from(chunk);
    Ok((!chunk.is_empty()).then_some(chunk))
}

// ============================================================================
// API Types
// ============================================================================

/// Request body for Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDescriptor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

/// Chat message format.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Tool call recorded on an assistant message.
#[derive(Debug, Serialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    arguments: String,
}

/// Streaming chunk.
#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

/// Choice in streaming chunk.
#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: ChatStreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Delta in streaming.
#[derive(Debug, Default, Deserialize)]
struct ChatStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatStreamToolCall>>,
}

/// Tool-call fragment in a streaming delta.
#[derive(Debug, Deserialize)]
struct ChatStreamToolCall {
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChatStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Token usage.
#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

// ============================================================================
// Type Conversions
// ============================================================================

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|c| ChatToolCall {
                    id: c.id.clone(),
                    call_type: "function",
                    function: ChatFunction {
                        name: c.name.clone(),
                        arguments: c.arguments_json.clone(),
                    },
                })
                .collect()
        });

        Self {
            role: msg.role.as_str(),
            content: msg.content.clone(),
            tool_calls,
            tool_call_id: match msg.role {
                Role::Tool => msg.tool_call_id.clone(),
                _ => None,
            },
        }
    }
}

/// Convert history to wire messages.
///
/// History keeps a turn's text after its tool-call message, but the API
/// requires tool results to follow the tool-call message directly, so that
/// text is folded into the tool-call message's `content`.
fn wire_messages(messages: &[Message]) -> Vec<ChatMessage> {
    let mut wire: Vec<ChatMessage> = Vec::with_capacity(messages.len());
    for msg in messages {
        let is_plain_assistant = msg.role == Role::Assistant && !msg.has_tool_calls();
        if is_plain_assistant {
            if let Some(prev) = wire.last_mut() {
                if prev.role == Role::Assistant.as_str()
                    && prev.tool_calls.is_some()
                    && prev.content.is_none()
                {
                    prev.content = msg.content.clone();
                    continue;
                }
            }
        }
        wire.push(ChatMessage::from(msg));
    }
    wire
}

impl From<ChatUsage> for TokenUsage {
    fn from(usage: ChatUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

impl From<ChatStreamChunk> for StreamChunk {
    fn from(chunk: ChatStreamChunk) -> Self {
        let mut out = StreamChunk {
            usage: chunk.usage.map(TokenUsage::from),
            ..Default::default()
        };

        // Only the first choice is consumed; requests never ask for n > 1.
        if let Some(choice) = chunk.choices.into_iter().find(|c| c.index == 0) {
            if let Some(ref reason) = choice.finish_reason {
                trace!(finish_reason = %reason, "Choice finished");
            }

            out.text_delta = choice.delta.content;

            for (position, tc) in choice.delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
                let function = tc.function.unwrap_or(ChatStreamFunction {
                    name: None,
                    arguments: None,
                });
                out.tool_calls.push(ToolCallFragment {
                    index: tc.index.unwrap_or(position as u32),
                    id: tc.id,
                    name: function.name,
                    arguments: function.arguments,
                });
            }
        }

        out
    }
}
