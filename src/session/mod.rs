// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streaming chat session.
//!
//! A [`ChatSession`] owns the conversation history and drives one generation
//! at a time against a [`ChatTransport`]:
//!
//! 1. The caller appends a user message or tool result and a generation starts.
//! 2. Chunks are decoded as they arrive. Text increments are emitted
//!    immediately; tool-call fragments are buffered per index.
//! 3. At natural stream end the turn is committed to history and tool-call
//!    and completion signals fire.
//! 4. If the generation is stopped, nothing is committed and a single
//!    aborted signal fires instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley::session::{ChatSession, SessionOptions, TurnOutcome};
//! use parley::transport::OpenAiTransport;
//!
//! let transport = OpenAiTransport::openai(api_key, "gpt-4o-mini")?;
//! let session = ChatSession::new(transport, SessionOptions::default().with_system_prompt("Be brief."));
//!
//! session.on_delta(|text| print!("{}", text));
//! if let TurnOutcome::Completed(turn) = session.send_user_message("Hello!").await? {
//!     println!("\n{} tokens", turn.usage.map_or(0, |u| u.total()));
//! }
//! ```

pub mod accumulator;
pub mod cancel;
pub mod decoder;
pub mod dispatcher;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, debug_span, error, Instrument};

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::{GenerationOutcome, GLOBAL_METRICS};

use crate::error::{ProviderError, SessionError};
use crate::events::{EventBus, SessionEvent, SignalError, SubscriptionId, DEFAULT_EVENT_BUFFER};
use crate::history::ConversationHistory;
use crate::tools::ToolDescriptor;
use crate::transport::{ChatTransport, SharedTransport};
use crate::types::{CompletionRequest, Message, SamplingConfig, TokenUsage, ToolCall};

pub use cancel::{CancellationController, GenerationGuard, GenerationId, StopHandle};
pub use decoder::{DecodedTurn, StreamDecoder};
pub use dispatcher::TurnCompletion;

/// Options for a new session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub sampling: SamplingConfig,
    /// Tools advertised with every request.
    pub tools: Vec<ToolDescriptor>,
    /// Seeds the history when set.
    pub system_prompt: Option<String>,
    /// Broadcast capacity of the event bus.
    pub event_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            tools: Vec::new(),
            system_prompt: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SessionOptions {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }
}

/// How a generation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The stream ended naturally and the turn was committed.
    Completed(TurnCompletion),
    /// The generation was stopped; nothing was committed.
    Aborted,
}

impl TurnOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub fn completion(&self) -> Option<&TurnCompletion> {
        match self {
            Self::Completed(c) => Some(c),
            Self::Aborted => None,
        }
    }

    pub fn into_completion(self) -> Option<TurnCompletion> {
        match self {
            Self::Completed(c) => Some(c),
            Self::Aborted => None,
        }
    }
}

struct SessionState {
    history: ConversationHistory,
    decoder: StreamDecoder,
    sampling: SamplingConfig,
    tools: Vec<ToolDescriptor>,
}

/// A multi-turn streaming conversation.
///
/// All methods take `&self`; share a session across tasks with `Arc`.
pub struct ChatSession {
    transport: SharedTransport,
    state: Mutex<SessionState>,
    controller: CancellationController,
    events: EventBus,
}

impl ChatSession {
    /// Create a session over `transport`.
    pub fn new<T>(transport: T, options: SessionOptions) -> Self
    where
        T: ChatTransport + 'static,
    {
        Self::from_shared(Arc::new(transport), options)
    }

    /// Create a session over a shared transport.
    pub fn from_shared(transport: SharedTransport, options: SessionOptions) -> Self {
        let history = match options.system_prompt {
            Some(prompt) => ConversationHistory::with_system(prompt),
            None => ConversationHistory::new(),
        };

        Self {
            transport,
            state: Mutex::new(SessionState {
                history,
                decoder: StreamDecoder::new(),
                sampling: options.sampling,
                tools: options.tools,
            }),
            controller: CancellationController::new(),
            events: EventBus::new(options.event_buffer),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Reset history to a single system message.
    ///
    /// Any active generation is stopped first.
    pub fn initialize(&self, system_prompt: impl Into<String>) {
        self.stop();
        let mut state = self.state();
        state.history.initialize(system_prompt);
        state.decoder.reset();
    }

    /// Append a tool result without starting a generation.
    ///
    /// Use this to answer several tool calls of one turn, then call
    /// [`generate`](Self::generate).
    pub fn append_tool_result<T>(&self, tool_call_id: &str, result: &T) -> Result<(), SessionError>
    where
        T: Serialize + ?Sized,
    {
        let _guard = self.controller.begin()?;
        self.state().history.append_tool_result(tool_call_id, result)
    }

    /// Snapshot of the transcript.
    pub fn history(&self) -> Vec<Message> {
        self.state().history.snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.state().history.len()
    }

    pub fn last_message(&self) -> Option<Message> {
        self.state().history.last().cloned()
    }

    /// Tool calls still waiting for a result.
    pub fn pending_tool_call_ids(&self) -> Vec<String> {
        self.state().history.pending_tool_call_ids()
    }

    /// Text accumulated by the current or most recent generation.
    pub fn accumulated_text(&self) -> String {
        self.state().decoder.text().to_string()
    }

    /// Stop any active generation, then clear history and turn state.
    pub fn reset(&self) {
        self.stop();
        let mut state = self.state();
        state.history.clear();
        state.decoder.reset();
        debug!("Session reset");
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// Append a user message and stream the model's reply.
    ///
    /// Fails with [`SessionError::GenerationInProgress`], leaving history
    /// untouched, if another generation is running.
    pub async fn send_user_message(&self, text: impl Into<String>) -> Result<TurnOutcome, SessionError> {
        let guard = self.controller.begin()?;
        self.state().history.append_user(text);
        self.run(guard).await
    }

    /// Append a tool result and stream the model's follow-up.
    pub async fn send_tool_result<T>(&self, tool_call_id: &str, result: &T) -> Result<TurnOutcome, SessionError>
    where
        T: Serialize + ?Sized,
    {
        let guard = self.controller.begin()?;
        self.state().history.append_tool_result(tool_call_id, result)?;
        self.run(guard).await
    }

    /// Stream a reply to the history as it stands.
    pub async fn generate(&self) -> Result<TurnOutcome, SessionError> {
        let guard = self.controller.begin()?;
        self.run(guard).await
    }

    /// Stop the active generation.
    ///
    /// Returns false if nothing was running.
    pub fn stop(&self) -> bool {
        let stopped = self.controller.stop();
        if stopped {
            debug!("Stop requested");
        }
        stopped
    }

    /// Handle for stopping generations from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.controller.clone())
    }

    pub fn is_generating(&self) -> bool {
        self.controller.is_active()
    }

    pub fn current_generation(&self) -> Option<GenerationId> {
        self.controller.current()
    }

    async fn run(&self, guard: GenerationGuard) -> Result<TurnOutcome, SessionError> {
        let span = debug_span!("generation", id = %guard.id());
        self.drive(&guard).instrument(span).await
    }

    async fn drive(&self, guard: &GenerationGuard) -> Result<TurnOutcome, SessionError> {
        let id = guard.id();
        let token = guard.token().clone();
        let start = Instant::now();

        let request = {
            let mut state = self.state();
            state.decoder.begin(id);
            CompletionRequest::streaming(
                state.history.snapshot(),
                state.sampling.clone(),
                Some(state.tools.clone()),
            )
        };
        debug!(messages = request.messages.len(), "Generation started");

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            opened = self.transport.open_stream(request, token.clone()) => Some(opened),
        };
        let mut stream = match opened {
            None => return Ok(self.abort(guard, start)),
            Some(Ok(stream)) => stream,
            Some(Err(e)) => return self.fail(guard, e, start),
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(self.abort(guard, start)),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let delta = self.state().decoder.decode(id, chunk);
                    if let Some(text) = delta {
                        self.events.emit(SessionEvent::Delta(text));
                    }
                }
                Some(Err(e)) => return self.fail(guard, e, start),
                None => break,
            }
        }
        drop(stream);

        // Checked under the lock so a concurrent reset either sees the
        // committed turn or prevents the commit.
        let dispatch = {
            let mut state = self.state();
            if token.is_cancelled() || !state.decoder.is_owned_by(id) {
                None
            } else {
                let turn = state.decoder.finish();
                Some(dispatcher::dispatch(turn, &mut state.history))
            }
        };
        let Some(dispatch) = dispatch else {
            return Ok(self.abort(guard, start));
        };

        for event in dispatch.events {
            self.events.emit(event);
        }

        let completion = dispatch.completion;
        debug!(
            chars = completion.text.len(),
            tool_calls = completion.tool_calls.len(),
            rejected = completion.rejected.len(),
            elapsed = ?start.elapsed(),
            "Generation completed"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_generation(GenerationOutcome::Completed, start.elapsed());
            GLOBAL_METRICS.record_tool_calls(completion.tool_calls.len() as u64);
            GLOBAL_METRICS.record_tool_argument_failures(completion.rejected.len() as u64);
            if let Some(ref usage) = completion.usage {
                GLOBAL_METRICS.record_tokens(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            }
        }

        Ok(TurnOutcome::Completed(completion))
    }

    fn discard_turn(&self, id: GenerationId) {
        let mut state = self.state();
        if state.decoder.is_owned_by(id) {
            state.decoder.reset();
        }
    }

    fn abort(&self, guard: &GenerationGuard, start: Instant) -> TurnOutcome {
        self.discard_turn(guard.id());
        debug!(elapsed = ?start.elapsed(), "Generation aborted");

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_generation(GenerationOutcome::Aborted, start.elapsed());

        self.events.emit(SessionEvent::Aborted);
        TurnOutcome::Aborted
    }

    fn fail(&self, guard: &GenerationGuard, err: ProviderError, start: Instant) -> Result<TurnOutcome, SessionError> {
        if err.is_cancellation() || guard.is_cancelled() {
            return Ok(self.abort(guard, start));
        }

        self.discard_turn(guard.id());
        error!(error = %err, retryable = err.is_retryable(), "Generation failed");

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_generation(GenerationOutcome::Failed, start.elapsed());

        self.events.emit(SessionEvent::Error(SignalError::transport(&err)));
        Err(SessionError::Transport(err))
    }

    // ------------------------------------------------------------------
    // Configuration & signals
    // ------------------------------------------------------------------

    /// Replace the advertised tools for subsequent generations.
    pub fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        self.state().tools = tools;
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.state().tools.clone()
    }

    /// Replace sampling parameters for subsequent generations.
    pub fn set_sampling(&self, sampling: SamplingConfig) {
        self.state().sampling = sampling;
    }

    pub fn sampling(&self) -> SamplingConfig {
        self.state().sampling.clone()
    }

    /// The signal bus of this session.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn on_delta<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.events.on_delta(handler)
    }

    pub fn on_tool_call<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ToolCall) + Send + Sync + 'static,
    {
        self.events.on_tool_call(handler)
    }

    pub fn on_completion<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str, Option<&TokenUsage>) + Send + Sync + 'static,
    {
        self.events.on_completion(handler)
    }

    pub fn on_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SignalError) + Send + Sync + 'static,
    {
        self.events.on_error(handler)
    }

    pub fn on_aborted<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.events.on_aborted(handler)
    }

    /// Name of the underlying transport.
    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("history_len", &self.history_len())
            .field("generating", &self.is_generating())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Script, ScriptedTransport};
    use crate::types::{Role, ToolCallFragment};
    use serde_json::json;
    use std::time::Duration;

    fn weather_script() -> Script {
        Script::new()
            .text("Hel")
            .text("lo")
            .fragment(
                ToolCallFragment::new(0)
                    .with_id("call_1")
                    .with_name("get_weather")
                    .with_arguments("{\"city\":"),
            )
            .fragment(ToolCallFragment::new(0).with_arguments("\"Paris\"}"))
            .usage(TokenUsage::with_total(42))
    }

    fn recorder(session: &ChatSession) -> Arc<Mutex<Vec<SessionEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        session
            .events()
            .subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        log
    }

    #[tokio::test]
    async fn test_weather_example_signal_sequence() {
        let session = ChatSession::new(
            ScriptedTransport::with_scripts([weather_script()]),
            SessionOptions::default().with_system_prompt("sys"),
        );
        let log = recorder(&session);

        let outcome = session.send_user_message("Weather in Paris?").await.unwrap();
        let turn = outcome.into_completion().unwrap();
        assert_eq!(turn.text, "Hello");
        assert_eq!(turn.usage, Some(TokenUsage::with_total(42)));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                SessionEvent::Delta("Hel".to_string()),
                SessionEvent::Delta("lo".to_string()),
                SessionEvent::ToolCall(ToolCall {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                    arguments: json!({"city": "Paris"}),
                }),
                SessionEvent::Completion {
                    text: "Hello".to_string(),
                    usage: Some(TokenUsage::with_total(42)),
                },
            ]
        );

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::Assistant]);
        assert!(session.history()[2].has_tool_calls());
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_request_carries_history_and_tools() {
        let transport = Arc::new(ScriptedTransport::with_scripts([Script::new().text("ok")]));
        let tool = ToolDescriptor::function("get_weather", "Weather");
        let session = ChatSession::from_shared(
            transport.clone(),
            SessionOptions::default()
                .with_system_prompt("sys")
                .with_tools(vec![tool.clone()]),
        );

        session.send_user_message("hi").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, vec![Message::system("sys"), Message::user("hi")]);
        assert_eq!(requests[0].tools, Some(vec![tool]));
        assert!(requests[0].stream);
    }

    #[tokio::test]
    async fn test_overlapping_generation_rejected() {
        let session = Arc::new(ChatSession::new(
            ScriptedTransport::with_scripts([Script::new().text("partial").hang()]),
            SessionOptions::default(),
        ));

        let running = session.clone();
        let first = tokio::spawn(async move { running.send_user_message("one").await });

        while !session.is_generating() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let err = session.send_user_message("two").await.unwrap_err();
        assert!(matches!(err, SessionError::GenerationInProgress));
        assert_eq!(session.history_len(), 1);

        assert!(session.stop());
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_aborted());
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_text() {
        let session = ChatSession::new(
            ScriptedTransport::with_scripts([Script::new().text("first"), Script::new().text("second")]),
            SessionOptions::default().with_system_prompt("sys"),
        );

        session.send_user_message("a").await.unwrap();
        assert_eq!(session.accumulated_text(), "first");

        session.reset();
        assert!(session.history().is_empty());
        assert_eq!(session.accumulated_text(), "");

        let turn = session.send_user_message("b").await.unwrap().into_completion().unwrap();
        assert_eq!(turn.text, "second");
        assert_eq!(session.history_len(), 2);
    }

    #[tokio::test]
    async fn test_tool_result_for_unknown_call_rejected() {
        let session = ChatSession::new(ScriptedTransport::new(), SessionOptions::default());
        let err = session.append_tool_result("call_x", "result").unwrap_err();
        assert!(matches!(err, SessionError::UnknownToolCall(_)));
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_stop_without_generation_is_noop() {
        let session = ChatSession::new(ScriptedTransport::new(), SessionOptions::default());
        let log = recorder(&session);
        assert!(!session.stop());
        assert!(log.lock().unwrap().is_empty());
    }
}
