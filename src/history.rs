// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Conversation history.
//!
//! The ordered transcript replayed to the provider on every turn. Insertion
//! order is the protocol order, so nothing here reorders or deduplicates.

use serde::Serialize;

use crate::error::SessionError;
use crate::types::{Message, Role, ToolCallRequest};

/// Ordered, mutable log of messages exchanged with the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history seeded with a system prompt.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.initialize(prompt);
        history
    }

    /// Reset to a single system message.
    pub fn initialize(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(Message::system(system_prompt));
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn append_assistant_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Append one assistant message carrying every tool call of the turn.
    ///
    /// An empty list appends nothing.
    pub fn append_assistant_tool_calls(&mut self, calls: Vec<ToolCallRequest>) {
        if calls.is_empty() {
            return;
        }
        self.messages.push(Message::assistant_tool_calls(calls));
    }

    /// Append the result of a tool call.
    ///
    /// `tool_call_id` must have been requested by an earlier assistant
    /// message. A JSON string result is stored verbatim, anything else as
    /// compact JSON.
    pub fn append_tool_result<T>(&mut self, tool_call_id: &str, result: &T) -> Result<(), SessionError>
    where
        T: Serialize + ?Sized,
    {
        if !self.was_requested(tool_call_id) {
            return Err(SessionError::UnknownToolCall(tool_call_id.to_string()));
        }
        let content = serialize_result(result)?;
        self.messages.push(Message::tool_result(tool_call_id, content));
        Ok(())
    }

    /// Immutable copy of the transcript.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Borrowed view of the transcript.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Ids requested by assistant messages that have no tool result yet.
    pub fn pending_tool_call_ids(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for msg in &self.messages {
            match msg.role {
                Role::Assistant => {
                    pending.extend(msg.requested_tool_calls().iter().map(|c| c.id.clone()));
                }
                Role::Tool => {
                    if let Some(ref id) = msg.tool_call_id {
                        pending.retain(|p| p != id);
                    }
                }
                _ => {}
            }
        }
        pending
    }

    fn was_requested(&self, tool_call_id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.requested_tool_calls())
            .any(|c| c.id == tool_call_id)
    }
}

fn serialize_result<T>(result: &T) -> Result<String, SessionError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(result)
        .map_err(|e| SessionError::InvalidToolResult(e.to_string()))?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history_with_call(id: &str) -> ConversationHistory {
        let mut history = ConversationHistory::with_system("be brief");
        history.append_user("weather?");
        history.append_assistant_tool_calls(vec![ToolCallRequest::new(
            id,
            "get_weather",
            "{\"city\":\"Paris\"}",
        )]);
        history
    }

    #[test]
    fn test_initialize_resets_to_system() {
        let mut history = ConversationHistory::new();
        history.append_user("hi");
        history.append_assistant_text("hello");
        history.initialize("You are terse.");

        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0], Message::system("You are terse."));
    }

    #[test]
    fn test_tool_calls_batched_into_one_message() {
        let mut history = ConversationHistory::new();
        history.append_assistant_tool_calls(vec![
            ToolCallRequest::new("a", "one", "{}"),
            ToolCallRequest::new("b", "two", "{}"),
        ]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0].requested_tool_calls().len(), 2);
    }

    #[test]
    fn test_empty_tool_call_list_appends_nothing() {
        let mut history = ConversationHistory::new();
        history.append_assistant_tool_calls(Vec::new());
        assert!(history.is_empty());
    }

    #[test]
    fn test_tool_result_string_stored_verbatim() {
        let mut history = history_with_call("call_1");
        history.append_tool_result("call_1", "sunny, 21C").unwrap();

        let last = history.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.as_text(), Some("sunny, 21C"));
        assert_eq!(last.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_tool_result_structured_serialized() {
        let mut history = history_with_call("call_1");
        history
            .append_tool_result("call_1", &json!({"temp": 21, "sky": "clear"}))
            .unwrap();
        let content = history.last().unwrap().as_text().unwrap().to_string();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["temp"], 21);
    }

    #[test]
    fn test_tool_result_for_unknown_call_rejected() {
        let mut history = history_with_call("call_1");
        let err = history.append_tool_result("call_2", "x").unwrap_err();
        assert!(matches!(err, SessionError::UnknownToolCall(id) if id == "call_2"));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_pending_tool_call_ids() {
        let mut history = ConversationHistory::new();
        history.append_assistant_tool_calls(vec![
            ToolCallRequest::new("a", "one", "{}"),
            ToolCallRequest::new("b", "two", "{}"),
        ]);
        assert_eq!(history.pending_tool_call_ids(), vec!["a", "b"]);

        history.append_tool_result("a", "done").unwrap();
        assert_eq!(history.pending_tool_call_ids(), vec!["b"]);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut history = ConversationHistory::with_system("sys");
        let snapshot = history.snapshot();
        history.append_user("later");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(history.len(), 2);
    }
}
