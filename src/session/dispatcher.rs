// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-of-stream finalization.
//!
//! Runs once per naturally finished generation. It commits the turn to
//! history and returns the signals to emit, in order; the caller emits them
//! after releasing the session lock.

use tracing::{debug, warn};

use super::decoder::DecodedTurn;
use crate::error::ToolArgumentParseError;
use crate::events::{SessionEvent, SignalError};
use crate::history::ConversationHistory;
use crate::types::{TokenUsage, ToolCall, ToolCallRequest};

/// Result of a completed generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnCompletion {
    /// Full text of the turn (concatenation of every delta).
    pub text: String,
    /// Tool calls that parsed, ascending by fragment index.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
    /// Tool calls dropped because their arguments did not parse.
    pub rejected: Vec<ToolArgumentParseError>,
}

impl TurnCompletion {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Committed turn plus the signals it produced.
#[derive(Debug)]
pub struct Dispatch {
    pub events: Vec<SessionEvent>,
    pub completion: TurnCompletion,
}

/// Finalize a decoded turn into `history`.
///
/// History receives the tool-call message (if any call parsed) before the
/// text message (if any text arrived). Signal order: argument errors, tool
/// calls, completion.
pub fn dispatch(turn: DecodedTurn, history: &mut ConversationHistory) -> Dispatch {
    let DecodedTurn {
        text,
        mut tool_calls,
        usage,
    } = turn;

    let mut events = Vec::new();
    let mut finalized: Vec<ToolCall> = Vec::new();
    let mut requests: Vec<ToolCallRequest> = Vec::new();
    let mut rejected = Vec::new();

    for (index, entry) in tool_calls.drain() {
        if !entry.is_complete() {
            debug!(
                index,
                name = %entry.name,
                "Skipping tool call without name or arguments"
            );
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(&entry.arguments) {
            Ok(arguments) => {
                requests.push(entry.to_request());
                finalized.push(ToolCall {
                    id: entry.id,
                    name: entry.name,
                    arguments,
                });
            }
            Err(e) => {
                warn!(index, tool = %entry.name, error = %e, "Tool call arguments are not valid JSON");
                let err = ToolArgumentParseError {
                    index,
                    id: entry.id,
                    name: entry.name,
                    message: e.to_string(),
                    raw_arguments: entry.arguments,
                };
                events.push(SessionEvent::Error(SignalError::ToolArguments(err.clone())));
                rejected.push(err);
            }
        }
    }

    if !requests.is_empty() {
        history.append_assistant_tool_calls(requests);
        events.extend(finalized.iter().cloned().map(SessionEvent::ToolCall));
    }

    if !text.is_empty() {
        history.append_assistant_text(text.clone());
    }

    events.push(SessionEvent::Completion {
        text: text.clone(),
        usage: usage.clone(),
    });

    Dispatch {
        events,
        completion: TurnCompletion {
            text,
            tool_calls: finalized,
            usage,
            rejected,
        },
    }
}
