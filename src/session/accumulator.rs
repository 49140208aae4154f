// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reassembly of tool calls streamed in fragments.

use std::collections::BTreeMap;

use crate::types::{ToolCallFragment, ToolCallRequest};

/// A tool call under reassembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text, append-only.
    pub arguments: String,
}

impl AccumulatedToolCall {
    fn merge(&mut self, fragment: &ToolCallFragment) {
        if let Some(ref id) = fragment.id {
            self.id.clone_from(id);
        }
        if let Some(ref name) = fragment.name {
            self.name.clone_from(name);
        }
        if let Some(ref chunk) = fragment.arguments {
            self.arguments.push_str(chunk);
        }
    }

    /// Check if the entry has enough to be dispatched.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.arguments.is_empty()
    }

    /// History form of this call, carrying the raw arguments.
    pub fn to_request(&self) -> ToolCallRequest {
        ToolCallRequest::new(self.id.clone(), self.name.clone(), self.arguments.clone())
    }
}

/// Tool calls of the current turn, keyed by fragment index.
///
/// Iteration is always in ascending index order.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    entries: BTreeMap<u32, AccumulatedToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a fragment into the entry at its index, creating it if needed.
    ///
    /// A present id or name overwrites; an argument chunk is appended.
    pub fn merge(&mut self, fragment: &ToolCallFragment) {
        self.entries
            .entry(fragment.index)
            .or_default()
            .merge(fragment);
    }

    pub fn get(&self, index: u32) -> Option<&AccumulatedToolCall> {
        self.entries.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &AccumulatedToolCall)> {
        self.entries.iter().map(|(i, e)| (*i, e))
    }

    /// Remove every entry, yielding them in ascending index order.
    pub fn drain(&mut self) -> impl Iterator<Item = (u32, AccumulatedToolCall)> {
        std::mem::take(&mut self.entries).into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
