// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-turn decoding of the chunk stream.
//!
//! The decoder only sorts: text increments are appended to the running text
//! and handed back for emission, tool-call fragments go to the accumulator,
//! usage is retained. Tool arguments are never parsed here.

use tracing::trace;

use super::accumulator::ToolCallAccumulator;
use super::cancel::GenerationId;
use crate::types::{StreamChunk, TokenUsage};

/// Everything a finished stream produced, ready for dispatch.
#[derive(Debug, Default)]
pub struct DecodedTurn {
    pub text: String,
    pub tool_calls: ToolCallAccumulator,
    pub usage: Option<TokenUsage>,
}

/// Turn-scoped decoding state.
///
/// State is stamped with the generation that owns it; chunks from any other
/// generation are ignored so a reset racing a chunk cannot leak text.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    owner: Option<GenerationId>,
    text: String,
    tool_calls: ToolCallAccumulator,
    usage: Option<TokenUsage>,
    chunks: u64,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh turn owned by `id`, discarding anything left over.
    pub fn begin(&mut self, id: GenerationId) {
        self.reset();
        self.owner = Some(id);
    }

    /// Check if `id` owns the current turn state.
    pub fn is_owned_by(&self, id: GenerationId) -> bool {
        self.owner == Some(id)
    }

    /// Decode one chunk.
    ///
    /// Returns the text increment to emit, if any.
    pub fn decode(&mut self, id: GenerationId, chunk: StreamChunk) -> Option<String> {
        if !self.is_owned_by(id) {
            trace!(generation = %id, "Dropping chunk for stale generation");
            return None;
        }
        self.chunks += 1;

        let delta = chunk.text_delta.filter(|t| !t.is_empty());
        if let Some(ref text) = delta {
            self.text.push_str(text);
        }

        for fragment in &chunk.tool_calls {
            trace!(index = fragment.index, "Tool call fragment");
            self.tool_calls.merge(fragment);
        }

        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        delta
    }

    /// Text accumulated so far in this turn.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tool_calls(&self) -> &ToolCallAccumulator {
        &self.tool_calls
    }

    pub fn usage(&self) -> Option<&TokenUsage> {
        self.usage.as_ref()
    }

    /// Number of chunks decoded this turn.
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Hand the turn over for dispatch.
    ///
    /// The accumulated text stays readable until the next turn or reset.
    pub fn finish(&mut self) -> DecodedTurn {
        self.owner = None;
        DecodedTurn {
            text: self.text.clone(),
            tool_calls: std::mem::take(&mut self.tool_calls),
            usage: self.usage.take(),
        }
    }

    /// Clear all turn state and ownership.
    pub fn reset(&mut self) {
        self.owner = None;
        self.text.clear();
        self.tool_calls.clear();
        self.usage = None;
        self.chunks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCallFragment;

    fn owned() -> (StreamDecoder, GenerationId) {
        let id = GenerationId::new();
        let mut decoder = StreamDecoder::new();
        decoder.begin(id);
        (decoder, id)
    }

    #[test]
    fn test_text_deltas_returned_and_accumulated() {
        let (mut decoder, id) = owned();
        assert_eq!(decoder.decode(id, StreamChunk::text("Hel")).as_deref(), Some("Hel"));
        assert_eq!(decoder.decode(id, StreamChunk::text("lo")).as_deref(), Some("lo"));
        assert_eq!(decoder.text(), "Hello");
        assert_eq!(decoder.chunk_count(), 2);
    }

    #[test]
    fn test_empty_delta_ignored() {
        let (mut decoder, id) = owned();
        assert!(decoder.decode(id, StreamChunk::text("")).is_none());
        assert!(decoder.decode(id, StreamChunk::default()).is_none());
        assert_eq!(decoder.text(), "");
    }

    #[test]
    fn test_text_and_fragments_interleave_independently() {
        let (mut decoder, id) = owned();
        let mixed = StreamChunk {
            text_delta: Some("Checking".to_string()),
            tool_calls: vec![ToolCallFragment::new(0).with_name("lookup").with_arguments("{")],
            usage: None,
        };
        assert_eq!(decoder.decode(id, mixed).as_deref(), Some("Checking"));
        decoder.decode(id, StreamChunk::fragment(ToolCallFragment::new(0).with_arguments("}")));

        assert_eq!(decoder.text(), "Checking");
        assert_eq!(decoder.tool_calls().get(0).unwrap().arguments, "{}");
    }

    #[test]
    fn test_last_usage_wins() {
        let (mut decoder, id) = owned();
        decoder.decode(id, StreamChunk::usage(TokenUsage::with_total(10)));
        decoder.decode(id, StreamChunk::text("x"));
        decoder.decode(id, StreamChunk::usage(TokenUsage::with_total(42)));
        assert_eq!(decoder.usage().unwrap().total_tokens, 42);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let (mut decoder, _) = owned();
        let stale = GenerationId::new();
        assert!(decoder.decode(stale, StreamChunk::text("ghost")).is_none());
        assert_eq!(decoder.text(), "");
        assert_eq!(decoder.chunk_count(), 0);
    }

    #[test]
    fn test_begin_starts_clean() {
        let (mut decoder, id) = owned();
        decoder.decode(id, StreamChunk::text("old"));
        decoder.decode(id, StreamChunk::fragment(ToolCallFragment::new(0).with_name("t")));

        let next = GenerationId::new();
        decoder.begin(next);
        assert_eq!(decoder.text(), "");
        assert!(decoder.tool_calls().is_empty());
        assert!(decoder.usage().is_none());
        assert!(!decoder.is_owned_by(id));
    }

    #[test]
    fn test_finish_hands_over_and_releases() {
        let (mut decoder, id) = owned();
        decoder.decode(id, StreamChunk::text("done"));
        decoder.decode(id, StreamChunk::fragment(ToolCallFragment::new(0).with_name("t")));

        let turn = decoder.finish();
        assert_eq!(turn.text, "done");
        assert_eq!(turn.tool_calls.len(), 1);
        assert!(decoder.tool_calls().is_empty());
        assert_eq!(decoder.text(), "done");
        assert!(decoder.decode(id, StreamChunk::text("late")).is_none());
    }
}
