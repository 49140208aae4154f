// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport that replays prepared chunk sequences.
//!
//! Each call to `open_stream` consumes the next [`Script`]. Used by the test
//! suites and benches, and handy for exercising a UI offline.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::{ChatTransport, ChunkStream};
use crate::error::ProviderError;
use crate::types::{CompletionRequest, StreamChunk, TokenUsage, ToolCallFragment};

/// One step of a scripted stream.
#[derive(Debug)]
pub enum ScriptItem {
    /// Yield a chunk.
    Chunk(StreamChunk),
    /// Yield an error; the stream ends after it.
    Fail(ProviderError),
    /// Sleep before the next step. Cancellation ends the stream early.
    Pause(Duration),
    /// Never yield again until cancelled.
    Hang,
}

/// The response to one request.
#[derive(Debug, Default)]
pub struct Script {
    open_error: Option<ProviderError>,
    items: VecDeque<ScriptItem>,
    chunk_delay: Option<Duration>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// A script replaying `chunks` in order.
    pub fn from_chunks(chunks: impl IntoIterator<Item = StreamChunk>) -> Self {
        Self {
            items: chunks.into_iter().map(ScriptItem::Chunk).collect(),
            ..Self::default()
        }
    }

    /// A script whose request fails before any chunk.
    pub fn failing(err: ProviderError) -> Self {
        Self {
            open_error: Some(err),
            ..Self::default()
        }
    }

    pub fn chunk(mut self, chunk: StreamChunk) -> Self {
        self.items.push_back(ScriptItem::Chunk(chunk));
        self
    }

    pub fn text(self, delta: impl Into<String>) -> Self {
        self.chunk(StreamChunk::text(delta))
    }

    pub fn fragment(self, fragment: ToolCallFragment) -> Self {
        self.chunk(StreamChunk::fragment(fragment))
    }

    pub fn usage(self, usage: TokenUsage) -> Self {
        self.chunk(StreamChunk::usage(usage))
    }

    pub fn fail(mut self, err: ProviderError) -> Self {
        self.items.push_back(ScriptItem::Fail(err));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.items.push_back(ScriptItem::Pause(duration));
        self
    }

    pub fn hang(mut self) -> Self {
        self.items.push_back(ScriptItem::Hang);
        self
    }

    /// Sleep this long before every chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }
}

/// Transport backed by a queue of [`Script`]s.
#[derive(Debug)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
    model: String,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            model: "scripted".to_string(),
        }
    }

    /// Create a transport that answers one request per script, in order.
    pub fn with_scripts(scripts: impl IntoIterator<Item = Script>) -> Self {
        let transport = Self::new();
        for script in scripts {
            transport.push(script);
        }
        transport
    }

    /// Queue another response.
    pub fn push(&self, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(script);
    }

    /// Scripts not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| ProviderError::NotConfigured("no scripted response left".to_string()))?;

        if let Some(err) = script.open_error {
            return Err(err);
        }

        let delay = script.chunk_delay;
        let state = (script.items, cancel);

        let chunks = stream::unfold(state, move |(mut items, cancel)| async move {
            loop {
                match items.pop_front()? {
                    ScriptItem::Chunk(chunk) => {
                        if let Some(delay) = delay {
                            tokio::select! {
                                _ = cancel.cancelled() => return None,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        return Some((Ok(chunk), (items, cancel)));
                    }
                    ScriptItem::Fail(err) => {
                        items.clear();
                        return Some((Err(err), (items, cancel)));
                    }
                    ScriptItem::Pause(duration) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return None,
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    ScriptItem::Hang => {
                        cancel.cancelled().await;
                        return None;
                    }
                }
            }
        });

        Ok(chunks.boxed())
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
