// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streaming transports.
//!
//! A transport turns a [`CompletionRequest`] into an ordered, finite stream of
//! [`StreamChunk`]s. The session owns everything above that: decoding,
//! reassembly, history and signals.
//!
//! # Supported Transports
//!
//! - **OpenAI-compatible** ([`OpenAiTransport`]) - HTTP + server-sent events
//!   against any `/chat/completions` endpoint
//! - **Scripted** ([`ScriptedTransport`]) - replays prepared chunk sequences
//!
//! # Cancellation
//!
//! Every call receives the generation's [`CancellationToken`]. A transport
//! should stop reading as soon as it is cancelled, either by ending the
//! stream or by yielding [`ProviderError::Cancelled`]. The session races
//! every read against the same token, so a transport that ignores it still
//! cannot delay an abort past the next chunk.

pub mod openai;
pub mod scripted;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::types::{CompletionRequest, StreamChunk};

pub use openai::OpenAiTransport;
pub use scripted::{Script, ScriptItem, ScriptedTransport};

/// Lazy, finite, non-restartable chunk sequence of one generation.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// Trait for streaming completion backends.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request` and return its chunk stream.
    ///
    /// Errors raised before the first chunk (connection, HTTP status) are
    /// returned here; errors after that are yielded by the stream.
    async fn open_stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, ProviderError>;

    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Model identifier sent with requests.
    fn model(&self) -> &str;
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn ChatTransport>;
