// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Parley - a streaming chat session adapter.
//!
//! Parley turns an OpenAI-compatible streaming completion endpoint into a
//! stateful conversation. Streamed chunks become text increments and
//! reassembled tool calls; callers may stop a generation at any point.
//!
//! # Architecture
//!
//! - [`types`] - Messages, stream chunks, tool calls, sampling parameters
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`history`] - Conversation history with tool-result pairing
//! - [`events`] - Signal bus (callbacks and a broadcast channel)
//! - [`session`] - Generation driver and tool-call reassembly
//! - [`transport`] - The transport seam and the OpenAI-compatible client
//! - [`tools`] - Tool descriptors advertised to the model
//! - [`telemetry`] - Tracing setup and metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use parley::config::{load_config, CliOptions};
//! use parley::session::ChatSession;
//! use parley::transport::OpenAiTransport;
//!
//! let config = load_config(&std::env::current_dir()?, CliOptions::default())?;
//! let transport = OpenAiTransport::from_config(&config)?;
//! let session = ChatSession::new(transport, config.session_options());
//!
//! session.on_delta(|text| print!("{}", text));
//! session.send_user_message("Hello!").await?;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, ProviderError, Result, SessionError, ToolArgumentParseError};
pub use events::{EventBus, SessionEvent, SignalError, SubscriptionId};
pub use history::ConversationHistory;
pub use session::{ChatSession, SessionOptions, StopHandle, TurnCompletion, TurnOutcome};
pub use tools::{describe_tool, ToolDescriptor};
pub use transport::{ChatTransport, OpenAiTransport, ScriptedTransport, SharedTransport};
pub use types::{
    CompletionRequest, Message, Role, SamplingConfig, StreamChunk, TokenUsage, ToolCall,
    ToolCallFragment, ToolCallRequest,
};

/// Parley version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
