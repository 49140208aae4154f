// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session signals and the bus that delivers them.
//!
//! Every signal a session produces goes through one [`EventBus`]. Observers
//! attach in two ways and any number of each may coexist:
//!
//! - synchronous handlers ([`EventBus::subscribe`] and the `on_*` helpers),
//!   invoked inline in emission order before `emit` returns;
//! - broadcast receivers ([`EventBus::listen`]) for observers living on
//!   other tasks. A receiver that falls more than the bus capacity behind
//!   observes `RecvError::Lagged`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::error::{ProviderError, ToolArgumentParseError};
use crate::types::{TokenUsage, ToolCall};

/// Default broadcast capacity.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Error conditions reported through the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalError {
    /// The transport failed mid-turn; the turn was abandoned.
    Transport { message: String, retryable: bool },
    /// One tool call's arguments did not parse; the call was dropped.
    ToolArguments(ToolArgumentParseError),
}

impl SignalError {
    pub(crate) fn transport(err: &ProviderError) -> Self {
        Self::Transport {
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { message, .. } => f.write_str(message),
            Self::ToolArguments(e) => write!(f, "{}", e),
        }
    }
}

/// A signal emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A text increment (never the running total).
    Delta(String),
    /// A finalized tool call requested by the model.
    ToolCall(ToolCall),
    /// Natural end of a generation.
    Completion {
        text: String,
        usage: Option<TokenUsage>,
    },
    Error(SignalError),
    /// The generation was cancelled by the caller.
    Aborted,
}

impl SessionEvent {
    /// Check if this signal ends a generation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion { .. } | Self::Aborted)
    }

    /// Get the text increment if this is a delta.
    pub fn as_delta(&self) -> Option<&str> {
        match self {
            Self::Delta(s) => Some(s),
            _ => None,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A synchronous event handler.
pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Multi-subscriber publish/subscribe bus for session signals.
pub struct EventBus {
    handlers: RwLock<Vec<(SubscriptionId, EventHandler)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus whose broadcast channel holds `capacity` undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Register a handler for every signal.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }

    /// Open a broadcast receiver that sees every signal emitted from now on.
    pub fn listen(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Register a handler for text deltas.
    pub fn on_delta<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let SessionEvent::Delta(text) = event {
                handler(text);
            }
        })
    }

    /// Register a handler for tool calls.
    pub fn on_tool_call<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ToolCall) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let SessionEvent::ToolCall(call) = event {
                handler(call);
            }
        })
    }

    /// Register a handler for completions (full text, usage).
    pub fn on_completion<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&str, Option<&TokenUsage>) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let SessionEvent::Completion { text, usage } = event {
                handler(text, usage.as_ref());
            }
        })
    }

    /// Register a handler for error signals.
    pub fn on_error<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&SignalError) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let SessionEvent::Error(err) = event {
                handler(err);
            }
        })
    }

    /// Register a handler for aborted generations.
    pub fn on_aborted<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if matches!(event, SessionEvent::Aborted) {
                handler();
            }
        })
    }

    /// Deliver a signal to every handler, then to every broadcast receiver.
    ///
    /// Handlers run without the registry lock held, so a handler may
    /// subscribe or unsubscribe.
    pub fn emit(&self, event: SessionEvent) {
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in &handlers {
            handler(&event);
        }

        // No receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// Number of synchronous handlers.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.subscriber_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_multiple_handlers_all_receive() {
        let bus = EventBus::default();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let f = first.clone();
        bus.on_delta(move |t| f.lock().unwrap().push(t.to_string()));
        let s = second.clone();
        bus.on_delta(move |t| s.lock().unwrap().push(t.to_string()));

        bus.emit(SessionEvent::Delta("hi".to_string()));

        assert_eq!(*first.lock().unwrap(), vec!["hi"]);
        assert_eq!(*second.lock().unwrap(), vec!["hi"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::default();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let id = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SessionEvent::Aborted);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(SessionEvent::Aborted);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_filtered_helpers_ignore_other_kinds() {
        let bus = EventBus::default();
        let aborted = Arc::new(AtomicU64::new(0));
        let a = aborted.clone();
        bus.on_aborted(move || {
            a.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(SessionEvent::Delta("x".to_string()));
        bus.emit(SessionEvent::Completion {
            text: "x".to_string(),
            usage: None,
        });
        bus.emit(SessionEvent::Aborted);

        assert_eq!(aborted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::default());
        let inner = bus.clone();
        bus.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        bus.emit(SessionEvent::Aborted);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_receivers_see_events_in_order() {
        let bus = EventBus::default();
        let mut rx1 = bus.listen();
        let mut rx2 = bus.listen();

        bus.emit(SessionEvent::Delta("a".to_string()));
        bus.emit(SessionEvent::Aborted);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap(), SessionEvent::Delta("a".to_string()));
            assert_eq!(rx.recv().await.unwrap(), SessionEvent::Aborted);
        }
    }

    #[test]
    fn test_emit_without_receivers_is_fine() {
        let bus = EventBus::new(0);
        bus.emit(SessionEvent::Aborted);
    }

    #[test]
    fn test_terminal_events() {
        assert!(SessionEvent::Aborted.is_terminal());
        assert!(SessionEvent::Completion {
            text: String::new(),
            usage: None
        }
        .is_terminal());
        assert!(!SessionEvent::Delta("x".to_string()).is_terminal());
    }
}
