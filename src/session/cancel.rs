// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Generation lifetime and cancellation.
//!
//! At most one generation is active per session. [`CancellationController::begin`]
//! claims the slot and hands back a [`GenerationGuard`]; the slot is released
//! when the guard drops, including when the generation future itself is
//! dropped mid-stream.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SessionError;

/// Identifier of one generation, recorded in its tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationId(Uuid);

impl GenerationId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct ActiveGeneration {
    id: GenerationId,
    token: CancellationToken,
}

/// Owns the cancellation handle of the current generation.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    active: Arc<Mutex<Option<ActiveGeneration>>>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveGeneration>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the generation slot.
    ///
    /// Fails with [`SessionError::GenerationInProgress`] while another
    /// generation holds it.
    pub fn begin(&self) -> Result<GenerationGuard, SessionError> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(SessionError::GenerationInProgress);
        }

        let id = GenerationId::new();
        let token = CancellationToken::new();
        *slot = Some(ActiveGeneration {
            id,
            token: token.clone(),
        });

        Ok(GenerationGuard {
            id,
            token,
            controller: self.clone(),
        })
    }

    /// Cancel the active generation.
    ///
    /// Returns true if this call cancelled it, false if nothing was running
    /// or it was already cancelled. The slot stays claimed until the
    /// generation has unwound and emitted its aborted signal.
    pub fn stop(&self) -> bool {
        match self.slot().as_ref() {
            Some(active) if !active.token.is_cancelled() => {
                active.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Check if a generation holds the slot.
    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }

    /// Id of the active generation, if any.
    pub fn current(&self) -> Option<GenerationId> {
        self.slot().as_ref().map(|a| a.id)
    }

    fn release(&self, id: GenerationId) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|a| a.id == id) {
            *slot = None;
        }
    }
}

/// Proof of ownership of the generation slot.
#[derive(Debug)]
pub struct GenerationGuard {
    id: GenerationId,
    token: CancellationToken,
    controller: CancellationController,
}

impl GenerationGuard {
    pub fn id(&self) -> GenerationId {
        self.id
    }

    /// Token cancelled by [`CancellationController::stop`].
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.controller.release(self.id);
    }
}

/// Clonable handle that stops a session's generation from another task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    controller: CancellationController,
}

impl StopHandle {
    pub(crate) fn new(controller: CancellationController) -> Self {
        Self { controller }
    }

    /// Same as [`ChatSession::stop`](crate::session::ChatSession::stop).
    pub fn stop(&self) -> bool {
        self.controller.stop()
    }

    pub fn is_generating(&self) -> bool {
        self.controller.is_active()
    }
}
