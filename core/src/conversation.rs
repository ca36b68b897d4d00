//! Ordered conversation log plus the `send` orchestration entry point.
//!
//! The store owns the only mutable state of a chat session: the message log,
//! the active [`Mode`] and the loading flag. A single-slot in-flight guard
//! keeps every assistant reply directly behind the user message that
//! triggered it; a second `send` while one is pending is rejected with
//! [`SendError::Busy`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::Serialize;

use crate::agents::config::ModePreferences;
use crate::agents::gateway::Gateway;
use crate::agents::normalizer::normalize;
use crate::errors::{SendError, TransportError};
use crate::models::{ConversationSnapshot, Message, Mode};

#[derive(Debug, Default)]
struct ConversationState {
    messages: Vec<Message>,
    mode: Mode,
    is_loading: bool,
    next_id: u64,
    // Bumped by `clear`; replies from an older generation are dropped.
    generation: u64,
}

impl ConversationState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Result of one completed `send`.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub user: Message,
    pub reply: Message,
    /// Set when the reply was synthesised from a transport failure.
    #[serde(skip)]
    pub failure: Option<TransportError>,
    /// The conversation was cleared while the request was in flight, so the
    /// reply never reached the log.
    pub discarded: bool,
}

/// Resets `is_loading` if a `send` future is dropped before completing.
struct LoadingGuard<'a> {
    state: &'a Mutex<ConversationState>,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.state).is_loading = false;
        }
    }
}

/// Single-session chat state: message log, active mode and loading flag,
/// plus the gateway and mode preference it delegates to.
pub struct ConversationStore {
    gateway: Mutex<Arc<dyn Gateway>>,
    preferences: Arc<dyn ModePreferences>,
    state: Mutex<ConversationState>,
}

impl ConversationStore {
    /// Build a store whose initial mode comes from `preferences`, defaulting
    /// to [`Mode::Local`] when nothing usable is stored.
    pub fn new(gateway: Arc<dyn Gateway>, preferences: Arc<dyn ModePreferences>) -> Self {
        let mode = match preferences.load() {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                warn!("could not load stored mode, using default: {err:#}");
                Mode::default()
            }
        };
        Self {
            gateway: Mutex::new(gateway),
            preferences,
            state: Mutex::new(ConversationState {
                mode,
                ..Default::default()
            }),
        }
    }

    pub fn gateway(&self) -> Arc<dyn Gateway> {
        self.gateway
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap the backend used by later sends, e.g. after a settings change.
    /// A request already in flight finishes on the gateway it started with.
    pub fn replace_gateway(&self, gateway: Arc<dyn Gateway>) {
        *self.gateway.lock().unwrap_or_else(PoisonError::into_inner) = gateway;
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state).messages.clone()
    }

    pub fn mode(&self) -> Mode {
        lock(&self.state).mode
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = lock(&self.state);
        ConversationSnapshot {
            messages: state.messages.clone(),
            mode: state.mode,
            is_loading: state.is_loading,
        }
    }

    /// Append `text` as a user message, ask the active provider and append
    /// its normalised reply.
    ///
    /// Transport problems never surface here; they become a visible
    /// `Connection Error:` reply. Only caller errors are returned.
    pub async fn send(&self, text: &str) -> Result<Exchange, SendError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(SendError::EmptyInput);
        }

        let (user, mode, generation) = {
            let mut state = lock(&self.state);
            if state.is_loading {
                warn!("send rejected, a request is already in flight");
                return Err(SendError::Busy);
            }
            let user = Message::user(state.allocate_id(), content.to_string());
            state.messages.push(user.clone());
            state.is_loading = true;
            (user, state.mode, state.generation)
        };
        let mut loading = LoadingGuard {
            state: &self.state,
            armed: true,
        };

        debug!("sending message {} via {mode}", user.id);
        let gateway = self.gateway();
        let raw = gateway.request(mode, content).await;
        let reply = normalize(mode, &raw);

        let mut state = lock(&self.state);
        let reply = Message::assistant(state.allocate_id(), reply);
        let discarded = state.generation != generation;
        if discarded {
            debug!("conversation cleared mid-flight, dropping reply {}", reply.id);
        } else {
            state.messages.push(reply.clone());
        }
        state.is_loading = false;
        loading.armed = false;
        drop(state);

        Ok(Exchange {
            user,
            reply,
            failure: raw.err(),
            discarded,
        })
    }

    /// Switch provider for subsequent sends. A request already in flight
    /// keeps the mode it was issued with.
    pub fn set_mode(&self, mode: Mode) {
        let previous = std::mem::replace(&mut lock(&self.state).mode, mode);
        if previous == mode {
            return;
        }
        info!("mode switched from {previous} to {mode}");
        if let Err(err) = self.preferences.save(mode) {
            warn!("could not persist mode {mode}: {err:#}");
        }
    }

    /// Drop every message. Mode and loading state are left alone. Returns
    /// how many messages were removed.
    pub fn clear(&self) -> usize {
        let mut state = lock(&self.state);
        let removed = state.messages.len();
        state.messages.clear();
        state.generation += 1;
        removed
    }
}

fn lock(state: &Mutex<ConversationState>) -> MutexGuard<'_, ConversationState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
