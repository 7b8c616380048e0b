//! Session lifecycle and registry.
//!
//! A session is one logical protocol connection, independent of the wire
//! binding carrying it. The registry is the single shared mutable resource in
//! the transport: insert-on-connect and remove-on-close are mutually
//! exclusive, and command routing never observes a partial entry. Handlers
//! borrow a session for one request and never retain it.

use crate::error::{BridgeError, Result};
use crate::publisher::ToolSet;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Which wire binding carries a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Stdio,
    EventStream,
}

impl BindingKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BindingKind::Stdio => "stdio",
            BindingKind::EventStream => "event-stream",
        }
    }
}

/// Session lifecycle states. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One live protocol session.
pub struct Session {
    /// Opaque id, unique among currently open sessions; the sole routing key
    /// for inbound command frames.
    pub id: String,
    pub binding: BindingKind,
    state: RwLock<SessionState>,
    /// Tool snapshot pinned at open (repointed atomically on reload).
    tools: RwLock<Arc<ToolSet>>,
    inbound: mpsc::Sender<Value>,
    outbound: mpsc::Sender<Value>,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session in `Connecting` plus the receiver ends of its two
    /// channels: inbound for the frame worker, outbound for the binding.
    #[must_use]
    pub(crate) fn connect(
        binding: BindingKind,
        tools: Arc<ToolSet>,
    ) -> (Arc<Self>, mpsc::Receiver<Value>, mpsc::Receiver<Value>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let session = Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            binding,
            state: RwLock::new(SessionState::Connecting),
            tools: RwLock::new(tools),
            inbound: inbound_tx,
            outbound: outbound_tx,
            cancel: CancellationToken::new(),
        });
        (session, inbound_rx, outbound_rx)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    #[must_use]
    pub fn tools(&self) -> Arc<ToolSet> {
        Arc::clone(&self.tools.read())
    }

    pub(crate) fn replace_tools(&self, set: Arc<ToolSet>) {
        *self.tools.write() = set;
    }

    pub(crate) fn mark_open(&self) {
        *self.state.write() = SessionState::Open;
    }

    pub(crate) fn begin_close(&self) {
        let mut state = self.state.write();
        if *state == SessionState::Open || *state == SessionState::Connecting {
            *state = SessionState::Closing;
        }
    }

    pub(crate) fn mark_closed(&self) {
        *self.state.write() = SessionState::Closed;
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Queue an inbound frame for this session's worker. Frames are processed
    /// in arrival order.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the session is already shutting down.
    pub async fn enqueue(&self, frame: Value) -> Result<()> {
        self.inbound.send(frame).await.map_err(|_| {
            BridgeError::Transport(format!("session '{}' is closing", self.id))
        })
    }

    /// Queue an outbound frame. Silently dropped once the peer is gone.
    pub async fn send(&self, frame: Value) {
        if self.outbound.send(frame).await.is_err() {
            tracing::debug!(session_id = %self.id, "dropping outbound frame for closed session");
        }
    }

    /// Queue an outbound frame without waiting for channel capacity. Used by
    /// broadcasts, where one stalled peer must not hold up the rest.
    pub fn try_send(&self, frame: Value) {
        if let Err(e) = self.outbound.try_send(frame) {
            tracing::debug!(session_id = %self.id, error = %e, "dropping broadcast frame");
        }
    }
}

/// Registry of open sessions keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(session_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Remove and return every session (transport shutdown).
    pub fn drain(&self) -> Vec<Arc<Session>> {
        self.sessions.write().drain().map(|(_, s)| s).collect()
    }

    /// Swap every session's tool snapshot.
    pub fn repoint(&self, set: &Arc<ToolSet>) {
        for session in self.sessions.read().values() {
            session.replace_tools(Arc::clone(set));
        }
    }

    /// Send a frame to every open session. Closed or congested peers drop it;
    /// no peer can hold up another.
    pub fn broadcast(&self, frame: &Value) {
        // Clone handles inside the lock, send outside it.
        let sessions: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        for session in sessions {
            if session.state() == SessionState::Open {
                session.try_send(frame.clone());
            }
        }
    }
}
