//! Bridge service wiring.
//!
//! Ties the publisher, session registry, and dispatcher together: opening a
//! session acquires the current tool snapshot and spawns that session's frame
//! worker; reload swaps snapshots and notifies open sessions; shutdown closes
//! everything without leaking registry entries.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::BridgeEvents;
use crate::publisher::ToolPublisher;
use crate::rpc::{Dispatcher, tools_list_changed};
use crate::session::{BindingKind, Session, SessionRegistry};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct BridgeService {
    pub config: BridgeConfig,
    pub publisher: ToolPublisher,
    pub registry: SessionRegistry,
    pub events: Arc<dyn BridgeEvents>,
    dispatcher: Arc<Dispatcher>,
}

impl BridgeService {
    #[must_use]
    pub fn new(config: BridgeConfig, events: Arc<dyn BridgeEvents>) -> Arc<Self> {
        Arc::new(Self {
            publisher: ToolPublisher::new(config.clone()),
            registry: SessionRegistry::new(),
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&events))),
            events,
            config,
        })
    }

    /// Open a session on `binding`.
    ///
    /// Returns the session handle and the outbound frame stream for the
    /// binding to drain.
    ///
    /// # Errors
    ///
    /// A pipeline failure rejects only this session (`Connecting -> Closed`);
    /// open sessions and the listener are unaffected.
    pub async fn open_session(
        self: &Arc<Self>,
        binding: BindingKind,
    ) -> Result<(Arc<Session>, mpsc::Receiver<Value>)> {
        let tools = match self.publisher.acquire().await {
            Ok(tools) => tools,
            Err(e) => {
                self.events.error("publish", &e.to_string());
                return Err(e);
            }
        };

        let (session, mut inbound_rx, outbound_rx) = Session::connect(binding, tools);
        self.registry.insert(Arc::clone(&session));
        session.mark_open();
        self.events.session_opened(&session.id);
        tracing::debug!(session_id = %session.id, binding = binding.as_str(), "session open");

        // Per-session worker: this session's frames are handled in arrival
        // order; concurrent sessions interleave freely.
        let dispatcher = Arc::clone(&self.dispatcher);
        let worker = Arc::clone(&session);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = worker.cancel_token().cancelled() => break,
                    frame = inbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if let Some(reply) = dispatcher.dispatch(&worker, frame).await {
                            worker.send(reply).await;
                        }
                    }
                }
            }
            worker.mark_closed();
        });

        Ok((session, outbound_rx))
    }

    /// Close a session and release its registry entry. Independent of every
    /// other session's traffic.
    pub fn close_session(&self, session_id: &str) {
        if let Some(session) = self.registry.remove(session_id) {
            session.begin_close();
            session.cancel();
            self.events.session_closed(session_id);
        }
    }

    /// Deliver one inbound frame to the session it addresses.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownSession`] when no open session has that
    /// id; no session's state is affected.
    pub async fn route_frame(&self, session_id: &str, frame: Value) -> Result<()> {
        let Some(session) = self.registry.get(session_id) else {
            return Err(BridgeError::UnknownSession(session_id.to_string()));
        };
        session.enqueue(frame).await
    }

    /// Re-run the pipeline; when it succeeds, repoint every open session and
    /// broadcast `tools/list_changed` unless the surface is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; open sessions keep serving the previous
    /// snapshot.
    pub async fn reload(&self) -> Result<usize> {
        let before = self.publisher.snapshot().map(|s| s.fingerprint.clone());
        let set = self.publisher.reload().await.inspect_err(|e| {
            self.events.error("reload", &e.to_string());
        })?;

        self.registry.repoint(&set);
        self.events.tools_reloaded(set.tools.len());

        if before.as_deref() != Some(set.fingerprint.as_str()) {
            self.registry.broadcast(&tools_list_changed());
        }
        Ok(set.tools.len())
    }

    /// Close every session and clear the registry (transport shutdown).
    pub fn shutdown(&self) {
        for session in self.registry.drain() {
            session.begin_close();
            session.cancel();
            self.events.session_closed(&session.id);
        }
    }
}
