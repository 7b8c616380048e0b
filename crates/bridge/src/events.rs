//! Monitoring event sink.
//!
//! The bridge reports lifecycle and call events through this capability
//! interface and owns no global emitter; the sink is injected at construction.
//! Events are fire-and-forget: sinks must not block, and a sink failure is
//! invisible to the caller.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// One upstream API call, as reported to the sink.
#[derive(Debug, Clone)]
pub struct ApiCallEvent {
    pub tool: String,
    pub method: String,
    pub path: String,
    pub ok: bool,
    pub elapsed: Duration,
    pub at: DateTime<Utc>,
}

/// Capability interface for monitoring consumers.
#[allow(unused_variables)]
pub trait BridgeEvents: Send + Sync {
    fn server_started(&self, binding: &str) {}
    fn server_stopped(&self, binding: &str) {}
    fn session_opened(&self, session_id: &str) {}
    fn session_closed(&self, session_id: &str) {}
    fn tools_reloaded(&self, tool_count: usize) {}
    fn api_call(&self, event: &ApiCallEvent) {}
    fn error(&self, scope: &str, message: &str) {}
}

/// Default sink: structured tracing events.
#[derive(Debug, Default)]
pub struct TracingEvents;

impl BridgeEvents for TracingEvents {
    fn server_started(&self, binding: &str) {
        tracing::info!(binding, "bridge started");
    }

    fn server_stopped(&self, binding: &str) {
        tracing::info!(binding, "bridge stopped");
    }

    fn session_opened(&self, session_id: &str) {
        tracing::info!(session_id, "session opened");
    }

    fn session_closed(&self, session_id: &str) {
        tracing::info!(session_id, "session closed");
    }

    fn tools_reloaded(&self, tool_count: usize) {
        tracing::info!(tool_count, "tool set reloaded");
    }

    fn api_call(&self, event: &ApiCallEvent) {
        tracing::info!(
            tool = %event.tool,
            method = %event.method,
            path = %event.path,
            ok = event.ok,
            elapsed_ms = event.elapsed.as_millis() as u64,
            at = %event.at,
            "api call"
        );
    }

    fn error(&self, scope: &str, message: &str) {
        tracing::warn!(scope, message, "bridge error");
    }
}

/// Discards everything; used in tests.
#[derive(Debug, Default)]
pub struct NullEvents;

impl BridgeEvents for NullEvents {}
