//! JSON-RPC dispatch.
//!
//! Inbound frames are handled as raw JSON values (one malformed frame must
//! never take down a session, let alone the listener); reply payloads are
//! built from `rmcp` model types so the wire shapes match the official SDK.

use crate::events::{ApiCallEvent, BridgeEvents};
use crate::session::Session;
use chrono::Utc;
use rmcp::model::{CallToolResult, Content};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

/// Standard JSON-RPC error codes.
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Protocol revision announced when the client does not ask for one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Per-session frame handler. Stateless apart from the injected event sink;
/// all session state lives on the [`Session`] itself.
pub struct Dispatcher {
    events: Arc<dyn BridgeEvents>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(events: Arc<dyn BridgeEvents>) -> Self {
        Self { events }
    }

    /// Handle one inbound frame. Returns the reply frame when the request
    /// calls for one; notifications return `None`.
    pub async fn dispatch(&self, session: &Session, frame: Value) -> Option<Value> {
        let method = frame
            .get("method")
            .and_then(Value::as_str)
            .map(str::to_string);
        let id = frame.get("id").cloned().filter(|id| !id.is_null());

        let Some(method) = method else {
            // A frame with an id but no method deserves an explicit error;
            // anything else is dropped.
            return id.map(|id| jsonrpc_err(&id, INVALID_REQUEST, "missing method"));
        };

        let Some(id) = id else {
            if method == "notifications/initialized" {
                tracing::debug!(session_id = %session.id, "client initialized");
            }
            return None;
        };

        let reply = match method.as_str() {
            "initialize" => jsonrpc_ok(&id, initialize_result(&frame)),
            "ping" => jsonrpc_ok(&id, json!({})),
            "tools/list" => jsonrpc_ok(&id, tools_list_result(session)),
            "tools/call" => self.tools_call(session, &id, &frame).await,
            _ => jsonrpc_err(&id, METHOD_NOT_FOUND, &format!("method not found: {method}")),
        };
        Some(reply)
    }

    async fn tools_call(&self, session: &Session, id: &Value, frame: &Value) -> Value {
        let name = frame
            .pointer("/params/name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let arguments = frame
            .pointer("/params/arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let set = session.tools();
        let Some(tool) = set.tool(name) else {
            return jsonrpc_err(id, INVALID_PARAMS, &format!("unknown tool: {name}"));
        };

        let started = Instant::now();
        let outcome = set.invoker.invoke(tool, &arguments).await;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => CallToolResult {
                content: vec![Content::text(e.to_string())],
                structured_content: None,
                is_error: Some(true),
                meta: None,
            },
        };

        let ok = result.is_error != Some(true);
        self.events.api_call(&ApiCallEvent {
            tool: tool.name.clone(),
            method: tool.metadata.method.to_string(),
            path: tool.metadata.path.clone(),
            ok,
            elapsed: started.elapsed(),
            at: Utc::now(),
        });
        if !ok {
            self.events
                .error("tools/call", &format!("tool '{}' failed", tool.name));
        }

        match serde_json::to_value(&result) {
            Ok(value) => jsonrpc_ok(id, value),
            Err(e) => jsonrpc_err(id, INTERNAL_ERROR, &e.to_string()),
        }
    }
}

fn initialize_result(frame: &Value) -> Value {
    let protocol_version = frame
        .pointer("/params/protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": { "listChanged": true } },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tools_list_result(session: &Session) -> Value {
    let set = session.tools();
    let tools: Vec<Value> = set
        .tools
        .iter()
        .map(|t| {
            serde_json::to_value(t.to_mcp_tool()).unwrap_or_else(|_| json!({ "name": t.name }))
        })
        .collect();
    json!({ "tools": tools })
}

pub(crate) fn jsonrpc_ok(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub(crate) fn jsonrpc_err(id: &Value, code: i32, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

/// The broadcast frame sent to open sessions after a reload changed the
/// tool surface.
#[must_use]
pub fn tools_list_changed() -> Value {
    json!({ "jsonrpc": "2.0", "method": "notifications/tools/list_changed" })
}
