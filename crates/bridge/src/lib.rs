//! MCP bridge: session-oriented transport over two wire bindings.
//!
//! The pipeline in `gantry-openapi-tools` turns an `OpenAPI` document into
//! tool descriptors; this crate publishes them to protocol clients:
//! - [`session`] owns the session state machine and registry
//! - [`rpc`] dispatches JSON-RPC frames for one session
//! - [`sse`] is the event-stream binding (long-lived stream + command channel)
//! - [`stdio`] is the standard-stream binding (one implicit session)
//! - [`publisher`] computes and caches the published tool set
//! - [`events`] is the injected monitoring sink

pub mod admin;
pub mod config;
pub mod error;
pub mod events;
pub mod publisher;
pub mod rpc;
pub mod service;
pub mod session;
pub mod sse;
pub mod stdio;
