//! `OpenAPI` -> MCP tool pipeline.
//!
//! This crate turns an `OpenAPI` document into a set of MCP tools:
//! - [`loader`] fetches/parses the document and inlines local `$ref`s
//! - [`endpoints`] extracts operation descriptors in document order
//! - [`security`] analyzes security schemes and their usage
//! - [`transform`] converts operations into tool descriptors
//! - [`invoke`] executes a tool call against the upstream API
//!
//! Everything past the loader is pure computation with no I/O; the transport
//! layer lives in `gantry-mcp-bridge`.

pub mod endpoints;
pub mod error;
pub mod invoke;
pub mod loader;
pub mod resolver;
pub mod schema;
pub mod security;
pub mod transform;
