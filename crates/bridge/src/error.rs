//! Error types for the MCP bridge.

use thiserror::Error;

/// Main error type for the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration errors (invalid YAML, missing fields, conflicts)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (a binding could not be established)
    #[error("Startup error: {0}")]
    Startup(String),

    /// Transport errors scoped to one session or request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound command addressed to a session that is not open
    #[error("No active transport for session '{0}'")]
    UnknownSession(String),

    /// Pipeline failures (spec load, extraction, transformation, invocation)
    #[error(transparent)]
    Pipeline(#[from] gantry_openapi_tools::error::PipelineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
