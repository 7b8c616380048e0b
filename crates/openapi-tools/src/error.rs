//! Error types for `gantry-openapi-tools`.

use thiserror::Error;

/// Main error type for the `OpenAPI` tool pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Spec errors (malformed or structurally unusable source document).
    #[error("Spec error: {0}")]
    Spec(String),

    #[error("Spec error: failed to fetch '{url}': {message}")]
    SpecFetch { url: String, message: String },

    #[error("Spec error: failed to read '{path}': {source}")]
    SpecRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Spec error: failed to parse OpenAPI document from '{location}': {source}")]
    SpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Two operations produced the same tool name; the whole run aborts.
    #[error("Tool name collision: '{name}' produced by both {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    /// Parameter collision errors.
    #[error("Parameter collision: {0}")]
    ParamCollision(String),

    /// Invocation errors (missing arguments, unbuildable requests).
    #[error("Invoke error: {0}")]
    Invoke(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
