//! `OpenAPI` document loading.
//!
//! The loader owns the only I/O in the pipeline: it fetches or reads the raw
//! document, parses it, and runs the local `$ref` dereference pass. Extraction
//! and transformation downstream are pure. Load failures are surfaced to the
//! caller and never retried here.

use crate::error::{PipelineError, Result};
use crate::resolver;
use openapiv3::OpenAPI;
use reqwest::Client;
use url::Url;

/// Where a spec document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// Fetch over HTTP(S).
    Url(String),
    /// Read from the local filesystem.
    File(String),
    /// Inline document content (JSON or YAML).
    Inline(String),
}

impl SpecSource {
    /// Classify a configured `spec` location: URLs by scheme, everything else
    /// a file path.
    #[must_use]
    pub fn from_location(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            SpecSource::Url(location.to_string())
        } else {
            SpecSource::File(location.to_string())
        }
    }

    /// Identifier used in error messages and logs.
    #[must_use]
    pub fn display(&self) -> &str {
        match self {
            SpecSource::Url(url) => url,
            SpecSource::File(path) => path,
            SpecSource::Inline(_) => "inline",
        }
    }
}

/// Loads and normalizes `OpenAPI` documents.
#[derive(Debug, Clone, Default)]
pub struct SpecLoader {
    client: Client,
}

impl SpecLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Load, parse, and dereference a spec document.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be fetched/read or does not parse
    /// as an `OpenAPI` document.
    pub async fn load(&self, source: &SpecSource) -> Result<OpenAPI> {
        let content = match source {
            SpecSource::Url(location) => {
                tracing::info!("Fetching OpenAPI spec from {location}");
                let url = Url::parse(location).map_err(|e| {
                    PipelineError::Spec(format!("Invalid spec URL '{location}': {e}"))
                })?;
                let resp = self.client.get(url).send().await.map_err(|e| {
                    PipelineError::SpecFetch {
                        url: location.clone(),
                        message: e.to_string(),
                    }
                })?;
                if !resp.status().is_success() {
                    return Err(PipelineError::SpecFetch {
                        url: location.clone(),
                        message: format!("HTTP {}", resp.status()),
                    });
                }
                resp.text().await.map_err(|e| PipelineError::SpecFetch {
                    url: location.clone(),
                    message: e.to_string(),
                })?
            }
            SpecSource::File(path) => {
                tracing::info!("Loading OpenAPI spec from {path}");
                std::fs::read_to_string(path).map_err(|e| PipelineError::SpecRead {
                    path: path.clone(),
                    source: e,
                })?
            }
            SpecSource::Inline(content) => content.clone(),
        };

        // Parse spec (JSON is a valid subset of YAML, so serde_yaml alone is enough)
        let mut spec: OpenAPI =
            serde_yaml::from_str(&content).map_err(|e| PipelineError::SpecParse {
                location: source.display().to_string(),
                source: e,
            })?;

        resolver::dereference(&mut spec)?;
        Ok(spec)
    }
}
