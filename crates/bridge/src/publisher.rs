//! Tool set publication.
//!
//! Runs the pipeline (load -> extract -> analyze -> transform) and caches the
//! result. Every publish hands out one internally consistent snapshot: all
//! tools in a [`ToolSet`] came from the same extraction pass. A reload swaps
//! the cached snapshot atomically; on failure the previous snapshot keeps
//! serving.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use gantry_openapi_tools::endpoints::extract_endpoints;
use gantry_openapi_tools::invoke::ToolInvoker;
use gantry_openapi_tools::loader::SpecLoader;
use gantry_openapi_tools::security::{SecurityAnalysis, analyze_security, validate};
use gantry_openapi_tools::transform::{ToolDescriptor, transform};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// One publish unit.
#[derive(Debug)]
pub struct ToolSet {
    pub tools: Vec<ToolDescriptor>,
    pub analysis: SecurityAnalysis,
    /// sha256 over the canonical tool surface; unchanged fingerprints suppress
    /// `list_changed` broadcasts.
    pub fingerprint: String,
    pub invoker: ToolInvoker,
}

impl ToolSet {
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}

/// Computes and caches the published tool set.
pub struct ToolPublisher {
    config: BridgeConfig,
    loader: SpecLoader,
    current: RwLock<Option<Arc<ToolSet>>>,
}

impl ToolPublisher {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            loader: SpecLoader::new(),
            current: RwLock::new(None),
        }
    }

    /// The cached snapshot, if one has been computed.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<ToolSet>> {
        self.current.read().clone()
    }

    /// Current snapshot, computing it on first use.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error when no snapshot exists yet and computing one
    /// fails; callers scope that failure to the session being opened.
    pub async fn acquire(&self) -> Result<Arc<ToolSet>> {
        if let Some(set) = self.snapshot() {
            return Ok(set);
        }
        let set = self.compute().await?;
        *self.current.write() = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Re-run the pipeline and swap the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a pipeline error on failure; the previous snapshot is left in
    /// place.
    pub async fn reload(&self) -> Result<Arc<ToolSet>> {
        let set = self.compute().await?;
        *self.current.write() = Some(Arc::clone(&set));
        Ok(set)
    }

    async fn compute(&self) -> Result<Arc<ToolSet>> {
        let source = self.config.spec_source()?;
        let spec = self.loader.load(&source).await?;

        let base_url = self
            .config
            .base_url
            .clone()
            .or_else(|| spec.servers.first().map(|s| s.url.clone()))
            .ok_or_else(|| {
                BridgeError::Config("no base URL configured and none found in spec".to_string())
            })?;

        let endpoints = extract_endpoints(&spec);
        let analysis = analyze_security(&spec);

        let report = validate(&analysis);
        for warning in &report.warnings {
            tracing::warn!(%warning, "security analysis");
        }
        for recommendation in &report.recommendations {
            tracing::info!(%recommendation, "security analysis");
        }

        let mut options = self.config.transform_options();
        options.base_url = Some(base_url.clone());
        let tools = transform(endpoints.operations(), &options)?;
        let fingerprint = surface_fingerprint(&tools);

        tracing::info!(
            operations = endpoints.len(),
            tools = tools.len(),
            unsecured = analysis.unsecured_operations.len(),
            "tool surface computed"
        );

        Ok(Arc::new(ToolSet {
            tools,
            analysis,
            fingerprint,
            invoker: ToolInvoker::new(base_url, Duration::from_secs(self.config.call_timeout_secs)),
        }))
    }
}

/// Canonical hash of the published tool surface.
fn surface_fingerprint(tools: &[ToolDescriptor]) -> String {
    let mut hasher = Sha256::new();
    for tool in tools {
        hasher.update(tool.name.as_bytes());
        hasher.update([0]);
        hasher.update(tool.description.as_bytes());
        hasher.update([0]);
        hasher.update(tool.input_schema.to_json().to_string().as_bytes());
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_inline(spec: &str) -> BridgeConfig {
        let mut config: BridgeConfig = serde_yaml::from_str("{}").unwrap();
        config.spec_inline = Some(spec.to_string());
        config
    }

    const SPEC: &str = r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
servers:
  - url: https://api.example.com/v1
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        "200": { description: ok }
"#;

    #[tokio::test]
    async fn acquire_computes_once_and_caches() {
        let publisher = ToolPublisher::new(config_with_inline(SPEC));
        assert!(publisher.snapshot().is_none());

        let first = publisher.acquire().await.unwrap();
        let second = publisher.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.tools.len(), 1);
        assert_eq!(first.invoker.base_url(), "https://api.example.com/v1");
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let publisher = ToolPublisher::new(config_with_inline(SPEC));
        let before = publisher.acquire().await.unwrap();

        // Sabotage: swap config content is not possible, so simulate by
        // building a second publisher over a broken document and checking the
        // error path leaves its (absent) snapshot untouched.
        let broken = ToolPublisher::new(config_with_inline("not: [valid"));
        assert!(broken.reload().await.is_err());
        assert!(broken.snapshot().is_none());

        assert!(Arc::ptr_eq(&before, &publisher.snapshot().unwrap()));
    }

    #[tokio::test]
    async fn fingerprint_is_stable_across_runs() {
        let publisher = ToolPublisher::new(config_with_inline(SPEC));
        let a = publisher.acquire().await.unwrap().fingerprint.clone();
        let b = publisher.reload().await.unwrap().fingerprint.clone();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_base_url_is_a_config_error() {
        let publisher = ToolPublisher::new(config_with_inline(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
paths: {}
"#,
        ));
        let err = publisher.acquire().await.unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
