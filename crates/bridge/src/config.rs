//! Bridge configuration.

use crate::error::{BridgeError, Result};
use gantry_openapi_tools::loader::SpecSource;
use gantry_openapi_tools::transform::TransformOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one bridged API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// `OpenAPI` spec location (URL or file path).
    #[serde(default)]
    pub spec: Option<String>,

    /// Inline `OpenAPI` document (JSON or YAML); alternative to `spec`.
    #[serde(default)]
    pub spec_inline: Option<String>,

    /// Override base URL from the spec's `servers` entry.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Expose operations marked `deprecated: true`.
    #[serde(default)]
    pub include_deprecated: bool,

    /// Only expose operations carrying one of these tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Only expose operations with one of these operationIds.
    #[serde(default)]
    pub operation_ids: Vec<String>,

    /// Event-stream endpoint path.
    #[serde(default = "default_sse_path")]
    pub sse_path: String,

    /// Command endpoint path.
    #[serde(default = "default_message_path")]
    pub message_path: String,

    /// Upstream call timeout in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_sse_path() -> String {
    "/sse".to_string()
}

fn default_message_path() -> String {
    "/messages".to_string()
}

fn default_call_timeout_secs() -> u64 {
    30
}

impl BridgeConfig {
    /// Load and validate a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field combinations.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on conflicting or missing fields.
    pub fn validate(&self) -> Result<()> {
        if self.spec.is_none() && self.spec_inline.is_none() {
            return Err(BridgeError::Config(
                "config needs either 'spec' or 'specInline'".to_string(),
            ));
        }
        if self.spec.is_some() && self.spec_inline.is_some() {
            return Err(BridgeError::Config(
                "'spec' and 'specInline' are mutually exclusive".to_string(),
            ));
        }
        for (field, value) in [("ssePath", &self.sse_path), ("messagePath", &self.message_path)] {
            if !value.starts_with('/') {
                return Err(BridgeError::Config(format!(
                    "'{field}' must start with '/': {value}"
                )));
            }
        }
        Ok(())
    }

    /// The loader source for this config.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither spec field is set.
    pub fn spec_source(&self) -> Result<SpecSource> {
        if let Some(location) = &self.spec {
            return Ok(SpecSource::from_location(location));
        }
        if let Some(content) = &self.spec_inline {
            return Ok(SpecSource::Inline(content.clone()));
        }
        Err(BridgeError::Config(
            "config needs either 'spec' or 'specInline'".to_string(),
        ))
    }

    /// Transformation options derived from this config.
    #[must_use]
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            include_deprecated: self.include_deprecated,
            tag_filter: self.tags.clone(),
            operation_id_filter: self.operation_ids.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config: BridgeConfig =
            serde_yaml::from_str("spec: ./openapi.yaml").unwrap();
        assert_eq!(config.sse_path, "/sse");
        assert_eq!(config.message_path, "/messages");
        assert_eq!(config.call_timeout_secs, 30);
        assert!(!config.include_deprecated);
        config.validate().unwrap();
    }

    #[test]
    fn camel_case_keys() {
        let config: BridgeConfig = serde_yaml::from_str(
            r"
spec: https://example.com/openapi.json
baseUrl: https://example.com/api
includeDeprecated: true
operationIds: [listPets]
ssePath: /events
messagePath: /commands
",
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://example.com/api"));
        assert!(config.include_deprecated);
        assert_eq!(config.operation_ids, vec!["listPets"]);
        assert_eq!(config.sse_path, "/events");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_missing_and_conflicting_spec() {
        let config: BridgeConfig = serde_yaml::from_str("{}").unwrap();
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let config: BridgeConfig = serde_yaml::from_str(
            r#"
spec: ./a.yaml
specInline: "openapi: 3.0.0"
"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }

    #[test]
    fn rejects_relative_endpoint_paths() {
        let config: BridgeConfig = serde_yaml::from_str(
            r"
spec: ./a.yaml
ssePath: sse
",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));
    }
}
