//! Security scheme analysis.
//!
//! Walks the same document the endpoint extractor walks and reports which
//! security schemes exist, where they are used, and which operations accept
//! requests without any security requirement. Absent sections are treated as
//! empty, never as failures.

use crate::endpoints::{RequirementSet, extract_endpoints, requirement_sets};
use openapiv3::{APIKeyLocation, OAuth2Flows, OpenAPI, ReferenceOr, SecurityScheme};

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyIn {
    Query,
    Header,
    Cookie,
}

/// Summary of one OAuth2 flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSummary {
    pub flow: &'static str,
    pub scopes: Vec<String>,
}

/// The scheme kinds `OpenAPI` defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeKind {
    ApiKey {
        location: ApiKeyIn,
        /// Name of the header/query/cookie parameter carrying the key.
        parameter: String,
    },
    Http {
        scheme: String,
    },
    OAuth2 {
        flows: Vec<FlowSummary>,
    },
    OpenIdConnect,
}

impl SchemeKind {
    /// Histogram label, matching the `OpenAPI` `type` field.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SchemeKind::ApiKey { .. } => "apiKey",
            SchemeKind::Http { .. } => "http",
            SchemeKind::OAuth2 { .. } => "oauth2",
            SchemeKind::OpenIdConnect => "openIdConnect",
        }
    }
}

/// One declared security scheme plus derived usage. Recomputed on every
/// analysis; read-only afterwards.
#[derive(Debug, Clone)]
pub struct SecuritySchemeEntry {
    pub name: String,
    pub scheme: SchemeKind,
    /// Mentions across the global security list and all operation-level lists.
    pub usage_count: usize,
    /// Identifiers of operations whose own `security` references this scheme.
    pub used_in_operations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SecurityAnalysis {
    /// Declared schemes in declaration order.
    pub schemes: Vec<SecuritySchemeEntry>,
    /// Document-level security; an absent key normalizes to the empty list.
    pub global_security: Vec<RequirementSet>,
    /// Operation identifier -> effective requirement sets (its own if
    /// declared, else the global list when one exists). Operations with
    /// neither are absent.
    pub operation_security: Vec<(String, Vec<RequirementSet>)>,
    /// Operations that accept requests without any security requirement: an
    /// explicit empty `security` list always qualifies; a missing `security`
    /// key qualifies only when no global security exists.
    pub unsecured_operations: Vec<String>,
}

/// Analyze a document's security schemes and their usage.
#[must_use]
pub fn analyze_security(spec: &OpenAPI) -> SecurityAnalysis {
    let global_security: Vec<RequirementSet> = spec
        .security
        .as_deref()
        .map(requirement_sets)
        .unwrap_or_default();

    let mut schemes: Vec<SecuritySchemeEntry> = Vec::new();
    if let Some(components) = &spec.components {
        for (name, scheme) in &components.security_schemes {
            let scheme = match scheme {
                ReferenceOr::Item(scheme) => scheme,
                ReferenceOr::Reference { reference } => {
                    tracing::debug!(name = %name, reference = %reference, "skipping reference-shaped security scheme");
                    continue;
                }
            };
            schemes.push(SecuritySchemeEntry {
                name: name.clone(),
                scheme: scheme_kind(scheme),
                usage_count: 0,
                used_in_operations: Vec::new(),
            });
        }
    }

    // Global requirement mentions bump the counter only.
    for set in &global_security {
        for (name, _scopes) in set {
            if let Some(entry) = schemes.iter_mut().find(|s| &s.name == name) {
                entry.usage_count += 1;
            }
        }
    }

    let endpoints = extract_endpoints(spec);
    let mut operation_security: Vec<(String, Vec<RequirementSet>)> = Vec::new();
    let mut unsecured_operations: Vec<String> = Vec::new();

    for op in endpoints.operations() {
        let id = op.identifier();
        match &op.security {
            Some(own) => {
                // Operation-level mentions bump the counter and record the
                // operation.
                for set in own {
                    for (name, _scopes) in set {
                        if let Some(entry) = schemes.iter_mut().find(|s| &s.name == name) {
                            entry.usage_count += 1;
                            if entry.used_in_operations.last() != Some(&id) {
                                entry.used_in_operations.push(id.clone());
                            }
                        }
                    }
                }
                if own.is_empty() {
                    // An explicit empty requirement list opts out of any
                    // global security.
                    unsecured_operations.push(id.clone());
                }
                operation_security.push((id, own.clone()));
            }
            None => {
                if global_security.is_empty() {
                    unsecured_operations.push(id);
                } else {
                    operation_security.push((id, global_security.clone()));
                }
            }
        }
    }

    SecurityAnalysis {
        schemes,
        global_security,
        operation_security,
        unsecured_operations,
    }
}

fn scheme_kind(scheme: &SecurityScheme) -> SchemeKind {
    match scheme {
        SecurityScheme::APIKey { location, name, .. } => SchemeKind::ApiKey {
            location: match location {
                APIKeyLocation::Query => ApiKeyIn::Query,
                APIKeyLocation::Header => ApiKeyIn::Header,
                APIKeyLocation::Cookie => ApiKeyIn::Cookie,
            },
            parameter: name.clone(),
        },
        SecurityScheme::HTTP { scheme, .. } => SchemeKind::Http {
            scheme: scheme.clone(),
        },
        SecurityScheme::OAuth2 { flows, .. } => SchemeKind::OAuth2 {
            flows: flow_summaries(flows),
        },
        SecurityScheme::OpenIDConnect { .. } => SchemeKind::OpenIdConnect,
    }
}

fn flow_summaries(flows: &OAuth2Flows) -> Vec<FlowSummary> {
    let mut out = Vec::new();
    if let Some(flow) = &flows.implicit {
        out.push(FlowSummary {
            flow: "implicit",
            scopes: flow.scopes.keys().cloned().collect(),
        });
    }
    if let Some(flow) = &flows.password {
        out.push(FlowSummary {
            flow: "password",
            scopes: flow.scopes.keys().cloned().collect(),
        });
    }
    if let Some(flow) = &flows.client_credentials {
        out.push(FlowSummary {
            flow: "clientCredentials",
            scopes: flow.scopes.keys().cloned().collect(),
        });
    }
    if let Some(flow) = &flows.authorization_code {
        out.push(FlowSummary {
            flow: "authorizationCode",
            scopes: flow.scopes.keys().cloned().collect(),
        });
    }
    out
}

/// Aggregate counters over an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityStats {
    /// Scheme-kind label -> count, in first-seen order.
    pub scheme_types: Vec<(String, usize)>,
    pub unused_schemes: usize,
    /// Ties on usage are broken by declaration order (first wins).
    pub most_used: Option<String>,
    pub least_used: Option<String>,
}

#[must_use]
pub fn security_stats(analysis: &SecurityAnalysis) -> SecurityStats {
    let mut scheme_types: Vec<(String, usize)> = Vec::new();
    for entry in &analysis.schemes {
        let label = entry.scheme.label();
        match scheme_types.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => scheme_types.push((label.to_string(), 1)),
        }
    }

    let mut most: Option<&SecuritySchemeEntry> = None;
    let mut least: Option<&SecuritySchemeEntry> = None;
    for entry in &analysis.schemes {
        if most.is_none_or(|m| entry.usage_count > m.usage_count) {
            most = Some(entry);
        }
        if least.is_none_or(|l| entry.usage_count < l.usage_count) {
            least = Some(entry);
        }
    }

    SecurityStats {
        scheme_types,
        unused_schemes: analysis
            .schemes
            .iter()
            .filter(|s| s.usage_count == 0)
            .count(),
        most_used: most.map(|e| e.name.clone()),
        least_used: least.map(|e| e.name.clone()),
    }
}

/// Advisory findings over an analysis; never failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityReport {
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

#[must_use]
pub fn validate(analysis: &SecurityAnalysis) -> SecurityReport {
    let mut report = SecurityReport::default();

    for entry in &analysis.schemes {
        if entry.usage_count == 0 {
            report.warnings.push(format!(
                "security scheme '{}' is declared but never referenced",
                entry.name
            ));
        }
        match &entry.scheme {
            SchemeKind::ApiKey {
                location: ApiKeyIn::Query,
                ..
            } => {
                report.recommendations.push(format!(
                    "scheme '{}' sends an API key in the query string; prefer a header",
                    entry.name
                ));
            }
            SchemeKind::OAuth2 { flows } => {
                if flows.iter().all(|f| f.scopes.is_empty()) {
                    report.recommendations.push(format!(
                        "oauth2 scheme '{}' declares no scopes in any flow",
                        entry.name
                    ));
                }
            }
            _ => {}
        }
    }

    if !analysis.unsecured_operations.is_empty() {
        report.warnings.push(format!(
            "{} operation(s) accept requests without any security requirement",
            analysis.unsecured_operations.len()
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(yaml: &str) -> SecurityAnalysis {
        let spec: OpenAPI = serde_yaml::from_str(yaml).unwrap();
        analyze_security(&spec)
    }

    #[test]
    fn pets_scenario_counts_usage_and_unsecured() {
        // One GET with no security, one POST requiring apiKeyAuth, and a
        // document-level `security: []` (present but empty).
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
security: []
components:
  securitySchemes:
    apiKeyAuth:
      type: apiKey
      in: header
      name: X-Api-Key
paths:
  /pets:
    get:
      operationId: listPets
      tags: [pets]
      responses:
        "200": { description: ok }
    post:
      security:
        - apiKeyAuth: []
      responses:
        "201": { description: created }
"#,
        );

        assert_eq!(analysis.schemes.len(), 1);
        let entry = &analysis.schemes[0];
        assert_eq!(entry.name, "apiKeyAuth");
        assert_eq!(entry.usage_count, 1);
        assert_eq!(entry.used_in_operations, vec!["POST /pets"]);

        // `security: []` normalizes to "no global security exists", so the
        // GET (which declares nothing of its own) is unsecured.
        assert!(analysis.global_security.is_empty());
        assert_eq!(analysis.unsecured_operations, vec!["listPets"]);

        // POST carries its own list; GET inherits nothing.
        assert_eq!(analysis.operation_security.len(), 1);
        assert_eq!(analysis.operation_security[0].0, "POST /pets");
    }

    #[test]
    fn explicit_empty_operation_security_is_always_unsecured() {
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
security:
  - globalAuth: []
components:
  securitySchemes:
    globalAuth:
      type: http
      scheme: bearer
paths:
  /open:
    get:
      operationId: openOp
      security: []
      responses:
        "200": { description: ok }
  /inherits:
    get:
      operationId: inheritsOp
      responses:
        "200": { description: ok }
"#,
        );

        // openOp opts out even though global security exists.
        assert_eq!(analysis.unsecured_operations, vec!["openOp"]);

        // inheritsOp falls back to the global list.
        let inherited = analysis
            .operation_security
            .iter()
            .find(|(id, _)| id == "inheritsOp")
            .unwrap();
        assert_eq!(inherited.1, analysis.global_security);
        // openOp maps to its own (empty) declared list.
        let own = analysis
            .operation_security
            .iter()
            .find(|(id, _)| id == "openOp")
            .unwrap();
        assert!(own.1.is_empty());
    }

    #[test]
    fn global_optional_auth_set_counts_as_existing_security() {
        // `security: [{}]` is one empty requirement set ("optionally
        // secured"): the global list is non-empty, so operations without
        // their own security are NOT unsecured.
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
security:
  - {}
paths:
  /maybe:
    get:
      operationId: maybeOp
      responses:
        "200": { description: ok }
"#,
        );

        assert_eq!(analysis.global_security.len(), 1);
        assert!(analysis.unsecured_operations.is_empty());
        assert_eq!(analysis.operation_security[0].0, "maybeOp");
    }

    #[test]
    fn no_security_key_and_no_global_is_unsecured() {
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
paths:
  /bare:
    get:
      operationId: bareOp
      responses:
        "200": { description: ok }
"#,
        );
        assert_eq!(analysis.unsecured_operations, vec!["bareOp"]);
        assert!(analysis.operation_security.is_empty());
    }

    #[test]
    fn global_mentions_bump_usage_without_recording_operations() {
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
security:
  - bearerAuth: []
components:
  securitySchemes:
    bearerAuth:
      type: http
      scheme: bearer
    unusedKey:
      type: apiKey
      in: query
      name: token
paths:
  /items:
    get:
      operationId: listItems
      responses:
        "200": { description: ok }
"#,
        );

        let bearer = &analysis.schemes[0];
        assert_eq!(bearer.usage_count, 1);
        assert!(bearer.used_in_operations.is_empty());

        let stats = security_stats(&analysis);
        assert_eq!(stats.unused_schemes, 1);
        assert_eq!(stats.most_used.as_deref(), Some("bearerAuth"));
        assert_eq!(stats.least_used.as_deref(), Some("unusedKey"));
        assert_eq!(
            stats.scheme_types,
            vec![("http".to_string(), 1), ("apiKey".to_string(), 1)]
        );
    }

    #[test]
    fn stats_ties_break_by_declaration_order() {
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
components:
  securitySchemes:
    first:
      type: http
      scheme: basic
    second:
      type: http
      scheme: bearer
paths: {}
"#,
        );
        let stats = security_stats(&analysis);
        assert_eq!(stats.most_used.as_deref(), Some("first"));
        assert_eq!(stats.least_used.as_deref(), Some("first"));
    }

    #[test]
    fn validate_flags_unused_query_keys_and_scopeless_oauth2() {
        let analysis = analyze(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
components:
  securitySchemes:
    queryKey:
      type: apiKey
      in: query
      name: token
    scopeless:
      type: oauth2
      flows:
        clientCredentials:
          tokenUrl: https://example.com/token
          scopes: {}
paths:
  /items:
    get:
      operationId: listItems
      responses:
        "200": { description: ok }
"#,
        );

        let report = validate(&analysis);
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("'queryKey'") && w.contains("never referenced"))
        );
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.contains("1 operation(s)"))
        );
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.contains("'queryKey'") && r.contains("query string"))
        );
        assert!(
            report
                .recommendations
                .iter()
                .any(|r| r.contains("'scopeless'") && r.contains("no scopes"))
        );
    }
}
