//! Endpoint extraction.
//!
//! Walks a loaded `OpenAPI` document and produces a flat list of operation
//! descriptors in document order: outer iteration follows path declaration
//! order, inner iteration follows a fixed method order. Pure function of the
//! document; anything still reference-shaped after the loader's dereference
//! pass is skipped, never an error.

use crate::schema::{PrimitiveKind, SchemaNode};
use openapiv3::{OpenAPI, Operation, Parameter, ParameterSchemaOrContent, PathItem, ReferenceOr};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// HTTP methods an `OpenAPI` path item can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Fixed inner iteration order for extraction.
    pub const ORDER: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: SchemaNode,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestBodyDescriptor {
    pub required: bool,
    /// Media type the schema was taken from (`application/json` preferred).
    pub content_type: Option<String>,
    /// Absent for non-JSON bodies; the transformer degrades those to an
    /// opaque `body` argument.
    pub schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    /// Status code string (`"200"`, `"4XX"`, `"default"`).
    pub status: String,
    pub description: String,
}

/// One requirement set: AND of named schemes with their scopes. A list of
/// requirement sets is OR-alternatives.
pub type RequirementSet = Vec<(String, Vec<String>)>;

/// One extracted operation. Immutable after extraction; identity is
/// `(method, path)`, since `operation_id` may be absent or non-unique.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    pub request_body: Option<RequestBodyDescriptor>,
    pub responses: Vec<ResponseDescriptor>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    /// Operation-level security, verbatim. `None` when the operation declares
    /// no `security` key at all; an explicit empty list is `Some(vec![])`.
    pub security: Option<Vec<RequirementSet>>,
}

impl OperationDescriptor {
    /// The uniform operation identity: `operationId` when assigned, else
    /// `"METHOD path"`.
    #[must_use]
    pub fn identifier(&self) -> String {
        operation_identifier(self.operation_id.as_deref(), self.method, &self.path)
    }
}

/// The identity key used everywhere an operation needs a stable name
/// (extraction, security analysis, tool naming).
#[must_use]
pub fn operation_identifier(operation_id: Option<&str>, method: HttpMethod, path: &str) -> String {
    match operation_id {
        Some(id) => id.to_string(),
        None => format!("{method} {path}"),
    }
}

pub(crate) fn requirement_sets(reqs: &[openapiv3::SecurityRequirement]) -> Vec<RequirementSet> {
    reqs.iter()
        .map(|req| {
            req.iter()
                .map(|(name, scopes)| (name.clone(), scopes.clone()))
                .collect()
        })
        .collect()
}

/// Extract all operations from a document, in document order.
#[must_use]
pub fn extract_endpoints(spec: &OpenAPI) -> EndpointSet {
    let mut operations = Vec::new();
    for (path, item) in &spec.paths.paths {
        let path_item = match item {
            ReferenceOr::Item(item) => item,
            ReferenceOr::Reference { reference } => {
                tracing::debug!(path = %path, reference = %reference, "skipping unresolved path item $ref");
                continue;
            }
        };
        for method in HttpMethod::ORDER {
            let Some(op) = method_operation(path_item, method) else {
                continue;
            };
            operations.push(build_descriptor(path, method, path_item, op));
        }
    }
    EndpointSet { operations }
}

fn method_operation(item: &PathItem, method: HttpMethod) -> Option<&Operation> {
    match method {
        HttpMethod::Get => item.get.as_ref(),
        HttpMethod::Post => item.post.as_ref(),
        HttpMethod::Put => item.put.as_ref(),
        HttpMethod::Delete => item.delete.as_ref(),
        HttpMethod::Patch => item.patch.as_ref(),
        HttpMethod::Head => item.head.as_ref(),
        HttpMethod::Options => item.options.as_ref(),
        HttpMethod::Trace => item.trace.as_ref(),
    }
}

fn build_descriptor(
    path: &str,
    method: HttpMethod,
    path_item: &PathItem,
    op: &Operation,
) -> OperationDescriptor {
    let request_body = op.request_body.as_ref().and_then(|body| match body {
        ReferenceOr::Item(body) => Some(build_request_body(body)),
        ReferenceOr::Reference { reference } => {
            tracing::debug!(path = %path, reference = %reference, "skipping unresolved request body $ref");
            None
        }
    });

    OperationDescriptor {
        path: path.to_string(),
        method,
        operation_id: op.operation_id.clone(),
        summary: op.summary.clone(),
        description: op.description.clone(),
        parameters: merge_parameters(&path_item.parameters, &op.parameters),
        request_body,
        responses: build_responses(&op.responses),
        tags: op.tags.clone(),
        deprecated: op.deprecated,
        security: op.security.as_deref().map(requirement_sets),
    }
}

/// Path-item parameters apply to every operation on the path; operation-level
/// entries override them by `(location, name)`.
fn merge_parameters(
    path_item_params: &[ReferenceOr<Parameter>],
    operation_params: &[ReferenceOr<Parameter>],
) -> Vec<ParameterDescriptor> {
    let mut merged: Vec<ParameterDescriptor> = Vec::new();
    let mut index: HashMap<(ParameterLocation, String), usize> = HashMap::new();

    for source in [path_item_params, operation_params] {
        for param in source {
            let param = match param {
                ReferenceOr::Item(param) => param,
                ReferenceOr::Reference { reference } => {
                    tracing::debug!(reference = %reference, "skipping unresolved parameter $ref");
                    continue;
                }
            };
            let descriptor = describe_parameter(param);
            let key = (descriptor.location, descriptor.name.clone());
            if let Some(i) = index.get(&key).copied() {
                merged[i] = descriptor;
            } else {
                index.insert(key, merged.len());
                merged.push(descriptor);
            }
        }
    }
    merged
}

fn describe_parameter(param: &Parameter) -> ParameterDescriptor {
    let (location, data) = match param {
        Parameter::Path { parameter_data, .. } => (ParameterLocation::Path, parameter_data),
        Parameter::Query { parameter_data, .. } => (ParameterLocation::Query, parameter_data),
        Parameter::Header { parameter_data, .. } => (ParameterLocation::Header, parameter_data),
        Parameter::Cookie { parameter_data, .. } => (ParameterLocation::Cookie, parameter_data),
    };
    let schema = match &data.format {
        ParameterSchemaOrContent::Schema(schema_ref) => SchemaNode::from_openapi_ref(schema_ref),
        // `content:`-style parameters are serialized strings on the wire.
        ParameterSchemaOrContent::Content(_) => SchemaNode::Primitive {
            kind: PrimitiveKind::String,
            enumeration: Vec::new(),
            description: None,
        },
    };
    ParameterDescriptor {
        name: data.name.clone(),
        location,
        required: data.required,
        schema,
        description: data.description.clone(),
    }
}

fn build_request_body(body: &openapiv3::RequestBody) -> RequestBodyDescriptor {
    if let Some(media) = body.content.get("application/json") {
        return RequestBodyDescriptor {
            required: body.required,
            content_type: Some("application/json".to_string()),
            schema: media.schema.as_ref().map(SchemaNode::from_openapi_ref),
        };
    }
    RequestBodyDescriptor {
        required: body.required,
        content_type: body.content.keys().next().cloned(),
        schema: None,
    }
}

fn build_responses(responses: &openapiv3::Responses) -> Vec<ResponseDescriptor> {
    let mut out = Vec::new();
    for (status, resp) in &responses.responses {
        if let ReferenceOr::Item(resp) = resp {
            let status = match status {
                openapiv3::StatusCode::Code(code) => code.to_string(),
                openapiv3::StatusCode::Range(range) => format!("{range}XX"),
            };
            out.push(ResponseDescriptor {
                status,
                description: resp.description.clone(),
            });
        }
    }
    if let Some(ReferenceOr::Item(resp)) = &responses.default {
        out.push(ResponseDescriptor {
            status: "default".to_string(),
            description: resp.description.clone(),
        });
    }
    out
}

/// Sentinel bucket for operations without tags.
pub const UNTAGGED: &str = "untagged";

/// Criteria for [`EndpointSet::filter`]. Absent fields do not constrain;
/// provided lists are OR-within, AND-across.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter {
    pub methods: Option<Vec<HttpMethod>>,
    pub tags: Option<Vec<String>>,
    pub operation_ids: Option<Vec<String>>,
    pub include_deprecated: bool,
}

impl EndpointFilter {
    #[must_use]
    pub fn matches(&self, op: &OperationDescriptor) -> bool {
        if let Some(methods) = &self.methods
            && !methods.contains(&op.method)
        {
            return false;
        }
        if let Some(tags) = &self.tags
            && !op.tags.iter().any(|tag| tags.contains(tag))
        {
            return false;
        }
        if let Some(ids) = &self.operation_ids {
            match &op.operation_id {
                Some(id) if ids.contains(id) => {}
                _ => return false,
            }
        }
        if op.deprecated && !self.include_deprecated {
            return false;
        }
        true
    }
}

/// Aggregate counters over an extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStats {
    pub total: usize,
    pub by_method: HashMap<HttpMethod, usize>,
    pub deprecated: usize,
    /// Operations declaring a non-empty `security` list of their own.
    pub secured: usize,
    pub tags: BTreeSet<String>,
}

/// The ordered result of one extraction pass.
#[derive(Debug, Clone)]
pub struct EndpointSet {
    operations: Vec<OperationDescriptor>,
}

impl EndpointSet {
    #[must_use]
    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Select the subsequence matching every provided criterion.
    #[must_use]
    pub fn filter(&self, criteria: &EndpointFilter) -> Vec<&OperationDescriptor> {
        self.operations
            .iter()
            .filter(|op| criteria.matches(op))
            .collect()
    }

    /// Group operations by tag, preserving first-seen tag order. Operations
    /// without tags land in the [`UNTAGGED`] bucket; an operation with several
    /// tags appears once under each.
    #[must_use]
    pub fn group_by_tag(&self) -> Vec<(String, Vec<&OperationDescriptor>)> {
        let mut buckets: Vec<(String, Vec<&OperationDescriptor>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for op in &self.operations {
            let tags: Vec<&str> = if op.tags.is_empty() {
                vec![UNTAGGED]
            } else {
                op.tags.iter().map(String::as_str).collect()
            };
            for tag in tags {
                let i = *index.entry(tag.to_string()).or_insert_with(|| {
                    buckets.push((tag.to_string(), Vec::new()));
                    buckets.len() - 1
                });
                buckets[i].1.push(op);
            }
        }
        buckets
    }

    #[must_use]
    pub fn stats(&self) -> EndpointStats {
        let mut by_method: HashMap<HttpMethod, usize> = HashMap::new();
        let mut deprecated = 0;
        let mut secured = 0;
        let mut tags = BTreeSet::new();

        for op in &self.operations {
            *by_method.entry(op.method).or_default() += 1;
            if op.deprecated {
                deprecated += 1;
            }
            if op.security.as_ref().is_some_and(|s| !s.is_empty()) {
                secured += 1;
            }
            tags.extend(op.tags.iter().cloned());
        }

        EndpointStats {
            total: self.operations.len(),
            by_method,
            deprecated,
            secured,
            tags,
        }
    }
}
