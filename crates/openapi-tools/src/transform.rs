//! Operation -> tool transformation.
//!
//! Pure function from operation descriptors to tool descriptors. Names are
//! derived deterministically (`operationId` when present, else a canonical
//! method+path slug) and must be unique within a run; a collision aborts the
//! whole run so a partial tool set is never published.

use crate::endpoints::{EndpointFilter, HttpMethod, OperationDescriptor, ParameterLocation};
use crate::error::{PipelineError, Result};
use crate::schema::SchemaNode;
use regex::Regex;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Options steering a transformation run.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Emit tools for operations marked `deprecated: true`.
    pub include_deprecated: bool,
    /// Only emit tools for operations carrying one of these tags.
    pub tag_filter: Vec<String>,
    /// Only emit tools for operations with one of these `operationId`s.
    pub operation_id_filter: Vec<String>,
    /// Propagated into tool metadata; extraction never reads it.
    pub base_url: Option<String>,
}

impl TransformOptions {
    fn endpoint_filter(&self) -> EndpointFilter {
        EndpointFilter {
            methods: None,
            tags: (!self.tag_filter.is_empty()).then(|| self.tag_filter.clone()),
            operation_ids: (!self.operation_id_filter.is_empty())
                .then(|| self.operation_id_filter.clone()),
            include_deprecated: self.include_deprecated,
        }
    }
}

/// Invocation metadata carried alongside the input schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMetadata {
    pub method: HttpMethod,
    pub path: String,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub base_url: Option<String>,
}

/// JSON-Schema-shaped input schema: one property per exposed argument.
#[derive(Debug, Clone, Default)]
pub struct ToolInputSchema {
    /// Property name -> JSON schema, parameters first, body properties after.
    pub properties: Vec<(String, Value)>,
    pub required: Vec<String>,
}

impl ToolInputSchema {
    /// Render as a JSON Schema object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut props = serde_json::Map::new();
        for (name, schema) in &self.properties {
            props.insert(name.clone(), schema.clone());
        }
        let mut out = json!({ "type": "object", "properties": Value::Object(props) });
        if !self.required.is_empty() {
            out["required"] = json!(self.required);
        }
        out
    }
}

/// Where a tool argument lands in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentTarget {
    Path,
    Query,
    Header,
    /// One property of a structured JSON body.
    BodyField,
    /// The whole request body, verbatim.
    Body,
}

#[derive(Debug, Clone)]
pub struct ArgumentBinding {
    pub name: String,
    pub target: ArgumentTarget,
    pub required: bool,
}

/// The callable unit exposed to protocol clients. Created fresh per
/// transformation run; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique within one run.
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub metadata: ToolMetadata,
    /// Placement of each input property at invocation time.
    pub bindings: Vec<ArgumentBinding>,
}

impl ToolDescriptor {
    /// Render as an MCP `Tool` for `tools/list`.
    #[must_use]
    pub fn to_mcp_tool(&self) -> Tool {
        let schema_obj = self
            .input_schema
            .to_json()
            .as_object()
            .cloned()
            .unwrap_or_else(JsonObject::new);
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(schema_obj),
        )
    }
}

/// Transform operations into tool descriptors.
///
/// Emits exactly one descriptor per operation surviving the option filters,
/// in input order.
///
/// # Errors
///
/// Returns an error on a tool name collision or a parameter/body property
/// collision; a failed run publishes nothing.
pub fn transform(
    operations: &[OperationDescriptor],
    options: &TransformOptions,
) -> Result<Vec<ToolDescriptor>> {
    let filter = options.endpoint_filter();
    let mut tools = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for op in operations.iter().filter(|op| filter.matches(op)) {
        let name = tool_name(op);
        if let Some(first) = seen.insert(name.clone(), op.identifier()) {
            return Err(PipelineError::NameCollision {
                name,
                first,
                second: op.identifier(),
            });
        }
        tools.push(build_tool(name, op, options)?);
    }
    Ok(tools)
}

fn tool_name(op: &OperationDescriptor) -> String {
    match &op.operation_id {
        Some(id) => id.clone(),
        None => canonical_name(op.method, &op.path),
    }
}

/// Generate a canonical tool name from method and path.
fn canonical_name(method: HttpMethod, path: &str) -> String {
    let mut name = format!("{}_{}", method.as_str().to_lowercase(), path);

    // Replace path params {param} with _param
    let re = Regex::new(r"\{([^}]+)\}").unwrap();
    name = re.replace_all(&name, "_$1").to_string();

    // Replace non-alphanumeric with underscore
    let re = Regex::new(r"[^a-zA-Z0-9]+").unwrap();
    name = re.replace_all(&name, "_").to_string();

    // Collapse repeated underscores
    let re = Regex::new(r"_+").unwrap();
    name = re.replace_all(&name, "_").to_string();

    // Trim underscores
    name = name.trim_matches('_').to_string();

    // Cap length
    if name.len() > 64 {
        name = name[..64].to_string();
    }

    name
}

fn build_tool(
    name: String,
    op: &OperationDescriptor,
    options: &TransformOptions,
) -> Result<ToolDescriptor> {
    let description = op
        .summary
        .clone()
        .or_else(|| op.description.clone())
        .unwrap_or_else(|| format!("Calls {} {}", op.method, op.path));

    let mut properties: Vec<(String, Value)> = Vec::new();
    let mut required: Vec<String> = Vec::new();
    let mut bindings: Vec<ArgumentBinding> = Vec::new();
    let mut names: HashSet<String> = HashSet::new();

    for param in &op.parameters {
        let target = match param.location {
            ParameterLocation::Path => ArgumentTarget::Path,
            ParameterLocation::Query => ArgumentTarget::Query,
            ParameterLocation::Header => ArgumentTarget::Header,
            // Cookie parameters are not exposed as tool inputs.
            ParameterLocation::Cookie => continue,
        };
        if !names.insert(param.name.clone()) {
            return Err(PipelineError::ParamCollision(format!(
                "Parameter '{}' appears multiple times in {} {}",
                param.name, op.method, op.path
            )));
        }

        let mut schema = param.schema.to_json_schema();
        if let Some(desc) = &param.description
            && schema.get("description").is_none()
        {
            schema["description"] = json!(desc);
        }
        properties.push((param.name.clone(), schema));
        if param.required {
            required.push(param.name.clone());
        }
        bindings.push(ArgumentBinding {
            name: param.name.clone(),
            target,
            required: param.required,
        });
    }

    if let Some(body) = &op.request_body {
        match body.schema.as_ref() {
            Some(SchemaNode::Object {
                properties: body_props,
                required: body_required,
                ..
            }) if !body_props.is_empty() => {
                // Flatten structured JSON bodies: one argument per property.
                for (prop_name, prop_schema) in body_props {
                    if !names.insert(prop_name.clone()) {
                        return Err(PipelineError::ParamCollision(format!(
                            "Body property '{}' collides with a parameter in {} {}",
                            prop_name, op.method, op.path
                        )));
                    }
                    properties.push((prop_name.clone(), prop_schema.to_json_schema()));
                    let is_required = body.required && body_required.contains(prop_name);
                    if is_required {
                        required.push(prop_name.clone());
                    }
                    bindings.push(ArgumentBinding {
                        name: prop_name.clone(),
                        target: ArgumentTarget::BodyField,
                        required: is_required,
                    });
                }
            }
            _ => {
                // Unresolved or non-object bodies become one opaque argument.
                if !names.insert("body".to_string()) {
                    return Err(PipelineError::ParamCollision(format!(
                        "Opaque body argument collides with a parameter named 'body' in {} {}",
                        op.method, op.path
                    )));
                }
                properties.push(("body".to_string(), json!({ "description": "Raw request body" })));
                if body.required {
                    required.push("body".to_string());
                }
                bindings.push(ArgumentBinding {
                    name: "body".to_string(),
                    target: ArgumentTarget::Body,
                    required: body.required,
                });
            }
        }
    }

    Ok(ToolDescriptor {
        name,
        description,
        input_schema: ToolInputSchema {
            properties,
            required,
        },
        metadata: ToolMetadata {
            method: op.method,
            path: op.path.clone(),
            tags: op.tags.clone(),
            deprecated: op.deprecated,
            base_url: options.base_url.clone(),
        },
        bindings,
    })
}
