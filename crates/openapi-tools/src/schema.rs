//! Tagged schema representation.
//!
//! The `openapiv3` crate models schemas as a large typed tree; tool generation
//! only needs a small JSON-Schema-shaped subset. [`SchemaNode`] is that subset
//! as a tagged variant, so every consumer pattern-matches exhaustively instead
//! of poking at untyped JSON.

use openapiv3::{ReferenceOr, Schema, SchemaKind, Type};
use serde_json::{Value, json};

/// Scalar schema kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl PrimitiveKind {
    /// JSON Schema `type` keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
        }
    }
}

/// A normalized parameter/body schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Primitive {
        kind: PrimitiveKind,
        /// Allowed values, for enumerated strings. Empty when unconstrained.
        enumeration: Vec<String>,
        description: Option<String>,
    },
    Object {
        /// Property name -> schema, in declaration order.
        properties: Vec<(String, SchemaNode)>,
        required: Vec<String>,
        description: Option<String>,
    },
    Array {
        items: Option<Box<SchemaNode>>,
        description: Option<String>,
    },
    /// A reference the loader could not inline. Consumers skip or pass it
    /// through; nothing in the pipeline dereferences it.
    Reference { reference: String },
}

impl SchemaNode {
    /// Convert an `OpenAPI` schema.
    ///
    /// Compositions (`oneOf`/`allOf`/`anyOf`) and untyped schemas degrade to an
    /// open object, the same fallback the generated tool schema would need.
    #[must_use]
    pub fn from_openapi(schema: &Schema) -> Self {
        let description = schema.schema_data.description.clone();
        match &schema.schema_kind {
            SchemaKind::Type(Type::String(s)) => SchemaNode::Primitive {
                kind: PrimitiveKind::String,
                enumeration: s
                    .enumeration
                    .iter()
                    .filter_map(std::clone::Clone::clone)
                    .collect(),
                description,
            },
            SchemaKind::Type(Type::Number(_)) => SchemaNode::Primitive {
                kind: PrimitiveKind::Number,
                enumeration: Vec::new(),
                description,
            },
            SchemaKind::Type(Type::Integer(_)) => SchemaNode::Primitive {
                kind: PrimitiveKind::Integer,
                enumeration: Vec::new(),
                description,
            },
            SchemaKind::Type(Type::Boolean(_)) => SchemaNode::Primitive {
                kind: PrimitiveKind::Boolean,
                enumeration: Vec::new(),
                description,
            },
            SchemaKind::Type(Type::Array(a)) => SchemaNode::Array {
                items: a
                    .items
                    .as_ref()
                    .map(|items| Box::new(Self::from_boxed_ref(items))),
                description,
            },
            SchemaKind::Type(Type::Object(o)) => SchemaNode::Object {
                properties: o
                    .properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), Self::from_boxed_ref(prop)))
                    .collect(),
                required: o.required.clone(),
                description,
            },
            _ => SchemaNode::Object {
                properties: Vec::new(),
                required: Vec::new(),
                description,
            },
        }
    }

    /// Convert a schema that may still be a `$ref`.
    #[must_use]
    pub fn from_openapi_ref(schema: &ReferenceOr<Schema>) -> Self {
        match schema {
            ReferenceOr::Item(schema) => Self::from_openapi(schema),
            ReferenceOr::Reference { reference } => SchemaNode::Reference {
                reference: reference.clone(),
            },
        }
    }

    fn from_boxed_ref(schema: &ReferenceOr<Box<Schema>>) -> Self {
        match schema {
            ReferenceOr::Item(schema) => Self::from_openapi(schema),
            ReferenceOr::Reference { reference } => SchemaNode::Reference {
                reference: reference.clone(),
            },
        }
    }

    /// Render as a JSON Schema value.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        match self {
            SchemaNode::Primitive {
                kind,
                enumeration,
                description,
            } => {
                let mut out = json!({ "type": kind.as_str() });
                if !enumeration.is_empty() {
                    out["enum"] = json!(enumeration);
                }
                if let Some(desc) = description {
                    out["description"] = json!(desc);
                }
                out
            }
            SchemaNode::Object {
                properties,
                required,
                description,
            } => {
                let mut out = json!({ "type": "object" });
                if !properties.is_empty() {
                    let mut props = serde_json::Map::new();
                    for (name, node) in properties {
                        props.insert(name.clone(), node.to_json_schema());
                    }
                    out["properties"] = Value::Object(props);
                }
                if !required.is_empty() {
                    out["required"] = json!(required);
                }
                if let Some(desc) = description {
                    out["description"] = json!(desc);
                }
                out
            }
            SchemaNode::Array { items, description } => {
                let mut out = json!({ "type": "array" });
                if let Some(items) = items {
                    out["items"] = items.to_json_schema();
                }
                if let Some(desc) = description {
                    out["description"] = json!(desc);
                }
                out
            }
            SchemaNode::Reference { reference } => json!({ "$ref": reference }),
        }
    }

    /// Whether this is an object schema with at least one named property.
    #[must_use]
    pub fn is_structured_object(&self) -> bool {
        matches!(self, SchemaNode::Object { properties, .. } if !properties.is_empty())
    }
}
