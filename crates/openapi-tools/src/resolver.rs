//! Local `$ref` dereferencing.
//!
//! The `openapiv3` crate models `$ref`s using `ReferenceOr<T>` but does not
//! resolve them. This pass inlines same-document (`#/...`) references for path
//! items, parameters, request bodies, and schemas so extraction sees concrete
//! nodes wherever the document defines them. External references, dangling
//! pointers, and cyclic chains are left in place; downstream components treat
//! whatever is still reference-shaped as unresolved and skip it.

use crate::error::{PipelineError, Result};
use openapiv3::{
    OpenAPI, Parameter, ParameterData, ParameterSchemaOrContent, PathItem, ReferenceOr,
    RequestBody, Schema, SchemaKind, Type,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

/// Nested schema inlining stops here; anything deeper stays a `$ref`.
const MAX_SCHEMA_DEPTH: usize = 16;

/// Inline local references in place.
///
/// # Errors
///
/// Returns an error only if the document cannot be re-serialized for pointer
/// lookup; unresolvable references are never errors.
pub fn dereference(spec: &mut OpenAPI) -> Result<()> {
    let doc = serde_json::to_value(&*spec)
        .map_err(|e| PipelineError::Spec(format!("Failed to index OpenAPI document: {e}")))?;
    let resolver = Resolver { doc };

    for (_path, item) in spec.paths.paths.iter_mut() {
        resolver.inline_path_item(item);
    }
    Ok(())
}

struct Resolver {
    /// Snapshot of the document taken before any mutation; all pointer lookups
    /// go through this copy.
    doc: Value,
}

impl Resolver {
    fn inline_path_item(&self, item: &mut ReferenceOr<PathItem>) {
        if let ReferenceOr::Reference { reference } = item {
            match self.chase::<PathItem>(reference, &mut HashSet::new()) {
                Some(resolved) => *item = ReferenceOr::Item(resolved),
                None => return,
            }
        }
        let ReferenceOr::Item(path_item) = item else {
            return;
        };

        for param in &mut path_item.parameters {
            self.inline_parameter(param);
        }
        for op in [
            path_item.get.as_mut(),
            path_item.put.as_mut(),
            path_item.post.as_mut(),
            path_item.delete.as_mut(),
            path_item.options.as_mut(),
            path_item.head.as_mut(),
            path_item.patch.as_mut(),
            path_item.trace.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            for param in &mut op.parameters {
                self.inline_parameter(param);
            }
            if let Some(body) = &mut op.request_body {
                self.inline_request_body(body);
            }
        }
    }

    fn inline_parameter(&self, param: &mut ReferenceOr<Parameter>) {
        if let ReferenceOr::Reference { reference } = param {
            match self.chase::<Parameter>(reference, &mut HashSet::new()) {
                Some(resolved) => *param = ReferenceOr::Item(resolved),
                None => return,
            }
        }
        if let ReferenceOr::Item(param) = param
            && let ParameterSchemaOrContent::Schema(schema_ref) =
                &mut parameter_data_mut(param).format
        {
            self.inline_schema(schema_ref, 0);
        }
    }

    fn inline_request_body(&self, body: &mut ReferenceOr<RequestBody>) {
        if let ReferenceOr::Reference { reference } = body {
            match self.chase::<RequestBody>(reference, &mut HashSet::new()) {
                Some(resolved) => *body = ReferenceOr::Item(resolved),
                None => return,
            }
        }
        if let ReferenceOr::Item(body) = body {
            for media in body.content.values_mut() {
                if let Some(schema_ref) = &mut media.schema {
                    self.inline_schema(schema_ref, 0);
                }
            }
        }
    }

    fn inline_schema(&self, schema_ref: &mut ReferenceOr<Schema>, depth: usize) {
        if depth >= MAX_SCHEMA_DEPTH {
            return;
        }
        if let ReferenceOr::Reference { reference } = schema_ref {
            match self.chase::<Schema>(reference, &mut HashSet::new()) {
                Some(resolved) => *schema_ref = ReferenceOr::Item(resolved),
                None => return,
            }
        }
        if let ReferenceOr::Item(schema) = schema_ref {
            self.inline_schema_kind(&mut schema.schema_kind, depth);
        }
    }

    fn inline_boxed_schema(&self, schema_ref: &mut ReferenceOr<Box<Schema>>, depth: usize) {
        if depth >= MAX_SCHEMA_DEPTH {
            return;
        }
        if let ReferenceOr::Reference { reference } = schema_ref {
            match self.chase::<Schema>(reference, &mut HashSet::new()) {
                Some(resolved) => *schema_ref = ReferenceOr::Item(Box::new(resolved)),
                None => return,
            }
        }
        if let ReferenceOr::Item(schema) = schema_ref {
            self.inline_schema_kind(&mut schema.schema_kind, depth);
        }
    }

    fn inline_schema_kind(&self, kind: &mut SchemaKind, depth: usize) {
        match kind {
            SchemaKind::Type(Type::Object(obj)) => {
                for prop in obj.properties.values_mut() {
                    self.inline_boxed_schema(prop, depth + 1);
                }
            }
            SchemaKind::Type(Type::Array(arr)) => {
                if let Some(items) = &mut arr.items {
                    self.inline_boxed_schema(items, depth + 1);
                }
            }
            _ => {}
        }
    }

    /// Follow a chain of `$ref`s, guarding against cycles. A ref may point at
    /// another ref; hop through `ReferenceOr` until a concrete node or a dead
    /// end.
    fn chase<T: DeserializeOwned>(&self, reference: &str, seen: &mut HashSet<String>) -> Option<T> {
        if !seen.insert(reference.to_string()) {
            tracing::debug!(reference = %reference, "cyclic $ref; leaving in place");
            return None;
        }
        let value: ReferenceOr<T> = self.lookup(reference)?;
        match value {
            ReferenceOr::Item(item) => Some(item),
            ReferenceOr::Reference { reference: next } => self.chase(&next, seen),
        }
    }

    /// Look a local `#/...` reference up in the document snapshot.
    fn lookup<T: DeserializeOwned>(&self, reference: &str) -> Option<T> {
        let pointer = reference.strip_prefix('#')?;
        if !pointer.starts_with('/') {
            tracing::debug!(reference = %reference, "unsupported $ref fragment; leaving in place");
            return None;
        }
        let value = self.doc.pointer(pointer);
        if value.is_none() {
            tracing::debug!(reference = %reference, "dangling $ref; leaving in place");
        }
        serde_json::from_value(value?.clone()).ok()
    }
}

fn parameter_data_mut(param: &mut Parameter) -> &mut ParameterData {
    match param {
        Parameter::Query { parameter_data, .. }
        | Parameter::Header { parameter_data, .. }
        | Parameter::Path { parameter_data, .. }
        | Parameter::Cookie { parameter_data, .. } => parameter_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> OpenAPI {
        let mut spec: OpenAPI = serde_yaml::from_str(yaml).unwrap();
        dereference(&mut spec).unwrap();
        spec
    }

    fn path_item(spec: &OpenAPI, path: &str) -> PathItem {
        match &spec.paths.paths[path] {
            ReferenceOr::Item(item) => item.clone(),
            ReferenceOr::Reference { reference } => panic!("unresolved path item: {reference}"),
        }
    }

    #[test]
    fn inlines_parameter_ref() {
        let spec = load(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
components:
  parameters:
    QParam:
      name: q
      in: query
      required: true
      schema: { type: string }
paths:
  /users:
    get:
      operationId: listUsers
      parameters:
        - $ref: '#/components/parameters/QParam'
      responses:
        "200": { description: ok }
"#,
        );

        let item = path_item(&spec, "/users");
        let op = item.get.unwrap();
        match &op.parameters[0] {
            ReferenceOr::Item(Parameter::Query { parameter_data, .. }) => {
                assert_eq!(parameter_data.name, "q");
                assert!(parameter_data.required);
            }
            other => panic!("expected inlined query parameter, got {other:?}"),
        }
    }

    #[test]
    fn inlines_request_body_and_nested_schema_refs() {
        let spec = load(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
components:
  requestBodies:
    CreateUser:
      required: true
      content:
        application/json:
          schema:
            $ref: '#/components/schemas/User'
  schemas:
    User:
      type: object
      required: [name]
      properties:
        name: { type: string }
paths:
  /users:
    post:
      requestBody:
        $ref: '#/components/requestBodies/CreateUser'
      responses:
        "200": { description: ok }
"#,
        );

        let item = path_item(&spec, "/users");
        let op = item.post.unwrap();
        let ReferenceOr::Item(body) = op.request_body.unwrap() else {
            panic!("request body not inlined");
        };
        assert!(body.required);
        let schema = body.content["application/json"].schema.clone().unwrap();
        let ReferenceOr::Item(schema) = schema else {
            panic!("body schema not inlined");
        };
        match schema.schema_kind {
            SchemaKind::Type(Type::Object(obj)) => {
                assert!(obj.properties.contains_key("name"));
                assert_eq!(obj.required, vec!["name"]);
            }
            other => panic!("expected object schema, got {other:?}"),
        }
    }

    #[test]
    fn cyclic_schema_ref_stays_bounded() {
        // Node references itself; inlining must terminate and leave the inner
        // reference in place at some depth.
        let spec = load(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
components:
  schemas:
    Node:
      type: object
      properties:
        next:
          $ref: '#/components/schemas/Node'
paths:
  /nodes:
    post:
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Node'
      responses:
        "200": { description: ok }
"#,
        );

        let item = path_item(&spec, "/nodes");
        let op = item.post.unwrap();
        let ReferenceOr::Item(body) = op.request_body.unwrap() else {
            panic!("request body not inlined");
        };
        // If we got here without hanging, the depth cap held.
        assert!(body.content["application/json"].schema.is_some());
    }

    #[test]
    fn dangling_ref_is_left_in_place() {
        let spec = load(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
paths:
  /users:
    get:
      parameters:
        - $ref: '#/components/parameters/Missing'
      responses:
        "200": { description: ok }
"#,
        );

        let item = path_item(&spec, "/users");
        let op = item.get.unwrap();
        assert!(matches!(
            &op.parameters[0],
            ReferenceOr::Reference { .. }
        ));
    }
}
