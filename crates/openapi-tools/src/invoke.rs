//! Outbound tool invocation.
//!
//! Executes a transformed tool against the upstream HTTP API and shapes the
//! response into an MCP `CallToolResult`. Argument placement follows the
//! bindings recorded by the transformer; request building fails before any
//! I/O when required arguments are missing.

use crate::endpoints::HttpMethod;
use crate::error::{PipelineError, Result};
use crate::transform::{ArgumentTarget, ToolDescriptor};
use base64::Engine as _;
use mime::Mime;
use reqwest::{Client, Method};
use rmcp::model::{CallToolResult, Content};
use serde_json::Value;
use std::time::Duration;

/// Executes tool calls against one upstream API.
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    client: Client,
    base_url: String,
    call_timeout: Duration,
}

#[derive(Debug)]
struct RequestParts {
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl ToolInvoker {
    #[must_use]
    pub fn new(base_url: String, call_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            call_timeout,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke `tool` with the given JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if required arguments are missing or the request
    /// cannot be built. Upstream transport failures and non-2xx responses are
    /// reported inside the result with `is_error` set, so protocol clients see
    /// tool-level failures rather than protocol errors.
    pub async fn invoke(&self, tool: &ToolDescriptor, arguments: &Value) -> Result<CallToolResult> {
        let parts = self.build_request(tool, arguments)?;

        tracing::debug!(tool = %tool.name, url = %parts.url, "invoking upstream operation");

        let mut req = self
            .client
            .request(request_method(tool.metadata.method), &parts.url)
            .timeout(self.call_timeout);
        for (name, value) in &parts.headers {
            req = req.header(name, value);
        }
        if let Some(body) = &parts.body {
            req = req.json(body);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                return Ok(error_result(format!(
                    "request to {} failed: {e}",
                    parts.url
                )));
            }
        };

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Ok(error_result(format!("upstream returned {status}: {text}")));
        }

        let mime: Option<Mime> = content_type.parse().ok();
        let is_json = mime
            .as_ref()
            .is_some_and(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON));
        let is_text = mime.as_ref().is_some_and(|m| m.type_() == mime::TEXT);
        let is_image = mime.as_ref().is_some_and(|m| m.type_() == mime::IMAGE);

        if is_json {
            let body: Value = resp.json().await.map_err(|e| {
                PipelineError::Invoke(format!("invalid JSON from upstream: {e}"))
            })?;
            let text = serde_json::to_string(&body).unwrap_or_else(|_| body.to_string());
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else if is_image {
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| PipelineError::Invoke(format!("failed to read upstream body: {e}")))?;
            let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(CallToolResult {
                content: vec![Content::image(b64, content_type)],
                structured_content: None,
                is_error: Some(false),
                meta: None,
            })
        } else if is_text || content_type.is_empty() {
            let text = resp
                .text()
                .await
                .map_err(|e| PipelineError::Invoke(format!("failed to read upstream body: {e}")))?;
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            // Unknown binary payloads are passed through base64-encoded.
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| PipelineError::Invoke(format!("failed to read upstream body: {e}")))?;
            let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(CallToolResult::success(vec![Content::text(b64)]))
        }
    }

    fn build_request(&self, tool: &ToolDescriptor, arguments: &Value) -> Result<RequestParts> {
        let args = arguments.as_object().cloned().unwrap_or_default();

        let mut path = tool.metadata.path.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut body_fields = serde_json::Map::new();
        let mut body_payload: Option<Value> = None;

        for binding in &tool.bindings {
            let Some(value) = args.get(&binding.name) else {
                if binding.required {
                    return Err(PipelineError::Invoke(format!(
                        "missing required argument '{}'",
                        binding.name
                    )));
                }
                continue;
            };
            match binding.target {
                ArgumentTarget::Path => {
                    let encoded = percent_encode(&value_to_string(value));
                    path = path.replace(&format!("{{{}}}", binding.name), &encoded);
                }
                ArgumentTarget::Query => match value {
                    // Arrays repeat the key (form-style, exploded).
                    Value::Array(items) => {
                        for item in items {
                            query.push((binding.name.clone(), value_to_string(item)));
                        }
                    }
                    _ => query.push((binding.name.clone(), value_to_string(value))),
                },
                ArgumentTarget::Header => {
                    headers.push((binding.name.clone(), value_to_string(value)));
                }
                ArgumentTarget::BodyField => {
                    body_fields.insert(binding.name.clone(), value.clone());
                }
                ArgumentTarget::Body => body_payload = Some(value.clone()),
            }
        }

        // Any template piece left means a path parameter never bound.
        if path.contains('{') {
            return Err(PipelineError::Invoke(format!(
                "unresolved path parameters in '{path}'"
            )));
        }

        let mut url = format!("{}{}", self.base_url, path);
        if !query.is_empty() {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&qs);
        }

        let body = if body_payload.is_some() {
            body_payload
        } else if body_fields.is_empty() {
            None
        } else {
            Some(Value::Object(body_fields))
        };

        Ok(RequestParts { url, headers, body })
    }
}

fn request_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Trace => Method::TRACE,
    }
}

fn error_result(message: String) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(message)],
        structured_content: None,
        is_error: Some(true),
        meta: None,
    }
}

/// Percent-encode everything outside the RFC3986 unreserved set. Safe for
/// both path segments and query components.
fn percent_encode(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

/// Convert a JSON value to a string for URL/header placement.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::extract_endpoints;
    use crate::transform::{TransformOptions, transform};
    use openapiv3::OpenAPI;
    use serde_json::json;

    fn petstore_tools() -> Vec<ToolDescriptor> {
        let spec: OpenAPI = serde_yaml::from_str(
            r#"
openapi: "3.0.0"
info: { title: t, version: "1" }
paths:
  /pets/{petId}:
    get:
      operationId: getPet
      parameters:
        - name: petId
          in: path
          required: true
          schema: { type: string }
        - name: verbose
          in: query
          required: false
          schema: { type: boolean }
        - name: X-Trace
          in: header
          required: false
          schema: { type: string }
      responses:
        "200": { description: ok }
  /pets:
    post:
      operationId: addPet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
                tags:
                  type: array
                  items: { type: string }
      responses:
        "201": { description: created }
"#,
        )
        .unwrap();
        let endpoints = extract_endpoints(&spec);
        transform(endpoints.operations(), &TransformOptions::default()).unwrap()
    }

    fn invoker() -> ToolInvoker {
        ToolInvoker::new(
            "https://api.example.com/v1/".to_string(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("hello")), "hello");
        assert_eq!(value_to_string(&json!(123)), "123");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(null)), "");
    }

    #[test]
    fn substitutes_path_and_query_and_headers() {
        let tools = petstore_tools();
        let get_pet = tools.iter().find(|t| t.name == "getPet").unwrap();

        let parts = invoker()
            .build_request(
                get_pet,
                &json!({ "petId": "a b", "verbose": true, "X-Trace": "t1" }),
            )
            .unwrap();

        assert_eq!(
            parts.url,
            "https://api.example.com/v1/pets/a%20b?verbose=true"
        );
        assert_eq!(
            parts.headers,
            vec![("X-Trace".to_string(), "t1".to_string())]
        );
        assert!(parts.body.is_none());
    }

    #[test]
    fn assembles_body_from_flattened_properties() {
        let tools = petstore_tools();
        let add_pet = tools.iter().find(|t| t.name == "addPet").unwrap();

        let parts = invoker()
            .build_request(add_pet, &json!({ "name": "rex", "tags": ["good"] }))
            .unwrap();

        assert_eq!(parts.url, "https://api.example.com/v1/pets");
        assert_eq!(
            parts.body,
            Some(json!({ "name": "rex", "tags": ["good"] }))
        );
    }

    #[test]
    fn missing_required_argument_fails_before_io() {
        let tools = petstore_tools();
        let get_pet = tools.iter().find(|t| t.name == "getPet").unwrap();

        let err = invoker()
            .build_request(get_pet, &json!({ "verbose": true }))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Invoke(_)));
    }

    #[tokio::test]
    async fn invokes_against_a_live_server() {
        use axum::extract::Path;
        use axum::routing::get;

        let app = axum::Router::new().route(
            "/v1/pets/{petId}",
            get(|Path(pet_id): Path<String>| async move {
                axum::Json(json!({ "id": pet_id, "name": "rex" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let tools = petstore_tools();
        let get_pet = tools.iter().find(|t| t.name == "getPet").unwrap();
        let invoker = ToolInvoker::new(format!("http://{addr}/v1"), Duration::from_secs(5));

        let result = invoker
            .invoke(get_pet, &json!({ "petId": "42" }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));

        let result = invoker
            .invoke(get_pet, &json!({ "petId": "0", "verbose": false }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn non_2xx_is_a_tool_level_error() {
        let app = axum::Router::new();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let tools = petstore_tools();
        let get_pet = tools.iter().find(|t| t.name == "getPet").unwrap();
        let invoker = ToolInvoker::new(format!("http://{addr}"), Duration::from_secs(5));

        let result = invoker
            .invoke(get_pet, &json!({ "petId": "42" }))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
