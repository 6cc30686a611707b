//! OpenAPI document model
//!
//! Only the subset the server emits is modelled: one operation per path,
//! JSON request and response bodies referencing component schemas, and the
//! component schema table itself.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::ecode::ApiError;
use crate::schema::{SchemaRef, SchemaTable};

const JSON_CONTENT: &str = "application/json";

/// Root of the API description
#[derive(Debug, Clone, Serialize)]
pub struct ApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// Title and version
    pub info: Info,
    /// Path -> operations
    pub paths: BTreeMap<String, PathItem>,
    /// Component schemas
    pub components: Components,
}

/// Document metadata
#[derive(Debug, Clone, Serialize)]
pub struct Info {
    /// Document title
    pub title: String,
    /// API version
    pub version: String,
}

/// Operations available on one path
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathItem {
    /// Websocket upgrade of a streaming method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    /// Unary call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
}

/// One documented operation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// `{Service}{Method}`
    pub operation_id: String,
    /// Grouping tags (the service name)
    pub tags: Vec<String>,
    /// Short summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// JSON request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Body>,
    /// Status -> response
    pub responses: BTreeMap<String, Body>,
}

/// Request body or response with JSON content
#[derive(Debug, Clone, Serialize)]
pub struct Body {
    /// Response description (required by OpenAPI for responses)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Media type -> schema
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

/// Schema for one media type
#[derive(Debug, Clone, Serialize)]
pub struct MediaType {
    /// Body schema
    pub schema: SchemaRef,
}

/// Reusable components
#[derive(Debug, Clone, Default, Serialize)]
pub struct Components {
    /// Named object schemas
    pub schemas: SchemaTable,
}

impl Body {
    fn json(schema: SchemaRef, description: Option<&str>) -> Self {
        let mut content = BTreeMap::new();
        content.insert(JSON_CONTENT.to_string(), MediaType { schema });
        Self {
            description: description.map(str::to_string),
            content,
        }
    }
}

impl Default for ApiDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiDocument {
    /// Empty document titled "API Reference"
    pub fn new() -> Self {
        Self {
            openapi: "3.0.3".to_string(),
            info: Info {
                title: "API Reference".to_string(),
                version: "1.0".to_string(),
            },
            paths: BTreeMap::new(),
            components: Components::default(),
        }
    }

    /// Document a unary method as a `post` operation
    pub fn add_unary(
        &mut self,
        path: &str,
        service: &str,
        method: &str,
        request: SchemaRef,
        response: SchemaRef,
    ) {
        let mut responses = BTreeMap::new();
        responses.insert("200".to_string(), Body::json(response, Some("OK")));
        responses.insert(
            "default".to_string(),
            Body::json(SchemaRef::Named(ApiError::SCHEMA_NAME.to_string()), Some("Error")),
        );

        let operation = Operation {
            operation_id: format!("{}{}", service, method),
            tags: vec![service.to_string()],
            summary: None,
            request_body: Some(Body::json(request, None)),
            responses,
        };
        self.paths.entry(path.to_string()).or_default().post = Some(operation);
    }

    /// Document a streaming method as a websocket upgrade (`get`, `101`)
    pub fn add_stream(&mut self, path: &str, service: &str, method: &str) {
        let mut responses = BTreeMap::new();
        responses.insert(
            "101".to_string(),
            Body {
                description: Some("Switching to websocket".to_string()),
                content: BTreeMap::new(),
            },
        );

        let operation = Operation {
            operation_id: format!("{}{}", service, method),
            tags: vec![service.to_string()],
            summary: Some("Websocket stream".to_string()),
            request_body: None,
            responses,
        };
        self.paths.entry(path.to_string()).or_default().get = Some(operation);
    }

    /// Install the component schemas
    pub fn set_schemas(&mut self, schemas: SchemaTable) {
        self.components.schemas = schemas;
    }

    /// JSON with four-space indentation
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_unary_operation_layout() {
        let mut doc = ApiDocument::new();
        doc.add_unary(
            "/api/Hello/SayHello",
            "Hello",
            "SayHello",
            SchemaRef::Named("HelloSayHelloRequest".into()),
            SchemaRef::Named("HelloSayHelloResponse".into()),
        );

        let value: Value = serde_json::from_slice(&doc.to_pretty_json().unwrap()).unwrap();
        assert_eq!(value["openapi"], "3.0.3");
        assert_eq!(value["info"], json!({ "title": "API Reference", "version": "1.0" }));

        let post = &value["paths"]["/api/Hello/SayHello"]["post"];
        assert_eq!(post["operationId"], "HelloSayHello");
        assert_eq!(post["tags"], json!(["Hello"]));
        assert_eq!(
            post["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/HelloSayHelloRequest"
        );
        assert_eq!(
            post["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/HelloSayHelloResponse"
        );
        assert_eq!(
            post["responses"]["default"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/ApiError"
        );
    }

    #[test]
    fn test_stream_operation_is_upgrade() {
        let mut doc = ApiDocument::new();
        doc.add_stream("/api/Hello/StreamHello", "Hello", "StreamHello");

        let value = serde_json::to_value(&doc).unwrap();
        let item = &value["paths"]["/api/Hello/StreamHello"];
        assert!(item.get("post").is_none());
        assert_eq!(item["get"]["operationId"], "HelloStreamHello");
        assert!(item["get"]["responses"]["101"].is_object());
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let text = String::from_utf8(ApiDocument::new().to_pretty_json().unwrap()).unwrap();
        assert!(text.contains("\n    \"openapi\": \"3.0.3\""));
        assert!(!text.contains("\n  \"openapi\""));
    }
}
