//! Schema nodes and the schema table
//!
//! Nodes serialize directly into the OpenAPI schema object dialect: primitive
//! `type`, `items` for lists, `additionalProperties` for maps, `$ref` for
//! named objects.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

use crate::shape::Primitive;

/// Prefix of a reference to a named component schema
pub const SCHEMA_PREFIX: &str = "#/components/schemas/";

/// Either an inline schema or a reference to a named object schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaRef {
    /// Schema embedded in place
    Inline(Box<SchemaNode>),
    /// Qualified name of an entry in the [`SchemaTable`]
    Named(String),
}

impl SchemaRef {
    /// Inline wrapper around a node
    pub fn inline(node: SchemaNode) -> Self {
        SchemaRef::Inline(Box::new(node))
    }

    /// Qualified name, if this is a reference
    pub fn name(&self) -> Option<&str> {
        match self {
            SchemaRef::Named(name) => Some(name),
            SchemaRef::Inline(_) => None,
        }
    }

    /// `$ref` target for a named schema
    pub fn ref_path(name: &str) -> String {
        format!("{}{}", SCHEMA_PREFIX, name)
    }
}

/// A synthesized schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// Scalar
    Primitive(Primitive),
    /// Array of the element schema
    List(SchemaRef),
    /// String-keyed map of the value schema
    Map(SchemaRef),
    /// Object with named properties
    Object(ObjectSchema),
}

/// Properties of an object schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    /// Wire name -> property schema
    pub properties: BTreeMap<String, FieldSchema>,
    /// Wire names of required properties, in declaration order
    pub required: Vec<String>,
}

/// Schema of a single object property
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Property schema
    pub schema: SchemaRef,
    /// Human-readable description
    pub description: Option<String>,
}

impl Serialize for SchemaRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SchemaRef::Inline(node) => node.serialize(serializer),
            SchemaRef::Named(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$ref", &SchemaRef::ref_path(name))?;
                map.end()
            }
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            SchemaNode::Primitive(primitive) => {
                map.serialize_entry("type", primitive.as_str())?;
            }
            SchemaNode::List(items) => {
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", items)?;
            }
            SchemaNode::Map(value) => {
                map.serialize_entry("type", "object")?;
                map.serialize_entry("additionalProperties", value)?;
            }
            SchemaNode::Object(object) => {
                map.serialize_entry("type", "object")?;
                if !object.properties.is_empty() {
                    map.serialize_entry("properties", &object.properties)?;
                }
                if !object.required.is_empty() {
                    map.serialize_entry("required", &object.required)?;
                }
            }
        }
        map.end()
    }
}

impl Serialize for FieldSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // $ref siblings are ignored by OpenAPI 3.0 tooling, so a description
        // is only emitted next to inline schemas.
        match (&self.schema, &self.description) {
            (SchemaRef::Inline(node), Some(description)) => {
                let mut value = serde_json::to_value(node).map_err(serde::ser::Error::custom)?;
                if let serde_json::Value::Object(fields) = &mut value {
                    fields.insert(
                        "description".to_string(),
                        serde_json::Value::String(description.clone()),
                    );
                }
                value.serialize(serializer)
            }
            _ => self.schema.serialize(serializer),
        }
    }
}

/// Named object schemas, one physical shape per name
#[derive(Debug, Clone, Default)]
pub struct SchemaTable {
    schemas: BTreeMap<String, SchemaNode>,
    origins: HashMap<String, &'static str>,
}

impl SchemaTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema stored under a qualified name
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.schemas.get(name)
    }

    /// Origin identity that claimed a qualified name
    pub fn origin(&self, name: &str) -> Option<&'static str> {
        self.origins.get(name).copied()
    }

    /// Whether a qualified name has been claimed
    pub fn contains(&self, name: &str) -> bool {
        self.origins.contains_key(name)
    }

    /// Number of claimed names
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Completed schemas in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.schemas.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Claim a name before its fields are walked
    pub(crate) fn reserve(&mut self, name: &str, origin: &'static str) {
        self.origins.insert(name.to_string(), origin);
    }

    pub(crate) fn insert(&mut self, name: String, node: SchemaNode) {
        self.schemas.insert(name, node);
    }
}

impl Serialize for SchemaTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.schemas.serialize(serializer)
    }
}
