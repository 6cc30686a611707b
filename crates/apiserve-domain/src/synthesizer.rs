//! Type Schema Synthesizer
//!
//! Walks [`Shape`]s into a [`SchemaTable`]. Named objects are stored once per
//! qualified name and referenced everywhere else, so the walk terminates on
//! self-referential types and the table never holds two physical shapes for
//! one name.

use crate::error::SchemaError;
use crate::schema::{FieldSchema, ObjectSchema, SchemaNode, SchemaRef, SchemaTable};
use crate::shape::{Field, ObjectShape, Primitive, Shape};

/// Accumulates schemas for every shape fed to it
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    table: SchemaTable,
}

impl Synthesizer {
    /// Create a synthesizer with an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas synthesized so far
    pub fn table(&self) -> &SchemaTable {
        &self.table
    }

    /// Consume the synthesizer, keeping its table
    pub fn into_table(self) -> SchemaTable {
        self.table
    }

    /// Qualified schema name of an object under `namespace`
    pub fn qualified_name(namespace: &str, name: &str) -> String {
        if name.starts_with(namespace) {
            name.to_string()
        } else {
            format!("{}{}", namespace, name)
        }
    }

    /// Synthesize the schema for `shape` under `namespace`.
    ///
    /// Objects are registered in the table and returned as references;
    /// everything else is returned inline. On error the table is left as it
    /// was before the call.
    pub fn synthesize(&mut self, namespace: &str, shape: &Shape) -> Result<SchemaRef, SchemaError> {
        let before = self.table.clone();
        match self.walk(namespace, shape) {
            Ok(schema) => Ok(schema),
            Err(err) => {
                self.table = before;
                Err(err)
            }
        }
    }

    fn walk(&mut self, namespace: &str, shape: &Shape) -> Result<SchemaRef, SchemaError> {
        match shape {
            Shape::Primitive(primitive) => Ok(SchemaRef::inline(SchemaNode::Primitive(*primitive))),
            Shape::List(item) => {
                let item = self.walk(namespace, item)?;
                Ok(SchemaRef::inline(SchemaNode::List(item)))
            }
            Shape::Map { key, value } => {
                if !matches!(**key, Shape::Primitive(Primitive::String)) {
                    return Err(SchemaError::UnsupportedKeyType {
                        key: key.kind().to_string(),
                        value: value.kind().to_string(),
                    });
                }
                let value = self.walk(namespace, value)?;
                Ok(SchemaRef::inline(SchemaNode::Map(value)))
            }
            Shape::Object(object) => self.synthesize_object(namespace, object),
            Shape::Unsupported(kind) => Err(SchemaError::UnsupportedShape {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
            }),
        }
    }

    fn synthesize_object(&mut self, namespace: &str, object: &ObjectShape) -> Result<SchemaRef, SchemaError> {
        if object.name.is_empty() {
            return Err(SchemaError::AnonymousShape {
                namespace: namespace.to_string(),
            });
        }

        let name = Self::qualified_name(namespace, object.name);
        if let Some(first) = self.table.origin(&name) {
            if first != object.origin {
                return Err(SchemaError::NamespaceCollision {
                    name,
                    first: first.to_string(),
                    second: object.origin.to_string(),
                });
            }
            return Ok(SchemaRef::Named(name));
        }

        // Claim the name first so recursive references resolve to it.
        self.table.reserve(&name, object.origin);

        let mut schema = ObjectSchema::default();
        for field in flatten_fields(object)? {
            if field.is_private() {
                continue;
            }
            let Some(wire) = field.wire_name() else {
                continue;
            };
            let field_schema = self.walk(namespace, &field.shape())?;
            if field.is_required() {
                schema.required.push(wire.clone());
            }
            schema.properties.insert(
                wire,
                FieldSchema {
                    schema: field_schema,
                    description: field.description.map(str::to_string),
                },
            );
        }

        self.table.insert(name.clone(), SchemaNode::Object(schema));
        Ok(SchemaRef::Named(name))
    }
}

/// Promote the fields of embedded objects into their parent.
///
/// Only one level is supported: an embedded object that embeds another object
/// is rejected. Embedded fields that are not objects stay regular fields.
pub fn flatten_fields(object: &ObjectShape) -> Result<Vec<Field>, SchemaError> {
    let mut flattened = Vec::new();
    for field in object.fields() {
        if !field.embedded {
            flattened.push(field);
            continue;
        }
        let shape = field.shape();
        let Some(embedded) = shape.as_object() else {
            flattened.push(field);
            continue;
        };
        for inner in embedded.fields() {
            if inner.embedded && inner.shape().is_object() {
                return Err(SchemaError::NestedEmbedding {
                    parent: object.name.to_string(),
                    embedded: embedded.name.to_string(),
                });
            }
            flattened.push(inner);
        }
    }
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shaped;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashMap};

    struct HelloRequest;
    impl Shaped for HelloRequest {
        fn shape() -> Shape {
            Shape::object::<Self>("HelloRequest", || {
                vec![
                    Field::new::<String>("Name").required().description("Required Name"),
                    Field::new::<Option<u32>>("age").rename("age,omitempty"),
                    Field::new::<String>("_secret"),
                    Field::new::<String>("token").rename("-"),
                ]
            })
        }
    }

    struct TreeNode;
    impl Shaped for TreeNode {
        fn shape() -> Shape {
            Shape::object::<Self>("TreeNode", || {
                vec![
                    Field::new::<String>("label"),
                    Field::new::<Vec<TreeNode>>("children"),
                ]
            })
        }
    }

    struct Meta;
    impl Shaped for Meta {
        fn shape() -> Shape {
            Shape::object::<Self>("Meta", || {
                vec![
                    Field::new::<String>("traceId").required(),
                    Field::new::<i64>("ts"),
                ]
            })
        }
    }

    struct WithMeta;
    impl Shaped for WithMeta {
        fn shape() -> Shape {
            Shape::object::<Self>("WithMeta", || {
                vec![Field::embed::<Meta>("Meta"), Field::new::<String>("body")]
            })
        }
    }

    struct Outer;
    impl Shaped for Outer {
        fn shape() -> Shape {
            Shape::object::<Self>("Outer", || vec![Field::embed::<WithMeta>("WithMeta")])
        }
    }

    struct EmbedsScalar;
    impl Shaped for EmbedsScalar {
        fn shape() -> Shape {
            Shape::object::<Self>("EmbedsScalar", || vec![Field::embed::<String>("Label")])
        }
    }

    mod other {
        use super::*;
        pub struct HelloRequest;
        impl Shaped for HelloRequest {
            fn shape() -> Shape {
                Shape::object::<Self>("HelloRequest", Vec::new)
            }
        }
    }

    fn object_schema<'a>(synth: &'a Synthesizer, name: &str) -> &'a ObjectSchema {
        match synth.table().get(name) {
            Some(SchemaNode::Object(object)) => object,
            other => panic!("expected object schema {}, got {:?}", name, other),
        }
    }

    #[test]
    fn test_primitives_are_inline() {
        let mut synth = Synthesizer::new();
        let schema = synth.synthesize("Hello", &i32::shape()).unwrap();
        assert_eq!(schema, SchemaRef::inline(SchemaNode::Primitive(Primitive::Integer)));
        assert!(synth.table().is_empty());
    }

    #[test]
    fn test_object_fields_and_annotations() {
        let mut synth = Synthesizer::new();
        let schema = synth.synthesize("Greeter", &HelloRequest::shape()).unwrap();
        assert_eq!(schema, SchemaRef::Named("GreeterHelloRequest".into()));

        let object = object_schema(&synth, "GreeterHelloRequest");
        let names: Vec<_> = object.properties.keys().cloned().collect();
        assert_eq!(names, vec!["age".to_string(), "name".to_string()]);
        assert_eq!(object.required, vec!["name".to_string()]);
        assert_eq!(object.properties["name"].description.as_deref(), Some("Required Name"));
        // Option is dereferenced to its pointee
        assert_eq!(
            object.properties["age"].schema,
            SchemaRef::inline(SchemaNode::Primitive(Primitive::Integer))
        );
    }

    #[test]
    fn test_namespace_prefix_not_doubled() {
        assert_eq!(Synthesizer::qualified_name("Hello", "HelloRequest"), "HelloRequest");
        assert_eq!(Synthesizer::qualified_name("Hello", "SayRequest"), "HelloSayRequest");
        assert_eq!(Synthesizer::qualified_name("", "ApiError"), "ApiError");
    }

    #[test]
    fn test_recursive_shape_terminates() {
        let mut synth = Synthesizer::new();
        synth.synthesize("Forest", &TreeNode::shape()).unwrap();

        let object = object_schema(&synth, "ForestTreeNode");
        assert_eq!(
            object.properties["children"].schema,
            SchemaRef::inline(SchemaNode::List(SchemaRef::Named("ForestTreeNode".into())))
        );
        assert_eq!(synth.table().len(), 1);
    }

    #[test]
    fn test_same_shape_registered_once() {
        let mut synth = Synthesizer::new();
        let first = synth.synthesize("Greeter", &HelloRequest::shape()).unwrap();
        let second = synth.synthesize("Greeter", &Vec::<HelloRequest>::shape()).unwrap();
        assert_eq!(first.name(), Some("GreeterHelloRequest"));
        assert_eq!(
            second,
            SchemaRef::inline(SchemaNode::List(SchemaRef::Named("GreeterHelloRequest".into())))
        );
        assert_eq!(synth.table().len(), 1);
    }

    #[test]
    fn test_namespace_collision() {
        let mut synth = Synthesizer::new();
        synth.synthesize("Greeter", &HelloRequest::shape()).unwrap();
        let err = synth.synthesize("Greeter", &other::HelloRequest::shape()).unwrap_err();
        assert!(matches!(err, SchemaError::NamespaceCollision { ref name, .. } if name == "GreeterHelloRequest"));
        assert!(err.to_string().contains("defined in multiple namespaces"));

        // A different namespace keeps the two apart
        synth.synthesize("Other", &other::HelloRequest::shape()).unwrap();
        let greeter = object_schema(&synth, "GreeterHelloRequest");
        let elsewhere = object_schema(&synth, "OtherHelloRequest");
        assert_ne!(greeter, elsewhere);
        assert!(elsewhere.properties.is_empty());
    }

    struct Feed;
    impl Shaped for Feed {
        fn shape() -> Shape {
            Shape::object::<Self>("Feed", || {
                vec![
                    Field::new::<Meta>("meta"),
                    Field::new::<std::sync::mpsc::Receiver<u8>>("updates"),
                ]
            })
        }
    }

    #[test]
    fn test_failed_object_leaves_no_trace() {
        let mut synth = Synthesizer::new();
        synth.synthesize("Svc", &TreeNode::shape()).unwrap();

        for _ in 0..2 {
            let err = synth.synthesize("Svc", &Feed::shape()).unwrap_err();
            assert!(matches!(err, SchemaError::UnsupportedShape { ref kind, .. } if kind == "channel"));
            assert!(!synth.table().contains("SvcFeed"));
            assert!(!synth.table().contains("SvcMeta"));
            assert_eq!(synth.table().len(), 1);
        }
    }

    #[test]
    fn test_map_requires_string_key() {
        let mut synth = Synthesizer::new();
        let ok = synth.synthesize("Maps", &HashMap::<String, Meta>::shape()).unwrap();
        assert_eq!(
            ok,
            SchemaRef::inline(SchemaNode::Map(SchemaRef::Named("MapsMeta".into())))
        );

        let err = synth.synthesize("Maps", &BTreeMap::<u32, String>::shape()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedKeyType {
                key: "integer".into(),
                value: "string".into()
            }
        );
    }

    #[test]
    fn test_unsupported_and_anonymous() {
        let mut synth = Synthesizer::new();
        let err = synth
            .synthesize("Hello", &std::sync::mpsc::Receiver::<u8>::shape())
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedShape { ref kind, .. } if kind == "channel"));

        let anonymous = Shape::object::<()>("", Vec::new);
        let err = synth.synthesize("Hello", &anonymous).unwrap_err();
        assert!(matches!(err, SchemaError::AnonymousShape { .. }));
    }

    #[test]
    fn test_embedded_fields_are_promoted() {
        let mut synth = Synthesizer::new();
        synth.synthesize("Svc", &WithMeta::shape()).unwrap();

        let object = object_schema(&synth, "SvcWithMeta");
        let names: Vec<_> = object.properties.keys().cloned().collect();
        assert_eq!(names, vec!["body", "traceId", "ts"]);
        assert_eq!(object.required, vec!["traceId".to_string()]);
        assert!(synth.table().get("SvcMeta").is_none());
    }

    #[test]
    fn test_nested_embedding_rejected() {
        let mut synth = Synthesizer::new();
        let err = synth.synthesize("Svc", &Outer::shape()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NestedEmbedding {
                parent: "Outer".into(),
                embedded: "WithMeta".into()
            }
        );
    }

    #[test]
    fn test_embedded_scalar_stays_regular_field() {
        let mut synth = Synthesizer::new();
        synth.synthesize("Svc", &EmbedsScalar::shape()).unwrap();
        let object = object_schema(&synth, "SvcEmbedsScalar");
        assert!(object.properties.contains_key("label"));
    }

    proptest! {
        #[test]
        fn prop_synthesis_is_idempotent(namespace in "[A-Z][a-z]{0,8}", repeats in 1usize..5) {
            let mut synth = Synthesizer::new();
            let first = synth.synthesize(&namespace, &TreeNode::shape()).unwrap();
            let snapshot = synth.table().clone();
            for _ in 0..repeats {
                let again = synth.synthesize(&namespace, &TreeNode::shape()).unwrap();
                prop_assert_eq!(&again, &first);
            }
            prop_assert_eq!(synth.table().len(), snapshot.len());
            prop_assert_eq!(
                synth.table().get(first.name().unwrap()),
                snapshot.get(first.name().unwrap())
            );
        }

        #[test]
        fn prop_distinct_namespaces_never_collide(a in "[A-Z][a-z]{1,6}", b in "[A-Z][a-z]{1,6}") {
            prop_assume!(!a.starts_with(&b) && !b.starts_with(&a));
            let mut synth = Synthesizer::new();
            let first = synth.synthesize(&a, &HelloRequest::shape()).unwrap();
            let second = synth.synthesize(&b, &other::HelloRequest::shape()).unwrap();
            prop_assert_ne!(&first, &second);
            let first = synth.table().get(first.name().unwrap());
            let second = synth.table().get(second.name().unwrap());
            prop_assert!(first.is_some() && second.is_some());
            prop_assert_ne!(first, second);
        }
    }
}
