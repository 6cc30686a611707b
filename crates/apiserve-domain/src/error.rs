//! Schema synthesis errors
//!
//! Every variant is a configuration error: it is raised while services are
//! being registered and must abort startup.

use thiserror::Error;

/// Errors raised while turning shapes into schemas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Map key is not a string
    #[error("map key type for {value} should be string instead of {key}")]
    UnsupportedKeyType {
        /// Kind of the offending key shape
        key: String,
        /// Kind of the map's value shape
        value: String,
    },

    /// Shape kind that has no schema representation (channels, callbacks)
    #[error("unsupported type {kind} in namespace {namespace:?}")]
    UnsupportedShape {
        /// Unsupported kind name
        kind: String,
        /// Namespace being synthesized
        namespace: String,
    },

    /// Same qualified name claimed by two different types
    #[error("{name} is defined in multiple namespaces: {first} {second}")]
    NamespaceCollision {
        /// Qualified schema name
        name: String,
        /// Origin registered first
        first: String,
        /// Origin that collided with it
        second: String,
    },

    /// Object shape declared without a name
    #[error("anonymous object shape is unsupported in namespace {namespace:?}")]
    AnonymousShape {
        /// Namespace being synthesized
        namespace: String,
    },

    /// Embedded object that itself embeds another object
    #[error("embedded shape {embedded} in {parent} embeds another shape; only one level of embedding is supported")]
    NestedEmbedding {
        /// Object declaring the embedding
        parent: String,
        /// Embedded object
        embedded: String,
    },
}
