//! apiserve Domain Layer
//!
//! This crate contains the structural model shared by every other apiserve
//! crate. It performs no I/O and knows nothing about HTTP; it only describes
//! data and turns those descriptions into schema documents.
//!
//! ## Key Concepts
//!
//! - **Shape**: the wire-level structure of a request or response type,
//!   declared through the [`Shaped`] trait
//! - **SchemaNode**: the synthesized schema for one shape
//! - **SchemaTable**: named object schemas, one physical shape per name
//! - **Synthesizer**: walks shapes into the schema table, namespacing object
//!   names per service
//! - **ApiDocument**: the OpenAPI description served alongside the endpoints
//! - **ApiError**: the structured `code` + `message` error carried to callers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod ecode;
pub mod error;
pub mod schema;
pub mod shape;
pub mod synthesizer;

// Re-exports for convenience
pub use document::ApiDocument;
pub use ecode::ApiError;
pub use error::SchemaError;
pub use schema::{FieldSchema, ObjectSchema, SchemaNode, SchemaRef, SchemaTable};
pub use shape::{Field, ObjectShape, Primitive, Shape, Shaped};
pub use synthesizer::Synthesizer;
