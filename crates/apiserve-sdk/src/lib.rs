//! apiserve Rust SDK
//!
//! Client library for calling unary methods of an apiserve server.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), apiserve_sdk::ClientError> {
//! use apiserve_sdk::Client;
//! use serde_json::{json, Value};
//!
//! let client = Client::new("http://localhost:8081");
//! let reply: Value = client
//!     .call("/api/Hello/SayHello", &json!({ "name": "alice" }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod client;
mod error;

pub use apiserve_domain::ApiError;
pub use client::Client;
pub use error::ClientError;
