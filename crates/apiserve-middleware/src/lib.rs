//! apiserve Middleware
//!
//! Ready-made interceptors for an apiserve [`Server`](apiserve_server::Server):
//!
//! - [`Recover`]: converts panics in the chain into 500 responses
//! - [`Validator`]: rejects unary requests missing `required` fields
//!
//! # Examples
//!
//! ```no_run
//! use apiserve_middleware::{Recover, Validator};
//! use apiserve_server::{ServeConfig, Server};
//!
//! let server = Server::new(ServeConfig::default())
//!     .with(Recover)
//!     .with(Validator);
//! ```

#![warn(missing_docs)]

mod recover;
mod validator;

pub use recover::Recover;
pub use validator::{validate, Validator, Violation, REQUIRED};
