//! Service declaration
//!
//! A service is a plain struct whose methods are listed in
//! [`Service::methods`]:
//!
//! ```ignore
//! impl Service for Hello {
//!     fn methods(methods: &mut MethodSet<Self>) {
//!         methods
//!             .unary("SayHello", Self::say_hello)
//!             .stream("StreamHello", Self::stream_hello);
//!     }
//! }
//! ```

use crate::context::CallContext;
use crate::descriptor::{BoundMethod, Payload, Signature};
use crate::stream::{RecvStream, SendStream, StreamError};
use apiserve_domain::ApiError;
use std::future::Future;
use std::sync::Arc;

/// A group of methods served under one name
pub trait Service: Send + Sync + Sized + 'static {
    /// Service name used in paths, schema namespaces and documentation tags.
    /// Defaults to the type name without its module path.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Declare the service's methods
    fn methods(methods: &mut MethodSet<Self>);
}

/// One declared method, not yet validated
pub struct MethodEntry {
    /// Method name
    pub name: String,
    /// Declared signature
    pub signature: Signature,
    /// Factory and invoker
    pub bound: BoundMethod,
}

/// Collects the methods of one service instance
pub struct MethodSet<S> {
    service: Arc<S>,
    entries: Vec<MethodEntry>,
}

impl<S: Service> MethodSet<S> {
    pub(crate) fn new(service: Arc<S>) -> Self {
        Self {
            service,
            entries: Vec::new(),
        }
    }

    /// Declare a unary method
    pub fn unary<Req, Rsp, F, Fut>(&mut self, name: &str, handler: F) -> &mut Self
    where
        Req: Payload,
        Rsp: Payload,
        F: Fn(Arc<S>, CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Rsp, ApiError>> + Send + 'static,
    {
        let bound = BoundMethod::unary(self.service.clone(), handler);
        self.declare(name, Signature::unary::<Req, Rsp>(), bound)
    }

    /// Declare a streaming method; its name must start with `Stream`
    pub fn stream<F, Fut>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<S>, CallContext, RecvStream, SendStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        let bound = BoundMethod::stream(self.service.clone(), handler);
        self.declare(name, Signature::stream(), bound)
    }

    /// Declare a method from a hand-written signature
    pub fn declare(&mut self, name: &str, signature: Signature, bound: BoundMethod) -> &mut Self {
        self.entries.push(MethodEntry {
            name: name.to_string(),
            signature,
            bound,
        });
        self
    }

    /// The service instance methods are bound to
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub(crate) fn into_entries(self) -> Vec<MethodEntry> {
        self.entries
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
