//! Service registry
//!
//! Owns the path -> route table while services are being registered, feeds
//! method shapes to the schema synthesizer, and freezes into an immutable
//! [`FrozenRegistry`] before serving.

use crate::descriptor::{CallKind, MethodDescriptor, ServiceDescriptor};
use crate::error::ConfigError;
use crate::service::{MethodSet, Service};
use apiserve_domain::{ApiDocument, ApiError, Shaped, Synthesizer};
use axum::body::Body;
use axum::handler::Handler;
use axum::http::Request;
use axum::response::Response;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Passthrough handler serving a raw path
pub type RawHandler = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

/// Target of a routed path
#[derive(Clone)]
pub enum Route {
    /// Registered service method
    Method(Arc<MethodDescriptor>),
    /// Raw passthrough handler
    Raw(RawHandler),
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Method(descriptor) => f.debug_tuple("Method").field(descriptor).finish(),
            Route::Raw(_) => f.write_str("Raw"),
        }
    }
}

/// Mutable registry used while the server is being assembled
pub struct ServiceRegistry {
    prefix: String,
    routes: HashMap<String, Route>,
    synthesizer: Synthesizer,
    document: ApiDocument,
}

impl ServiceRegistry {
    /// Create a new empty registry serving methods under `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            routes: HashMap::new(),
            synthesizer: Synthesizer::new(),
            document: ApiDocument::new(),
        }
    }

    /// Path prefix of every method
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of routed paths
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register every method of a service.
    ///
    /// Signatures, paths and schemas of all methods are checked before any
    /// of them is routed; on error the registry is left unchanged. Returns
    /// the registered paths.
    pub fn register<S: Service>(&mut self, service: Arc<S>) -> Result<Vec<String>, ConfigError> {
        let descriptor = Arc::new(ServiceDescriptor::new(service.name()));
        let mut set = MethodSet::new(service);
        S::methods(&mut set);

        let mut methods = Vec::new();
        for entry in set.into_entries() {
            let method = MethodDescriptor::build(
                descriptor.clone(),
                &entry.name,
                &self.prefix,
                entry.signature,
                entry.bound,
            )?;
            if self.routes.contains_key(&method.path)
                || methods.iter().any(|m: &MethodDescriptor| m.path == method.path)
            {
                return Err(ConfigError::DuplicatePath { path: method.path });
            }
            methods.push(method);
        }

        let mut synthesizer = self.synthesizer.clone();
        let mut document = self.document.clone();
        for method in &methods {
            document_method(&mut synthesizer, &mut document, method)?;
        }
        self.synthesizer = synthesizer;
        self.document = document;

        let mut paths = Vec::with_capacity(methods.len());
        for method in methods {
            debug!("Registered {:?} method {}", method.kind, method.path);
            paths.push(method.path.clone());
            self.routes
                .insert(method.path.clone(), Route::Method(Arc::new(method)));
        }
        Ok(paths)
    }

    /// Serve `handler` unchanged on `path`; a missing leading `/` is added
    pub fn register_raw<H, T>(&mut self, path: &str, handler: H) -> Result<String, ConfigError>
    where
        H: Handler<T, ()> + Sync,
        T: 'static,
    {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        if self.routes.contains_key(&path) {
            return Err(ConfigError::DuplicatePath { path });
        }

        let raw: RawHandler = Arc::new(move |request: Request<Body>| -> BoxFuture<'static, Response> {
            let handler = handler.clone();
            Box::pin(async move { handler.call(request, ()).await })
        });
        debug!("Registered raw handler {}", path);
        self.routes.insert(path.clone(), Route::Raw(raw));
        Ok(path)
    }

    /// Finish registration: add the error schema and render the API document
    pub fn freeze(mut self) -> Result<FrozenRegistry, ConfigError> {
        self.synthesizer.synthesize("", &ApiError::shape())?;
        self.document.set_schemas(self.synthesizer.into_table());
        let api_json = self.document.to_pretty_json()?;

        Ok(FrozenRegistry {
            prefix: self.prefix,
            routes: self.routes,
            api_json: Bytes::from(api_json),
        })
    }
}

fn document_method(
    synthesizer: &mut Synthesizer,
    document: &mut ApiDocument,
    method: &MethodDescriptor,
) -> Result<(), ConfigError> {
    let namespace = method.service.name.as_str();
    match (method.kind, &method.request, &method.response) {
        (CallKind::Unary, Some(request), Some(response)) => {
            let request = synthesizer.synthesize(namespace, request)?;
            let response = synthesizer.synthesize(namespace, response)?;
            document.add_unary(&method.path, namespace, &method.method, request, response);
        }
        _ => document.add_stream(&method.path, namespace, &method.method),
    }
    Ok(())
}

/// Read-only route table shared by every request
#[derive(Debug)]
pub struct FrozenRegistry {
    prefix: String,
    routes: HashMap<String, Route>,
    api_json: Bytes,
}

impl FrozenRegistry {
    /// Route for a path
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Path prefix of every method
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Pretty-printed API document
    pub fn api_json(&self) -> Bytes {
        self.api_json.clone()
    }

    /// Routed paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}
