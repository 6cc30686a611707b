//! apiserve Server
//!
//! Turns plain service methods into network-reachable endpoints. Unary
//! methods are served as `POST {prefix}{Service}/{Method}` with JSON bodies;
//! methods named `Stream*` are served as websocket streams on the same path.
//! The schema document for every registered method is served at
//! `{prefix}api.json`, with Swagger UI at `{prefix}` and ReDoc at
//! `{prefix}doc`.
//!
//! ## Lifecycle
//!
//! ```ignore
//! let mut server = Server::new(ServeConfig::from_env()?).with(Recover).with(Validator);
//! server.register(Hello)?;
//! server.serve().await?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod descriptor;
pub mod dispatch;
pub mod docs;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod service;
pub mod stream;
pub mod ws;

pub use apiserve_domain::{ApiError, Field, Shape, Shaped};
pub use config::ServeConfig;
pub use context::CallContext;
pub use descriptor::{CallKind, CallValues, Message, Payload};
pub use dispatch::{error_response, Dispatcher};
pub use error::ConfigError;
pub use interceptor::{interceptor_fn, Interceptor, Next, RequestParts};
pub use service::{MethodSet, Service};
pub use stream::{RecvStream, SendStream, StreamError};

use axum::handler::Handler;
use axum::Router;
use registry::ServiceRegistry;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Assembles services and interceptors, then serves them
pub struct Server {
    config: ServeConfig,
    registry: ServiceRegistry,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Server {
    /// Create a server with no services
    pub fn new(mut config: ServeConfig) -> Self {
        config.home_path = config::normalize_home_path(&config.home_path);
        let registry = ServiceRegistry::new(config.home_path.clone());
        Self {
            config,
            registry,
            interceptors: Vec::new(),
        }
    }

    /// Server configuration
    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Append an interceptor; the first one added is the outermost
    pub fn with<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Register every method of `service`
    pub fn register<S: Service>(&mut self, service: S) -> Result<&mut Self, ServerError> {
        self.register_shared(Arc::new(service))
    }

    /// Register every method of a shared service instance
    pub fn register_shared<S: Service>(&mut self, service: Arc<S>) -> Result<&mut Self, ServerError> {
        self.registry.register(service)?;
        Ok(self)
    }

    /// Serve an axum handler unchanged on `path`
    pub fn register_raw<H, T>(&mut self, path: &str, handler: H) -> Result<&mut Self, ServerError>
    where
        H: Handler<T, ()> + Sync,
        T: 'static,
    {
        self.registry.register_raw(path, handler)?;
        Ok(self)
    }

    /// Freeze registration and build the axum router
    pub fn into_router(self) -> Result<Router, ServerError> {
        let cross_domain = self.config.cross_domain;
        let frozen = self.registry.freeze()?;
        Ok(Dispatcher::new(frozen, self.interceptors, cross_domain).router())
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until Ctrl-C
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `signal` resolves
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let home_path = self.config.home_path.clone();
        let app = self.into_router()?;

        info!("Listening on {}", addr);
        info!("Serving API on {}", config::doc_url(&addr.to_string(), &home_path));

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_server_builds_router() {
        let server = Server::new(ServeConfig::default());
        assert_eq!(server.config().home_path, "/api/");
        assert!(server.into_router().is_ok());
    }

    #[test]
    fn test_home_path_normalized_on_construction() {
        let config = ServeConfig {
            home_path: "rpc".to_string(),
            ..ServeConfig::default()
        };
        assert_eq!(Server::new(config).config().home_path, "/rpc/");
    }
}
