//! Interceptor chain
//!
//! Interceptors wrap every method call. The first one registered is the
//! outermost: it sees the call first and the outcome last. Each interceptor
//! decides whether to continue through [`Next::run`], and may inspect or
//! replace the call values on the way in and out.

use crate::context::CallContext;
use crate::descriptor::{CallValues, Invoke};
use apiserve_domain::ApiError;
use async_trait::async_trait;
use axum::http::{request::Parts, HeaderMap, Method, Uri};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Raw transport-level view of the request
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
}

impl From<&Parts> for RequestParts {
    fn from(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }
}

/// Middleware around method calls
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    /// Handle one call; call `next.run(ctx, values)` to continue the chain
    async fn intercept(
        &self,
        ctx: &CallContext,
        parts: &RequestParts,
        values: &mut CallValues,
        next: Next<'_>,
    ) -> Result<(), ApiError>;
}

/// Remainder of the chain, ending at the method implementation
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    endpoint: &'a dyn Invoke,
    parts: &'a RequestParts,
}

impl<'a> Next<'a> {
    /// Chain running `chain` in order before `endpoint`
    pub fn new(chain: &'a [Arc<dyn Interceptor>], endpoint: &'a dyn Invoke, parts: &'a RequestParts) -> Self {
        Self {
            chain,
            endpoint,
            parts,
        }
    }

    /// Run the rest of the chain
    pub async fn run(self, ctx: &CallContext, values: &mut CallValues) -> Result<(), ApiError> {
        match self.chain.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    chain: rest,
                    endpoint: self.endpoint,
                    parts: self.parts,
                };
                first.intercept(ctx, self.parts, values, next).await
            }
            None => self.endpoint.invoke(ctx, values).await,
        }
    }
}

/// Interceptor built from a closure returning a boxed future
pub struct InterceptorFn<F> {
    f: F,
}

/// Wrap a closure as an [`Interceptor`]
///
/// ```ignore
/// let timing = interceptor_fn(|ctx, _parts, values, next| {
///     Box::pin(async move {
///         let outcome = next.run(ctx, values).await;
///         tracing::debug!("{} took {:?}", ctx.path(), ctx.elapsed());
///         outcome
///     })
/// });
/// ```
pub fn interceptor_fn<F>(f: F) -> InterceptorFn<F>
where
    F: for<'a> Fn(
            &'a CallContext,
            &'a RequestParts,
            &'a mut CallValues,
            Next<'a>,
        ) -> BoxFuture<'a, Result<(), ApiError>>
        + Send
        + Sync
        + 'static,
{
    InterceptorFn { f }
}

#[async_trait]
impl<F> Interceptor for InterceptorFn<F>
where
    F: for<'a> Fn(
            &'a CallContext,
            &'a RequestParts,
            &'a mut CallValues,
            Next<'a>,
        ) -> BoxFuture<'a, Result<(), ApiError>>
        + Send
        + Sync
        + 'static,
{
    async fn intercept(
        &self,
        ctx: &CallContext,
        parts: &RequestParts,
        values: &mut CallValues,
        next: Next<'_>,
    ) -> Result<(), ApiError> {
        (self.f)(ctx, parts, values, next).await
    }
}
