//! Per-call context handed to interceptors and implementations

use crate::descriptor::{CallKind, MethodDescriptor};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity and lifetime of one call.
///
/// Cheap to clone. The cancellation token fires once the dispatcher has
/// finished the call, so background work spawned by an implementation can
/// stop with it.
#[derive(Debug, Clone)]
pub struct CallContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    request_id: Uuid,
    service: String,
    method: String,
    path: String,
    kind: CallKind,
    token: CancellationToken,
    started: Instant,
}

impl CallContext {
    /// Create a context for a call of `service.method` on `path`
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        kind: CallKind,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                request_id: Uuid::now_v7(),
                service: service.into(),
                method: method.into(),
                path: path.into(),
                kind,
                token: CancellationToken::new(),
                started: Instant::now(),
            }),
        }
    }

    pub(crate) fn for_method(descriptor: &MethodDescriptor) -> Self {
        Self::new(
            descriptor.service.name.clone(),
            descriptor.method.clone(),
            descriptor.path.clone(),
            descriptor.kind,
        )
    }

    /// Unique, time-ordered id of this call
    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    /// Service name
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Method name
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Request path
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Unary or stream
    pub fn kind(&self) -> CallKind {
        self.inner.kind
    }

    /// Time since the call was accepted
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Whether the call has completed
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolves once the call has completed
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Child token cancelled together with the call
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    pub(crate) fn complete(&self) {
        self.inner.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_cancels_children() {
        let ctx = CallContext::new("Hello", "SayHello", "/api/Hello/SayHello", CallKind::Unary);
        let child = ctx.cancellation_token();
        assert!(!ctx.is_cancelled());

        ctx.complete();
        child.cancelled().await;
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = CallContext::new("S", "M", "/S/M", CallKind::Unary);
        let b = a.clone();
        let c = CallContext::new("S", "M", "/S/M", CallKind::Unary);
        assert_eq!(a.request_id(), b.request_id());
        assert_ne!(a.request_id(), c.request_id());
        assert_eq!(a.method(), "M");
    }
}
