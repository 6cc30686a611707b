//! Panic recovery

use apiserve_domain::ApiError;
use apiserve_server::{CallContext, CallValues, Interceptor, Next, RequestParts};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Turns a panic anywhere further down the chain into a 500 response.
///
/// Register it first so it wraps every other interceptor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recover;

#[async_trait]
impl Interceptor for Recover {
    async fn intercept(
        &self,
        ctx: &CallContext,
        _parts: &RequestParts,
        values: &mut CallValues,
        next: Next<'_>,
    ) -> Result<(), ApiError> {
        match AssertUnwindSafe(next.run(ctx, values)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %ctx.request_id(),
                    "panic in {}: {}",
                    ctx.path(),
                    message
                );
                Err(ApiError::internal(format!("panic: {}", message)))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
