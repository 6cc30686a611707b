//! Request dispatcher
//!
//! Every request goes through the same steps: documentation pages first,
//! then raw passthrough paths, then method resolution. A method call
//! allocates its values, decodes the body (unary) or binds the websocket
//! (stream), runs the interceptor chain down to the implementation, and
//! completes with an encoded response or a close frame.

use crate::context::CallContext;
use crate::descriptor::{CallKind, CallValues, MethodDescriptor};
use crate::docs;
use crate::interceptor::{Interceptor, Next, RequestParts};
use crate::registry::{FrozenRegistry, Route};
use crate::ws::{WsSink, WsSource};
use apiserve_domain::ApiError;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next as MiddlewareNext};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Largest accepted unary request body
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

const ALLOW_HEADERS: &str = "authorization, origin, content-type, accept";
const ALLOW_METHODS: &str = "GET,POST,OPTIONS,DELETE,PUT";
const JSON: &str = "application/json";
const HTML: &str = "text/html; charset=utf-8";

struct DispatchState {
    registry: FrozenRegistry,
    interceptors: Vec<Arc<dyn Interceptor>>,
    api_json_path: String,
    redoc_path: String,
    swagger_html: Bytes,
    redoc_html: Bytes,
    cross_domain: bool,
}

/// Routes requests to frozen methods through the interceptor chain
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<DispatchState>,
}

impl Dispatcher {
    /// Create a dispatcher over a frozen registry
    pub fn new(registry: FrozenRegistry, interceptors: Vec<Arc<dyn Interceptor>>, cross_domain: bool) -> Self {
        let prefix = registry.prefix().to_string();
        Self {
            state: Arc::new(DispatchState {
                api_json_path: docs::api_json_path(&prefix),
                redoc_path: docs::redoc_path(&prefix),
                swagger_html: Bytes::from(docs::swagger_page(&prefix)),
                redoc_html: Bytes::from(docs::redoc_page(&prefix)),
                registry,
                interceptors,
                cross_domain,
            }),
        }
    }

    /// axum router sending every request through [`Dispatcher::dispatch`]
    pub fn router(self) -> Router {
        let cross_domain = self.state.cross_domain;
        let mut router = Router::new()
            .fallback(handle)
            .with_state(self)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));
        if cross_domain {
            router = router.layer(middleware::from_fn(cross_origin));
        }
        router.layer(middleware::from_fn(log_request))
    }

    /// Serve one request
    pub async fn dispatch(&self, request: Request) -> Response {
        let path = request.uri().path().to_string();

        if request.method() == Method::GET {
            if let Some(page) = self.meta_page(&path) {
                return page;
            }
        }

        let route = match self.state.registry.resolve(&path) {
            Some(route) => route.clone(),
            None => {
                return error_response(ApiError::not_found(format!(
                    "Request {} {} not found",
                    request.method(),
                    path
                )))
            }
        };

        match route {
            Route::Raw(handler) => handler(request).await,
            Route::Method(descriptor) => match descriptor.kind {
                CallKind::Unary if request.method() != Method::POST => {
                    let mut response = error_response(ApiError::new(
                        405,
                        format!("Request {} {} not allowed, use POST", request.method(), path),
                    ));
                    response
                        .headers_mut()
                        .insert(header::ALLOW, HeaderValue::from_static("POST"));
                    response
                }
                CallKind::Unary => self.call_unary(descriptor, request).await,
                CallKind::Stream => self.call_stream(descriptor, request).await,
            },
        }
    }

    fn meta_page(&self, path: &str) -> Option<Response> {
        let state = &self.state;
        if path == state.api_json_path {
            Some(body_response(StatusCode::OK, JSON, state.registry.api_json()))
        } else if path == state.registry.prefix() {
            Some(body_response(StatusCode::OK, HTML, state.swagger_html.clone()))
        } else if path == state.redoc_path {
            Some(body_response(StatusCode::OK, HTML, state.redoc_html.clone()))
        } else {
            None
        }
    }

    async fn call_unary(&self, descriptor: Arc<MethodDescriptor>, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let request_parts = RequestParts::from(&parts);
        // Oversize bodies are rejected with 413, anything else unreadable with 400
        let body = match Bytes::from_request(Request::from_parts(parts, body), &()).await {
            Ok(body) => body,
            Err(rejection) => {
                return error_response(ApiError::new(
                    i32::from(rejection.status().as_u16()),
                    format!("Read request body failed: {}", rejection.body_text()),
                ))
            }
        };

        let mut values = (descriptor.factory)();
        if !body.is_empty() {
            if let Some(request) = values.request_mut() {
                if let Err(err) = request.decode_from(&body) {
                    return error_response(ApiError::bad_request(format!(
                        "Decode request body failed: {}",
                        err
                    )));
                }
            }
        }

        let ctx = CallContext::for_method(&descriptor);
        let outcome = self.run_chain(&ctx, &request_parts, &descriptor, &mut values).await;
        ctx.complete();

        if let Err(err) = outcome {
            return error_response(err);
        }
        let encoded = match values.response() {
            Some(response) => response.encode(),
            None => return error_response(ApiError::internal("unary call produced no response")),
        };
        match encoded {
            Ok(body) => body_response(StatusCode::OK, JSON, body),
            Err(err) => error_response(ApiError::internal(format!("marshal rsp error: {}", err))),
        }
    }

    async fn call_stream(&self, descriptor: Arc<MethodDescriptor>, request: Request) -> Response {
        let (mut parts, _body) = request.into_parts();
        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                warn!("Upgrade websocket error on {}: {}", descriptor.path, rejection);
                return rejection.into_response();
            }
        };

        let path = descriptor.path.clone();
        let parts = RequestParts::from(&parts);
        let dispatcher = self.clone();
        upgrade
            .on_failed_upgrade(move |err: axum::Error| warn!("Upgrade websocket error on {}: {}", path, err))
            .on_upgrade(move |socket| async move {
                dispatcher.serve_stream(descriptor, parts, socket).await;
            })
    }

    async fn serve_stream(&self, descriptor: Arc<MethodDescriptor>, parts: RequestParts, socket: WebSocket) {
        let (sink, source) = socket.split();
        let mut values = (descriptor.factory)();
        if let Some(session) = values.session_mut() {
            session.bind(WsSource::new(source), WsSink::new(sink));
        }

        let ctx = CallContext::for_method(&descriptor);
        debug!("Stream {} opened ({})", ctx.path(), ctx.request_id());
        let outcome = self.run_chain(&ctx, &parts, &descriptor, &mut values).await;
        ctx.complete();

        if let Err(err) = &outcome {
            warn!("Stream {} failed: {}", ctx.path(), err);
        }
        if let Some(session) = values.session() {
            if let Err(err) = session.finish(&outcome).await {
                debug!("Closing stream {} failed: {}", ctx.path(), err);
            }
        }
        debug!("Stream {} closed after {:?}", ctx.path(), ctx.elapsed());
    }

    async fn run_chain(
        &self,
        ctx: &CallContext,
        parts: &RequestParts,
        descriptor: &MethodDescriptor,
        values: &mut CallValues,
    ) -> Result<(), ApiError> {
        Next::new(&self.state.interceptors, descriptor.invoker.as_ref(), parts)
            .run(ctx, values)
            .await
    }
}

async fn handle(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}

/// Encode an [`ApiError`] as a JSON response whose status follows the code
pub fn error_response(err: ApiError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match serde_json::to_vec(&err) {
        Ok(body) => body_response(status, JSON, body),
        Err(_) => status.into_response(),
    }
}

fn body_response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let body: Bytes = body.into();
    (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

/// Cross-origin headers on every response; preflights end here
async fn cross_origin(request: Request, next: MiddlewareNext) -> Response {
    let origin = request
        .headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(referer_origin)
        .unwrap_or_else(|| "*".to_string());

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    if let Ok(origin) = HeaderValue::from_str(&origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    response
}

fn referer_origin(referer: &str) -> Option<String> {
    let uri: Uri = referer.parse().ok()?;
    Some(format!("{}://{}", uri.scheme_str()?, uri.authority()?))
}

/// Request logging middleware
async fn log_request(request: Request, next: MiddlewareNext) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        warn!("{} {} {} ({:?})", method, uri, status.as_u16(), duration);
    } else {
        info!("{} {} {} ({:?})", method, uri, status.as_u16(), duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referer_origin() {
        assert_eq!(
            referer_origin("https://app.example.com:8443/page?x=1").as_deref(),
            Some("https://app.example.com:8443")
        );
        assert_eq!(referer_origin("not a url"), None);
        assert_eq!(referer_origin("/relative/path"), None);
    }

    #[test]
    fn test_error_response_status() {
        assert_eq!(error_response(ApiError::not_found("x")).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            error_response(ApiError::new(42, "x")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let response = error_response(ApiError::new(418, "teapot"));
        assert_eq!(response.status().as_u16(), 418);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON);
    }
}
