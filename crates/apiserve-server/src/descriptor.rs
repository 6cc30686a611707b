//! Method descriptors
//!
//! A method is declared as a [`Signature`] (what it takes and returns) plus a
//! [`BoundMethod`] (how to allocate its values and how to call it).
//! [`MethodDescriptor::build`] checks the signature against the calling
//! convention and produces the immutable descriptor the registry routes to.
//!
//! The convention is three parameters, the first being the call context, and
//! a single status outcome. Methods whose name starts with [`STREAM_PREFIX`]
//! take a receive half and a send half; every other method takes a request
//! object and a response object.

use crate::context::CallContext;
use crate::error::ConfigError;
use crate::stream::{RecvStream, SendStream, StreamError, StreamSession};
use apiserve_domain::synthesizer::flatten_fields;
use apiserve_domain::{ApiError, Shape, Shaped};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Method-name prefix reserved for streaming methods
pub const STREAM_PREFIX: &str = "Stream";

/// How a method is called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// One request, one response
    Unary,
    /// Long-lived duplex stream
    Stream,
}

/// Declared parameter
#[derive(Debug, Clone)]
pub enum Param {
    /// Call context
    Context,
    /// Value of a described shape
    Value(Shape),
    /// Receive half of a stream
    Receive,
    /// Send half of a stream
    Send,
}

/// Declared outcome
#[derive(Debug, Clone)]
pub enum OutcomeKind {
    /// Success or error status
    Status,
    /// Value of a described shape
    Value(Shape),
}

/// Declared shape of a method
#[derive(Debug, Clone)]
pub struct Signature {
    /// Parameters in order
    pub params: Vec<Param>,
    /// Outcomes in order
    pub outcomes: Vec<OutcomeKind>,
}

impl Signature {
    /// `(Context, Req, Rsp) -> Status`
    pub fn unary<Req: Shaped, Rsp: Shaped>() -> Self {
        Self {
            params: vec![
                Param::Context,
                Param::Value(Req::shape()),
                Param::Value(Rsp::shape()),
            ],
            outcomes: vec![OutcomeKind::Status],
        }
    }

    /// `(Context, Receive, Send) -> Status`
    pub fn stream() -> Self {
        Self {
            params: vec![Param::Context, Param::Receive, Param::Send],
            outcomes: vec![OutcomeKind::Status],
        }
    }
}

/// Request and response payload types.
///
/// Payloads decode over their `Default` value, so types should carry
/// `#[serde(default)]` to leave absent fields zero-valued.
pub trait Payload: Shaped + Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

impl<T> Payload for T where T: Shaped + Serialize + DeserializeOwned + Default + Send + Sync + 'static {}

/// Type-erased payload value
pub trait Message: Send + Sync + 'static {
    /// Replace the value with one decoded from a JSON body
    fn decode_from(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;

    /// Encode as a JSON body
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error>;

    /// Encode as a JSON value
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Shape of the concrete type
    fn describe(&self) -> Shape;

    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Payload> Message for T {
    fn decode_from(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn describe(&self) -> Shape {
        <T as Shaped>::shape()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Message {
    /// Borrow as the concrete type
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutably borrow as the concrete type
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// Values allocated for one call
pub enum CallValues {
    /// Request and response of a unary call
    Unary {
        /// Decoded request
        request: Box<dyn Message>,
        /// Response filled in by the implementation
        response: Box<dyn Message>,
    },
    /// One session serving as both request and response of a stream call
    Stream(StreamSession),
}

impl CallValues {
    /// Request of a unary call
    pub fn request(&self) -> Option<&dyn Message> {
        match self {
            CallValues::Unary { request, .. } => Some(&**request),
            CallValues::Stream(_) => None,
        }
    }

    /// Mutable request of a unary call
    pub fn request_mut(&mut self) -> Option<&mut dyn Message> {
        match self {
            CallValues::Unary { request, .. } => Some(&mut **request),
            CallValues::Stream(_) => None,
        }
    }

    /// Response of a unary call
    pub fn response(&self) -> Option<&dyn Message> {
        match self {
            CallValues::Unary { response, .. } => Some(&**response),
            CallValues::Stream(_) => None,
        }
    }

    /// Session of a stream call
    pub fn session(&self) -> Option<&StreamSession> {
        match self {
            CallValues::Stream(session) => Some(session),
            CallValues::Unary { .. } => None,
        }
    }

    /// Mutable session of a stream call
    pub fn session_mut(&mut self) -> Option<&mut StreamSession> {
        match self {
            CallValues::Stream(session) => Some(session),
            CallValues::Unary { .. } => None,
        }
    }
}

/// Calls the implementation with a call's values
pub trait Invoke: Send + Sync {
    /// Run the implementation
    fn invoke<'a>(
        &'a self,
        ctx: &'a CallContext,
        values: &'a mut CallValues,
    ) -> BoxFuture<'a, Result<(), ApiError>>;
}

/// Allocates fresh values per call
pub type Factory = Arc<dyn Fn() -> CallValues + Send + Sync>;

/// Runtime half of a method declaration
#[derive(Clone)]
pub struct BoundMethod {
    /// Allocates values per call
    pub factory: Factory,
    /// Calls the implementation
    pub invoker: Arc<dyn Invoke>,
}

impl BoundMethod {
    /// Bind a unary implementation on a service instance
    pub fn unary<S, Req, Rsp, F, Fut>(service: Arc<S>, handler: F) -> Self
    where
        S: Send + Sync + 'static,
        Req: Payload,
        Rsp: Payload,
        F: Fn(Arc<S>, CallContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Rsp, ApiError>> + Send + 'static,
    {
        Self {
            factory: Arc::new(|| CallValues::Unary {
                request: Box::new(Req::default()),
                response: Box::new(Rsp::default()),
            }),
            invoker: Arc::new(UnaryHandler {
                service,
                handler,
                _types: PhantomData,
            }),
        }
    }

    /// Bind a streaming implementation on a service instance
    pub fn stream<S, F, Fut>(service: Arc<S>, handler: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(Arc<S>, CallContext, RecvStream, SendStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
    {
        Self {
            factory: Arc::new(|| CallValues::Stream(StreamSession::new())),
            invoker: Arc::new(StreamHandler { service, handler }),
        }
    }
}

struct UnaryHandler<S, Req, Rsp, F> {
    service: Arc<S>,
    handler: F,
    _types: PhantomData<fn(Req) -> Rsp>,
}

impl<S, Req, Rsp, F, Fut> Invoke for UnaryHandler<S, Req, Rsp, F>
where
    S: Send + Sync + 'static,
    Req: Payload,
    Rsp: Payload,
    F: Fn(Arc<S>, CallContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Rsp, ApiError>> + Send + 'static,
{
    fn invoke<'a>(
        &'a self,
        ctx: &'a CallContext,
        values: &'a mut CallValues,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let CallValues::Unary { request, response } = values else {
                return Err(ApiError::internal("unary method called with stream values"));
            };
            let request = request
                .downcast_mut::<Req>()
                .map(std::mem::take)
                .ok_or_else(|| ApiError::internal("request value has an unexpected type"))?;
            let reply = (self.handler)(self.service.clone(), ctx.clone(), request).await?;
            *response = Box::new(reply);
            Ok(())
        })
    }
}

struct StreamHandler<S, F> {
    service: Arc<S>,
    handler: F,
}

impl<S, F, Fut> Invoke for StreamHandler<S, F>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, CallContext, RecvStream, SendStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StreamError>> + Send + 'static,
{
    fn invoke<'a>(
        &'a self,
        ctx: &'a CallContext,
        values: &'a mut CallValues,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let (recv, send) = values
                .session()
                .and_then(StreamSession::split)
                .ok_or_else(|| ApiError::internal("stream session is not bound"))?;
            match (self.handler)(self.service.clone(), ctx.clone(), recv, send).await {
                Ok(()) | Err(StreamError::Closed) => Ok(()),
                Err(StreamError::Api(err)) => Err(err),
                Err(StreamError::Decode(err)) => Err(ApiError::bad_request(err.to_string())),
                Err(StreamError::Transport(reason)) => Err(ApiError::internal(reason)),
            }
        })
    }
}

/// Grouping of methods under one service name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service name, first path segment after the prefix and documentation tag
    pub name: String,
}

impl ServiceDescriptor {
    /// Create a descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Documentation tags for the service's operations
    pub fn tags(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

/// Validated, immutable description of one routable method
pub struct MethodDescriptor {
    /// Owning service
    pub service: Arc<ServiceDescriptor>,
    /// Method name
    pub method: String,
    /// Routed path: `prefix + Service + "/" + Method`
    pub path: String,
    /// Unary or stream
    pub kind: CallKind,
    /// Request shape (unary only)
    pub request: Option<Shape>,
    /// Response shape (unary only)
    pub response: Option<Shape>,
    /// Allocates values per call
    pub factory: Factory,
    /// Calls the implementation
    pub invoker: Arc<dyn Invoke>,
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("service", &self.service.name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}

impl MethodDescriptor {
    /// Validate `signature` and build the descriptor.
    ///
    /// The values allocated by `bound` must be of the declared types, and
    /// their encoded form must only carry keys the declared shapes name.
    pub fn build(
        service: Arc<ServiceDescriptor>,
        method: &str,
        prefix: &str,
        signature: Signature,
        bound: BoundMethod,
    ) -> Result<Self, ConfigError> {
        let path = format!("{}{}/{}", prefix, service.name, method);
        let invalid = |reason: String| ConfigError::InvalidSignature {
            method: format!("{}.{}", service.name, method),
            reason,
        };

        let Signature { params, outcomes } = signature;
        if params.len() != 3 {
            return Err(invalid(format!(
                "the number of arguments in {} should be 3 instead of {}",
                path,
                params.len()
            )));
        }
        if outcomes.len() != 1 {
            return Err(invalid(format!(
                "the number of return values in {} should be 1 instead of {}",
                path,
                outcomes.len()
            )));
        }
        if !matches!(params[0], Param::Context) {
            return Err(invalid(format!(
                "first argument in {} should be the call context",
                path
            )));
        }
        if !matches!(outcomes[0], OutcomeKind::Status) {
            return Err(invalid(format!("return type in {} should be a status", path)));
        }

        let (kind, request, response) = if method.starts_with(STREAM_PREFIX) {
            if !matches!(params[1], Param::Receive) {
                return Err(invalid(format!(
                    "the type of second argument in {} should be a receive stream",
                    path
                )));
            }
            if !matches!(params[2], Param::Send) {
                return Err(invalid(format!(
                    "the type of third argument in {} should be a send stream",
                    path
                )));
            }
            if !matches!((bound.factory)(), CallValues::Stream(_)) {
                return Err(invalid(format!("{} is bound to a unary implementation", path)));
            }
            (CallKind::Stream, None, None)
        } else {
            let request = object_param(&params[1]).ok_or_else(|| {
                invalid(format!(
                    "the type of second argument in {} should be an object",
                    path
                ))
            })?;
            let response = object_param(&params[2]).ok_or_else(|| {
                invalid(format!(
                    "the type of third argument in {} should be an object",
                    path
                ))
            })?;
            let CallValues::Unary {
                request: allocated_request,
                response: allocated_response,
            } = (bound.factory)()
            else {
                return Err(invalid(format!("{} is bound to a stream implementation", path)));
            };
            for (position, declared, allocated) in [
                ("second", &request, &allocated_request),
                ("third", &response, &allocated_response),
            ] {
                let actual = allocated.describe();
                if !same_object(declared, &actual) {
                    return Err(invalid(format!(
                        "the type of {} argument in {} is declared as {} but bound to {}",
                        position,
                        path,
                        object_name(declared),
                        object_name(&actual)
                    )));
                }
                if let Some(key) = undeclared_key(&**allocated) {
                    return Err(invalid(format!(
                        "{} encodes key {:?} that none of its declared fields names",
                        object_name(declared),
                        key
                    )));
                }
            }
            (CallKind::Unary, Some(request), Some(response))
        };

        Ok(Self {
            service,
            method: method.to_string(),
            path,
            kind,
            request,
            response,
            factory: bound.factory,
            invoker: bound.invoker,
        })
    }
}

fn object_param(param: &Param) -> Option<Shape> {
    match param {
        Param::Value(shape) if shape.is_object() => Some(shape.clone()),
        _ => None,
    }
}

fn object_name(shape: &Shape) -> &'static str {
    shape.as_object().map_or(shape.kind(), |object| object.name)
}

fn same_object(declared: &Shape, actual: &Shape) -> bool {
    match (declared.as_object(), actual.as_object()) {
        (Some(declared), Some(actual)) => declared.origin == actual.origin,
        _ => false,
    }
}

/// First key of the encoded default value without a declared field
fn undeclared_key(message: &dyn Message) -> Option<String> {
    let shape = message.describe();
    let object = shape.as_object()?;
    if object.opaque {
        return None;
    }
    let declared: HashSet<String> = flatten_fields(object)
        .ok()?
        .iter()
        .filter(|field| !field.is_private())
        .filter_map(|field| field.wire_name())
        .collect();
    match message.to_json().ok()? {
        serde_json::Value::Object(encoded) => encoded.keys().find(|key| !declared.contains(*key)).cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::memory::{memory_channel, PeerFrame};
    use apiserve_domain::Field;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct EchoRequest {
        text: String,
    }

    impl Shaped for EchoRequest {
        fn shape() -> Shape {
            Shape::object::<Self>("EchoRequest", || vec![Field::new::<String>("text")])
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct EchoReply {
        text: String,
    }

    impl Shaped for EchoReply {
        fn shape() -> Shape {
            Shape::object::<Self>("EchoReply", || vec![Field::new::<String>("text")])
        }
    }

    struct Echo;

    impl Echo {
        async fn echo(self: Arc<Self>, _ctx: CallContext, req: EchoRequest) -> Result<EchoReply, ApiError> {
            if req.text == "fail" {
                return Err(ApiError::new(409, "conflict"));
            }
            Ok(EchoReply { text: req.text })
        }

        async fn stream_echo(
            self: Arc<Self>,
            _ctx: CallContext,
            recv: RecvStream,
            send: SendStream,
        ) -> Result<(), StreamError> {
            loop {
                let message = recv.recv().await?;
                if &message[..] == b"boom" {
                    return Err(ApiError::internal("boom").into());
                }
                send.send(message).await?;
            }
        }
    }

    fn echo_service() -> Arc<ServiceDescriptor> {
        Arc::new(ServiceDescriptor::new("Echo"))
    }

    fn unary_bound() -> BoundMethod {
        BoundMethod::unary(Arc::new(Echo), Echo::echo)
    }

    fn stream_bound() -> BoundMethod {
        BoundMethod::stream(Arc::new(Echo), Echo::stream_echo)
    }

    fn build(method: &str, signature: Signature, bound: BoundMethod) -> Result<MethodDescriptor, ConfigError> {
        MethodDescriptor::build(echo_service(), method, "/api/", signature, bound)
    }

    fn reason(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidSignature { method, reason } => format!("{}: {}", method, reason),
            other => panic!("expected invalid signature, got {:?}", other),
        }
    }

    #[test]
    fn test_unary_descriptor() {
        let descriptor = build("Echo", Signature::unary::<EchoRequest, EchoReply>(), unary_bound()).unwrap();
        assert_eq!(descriptor.path, "/api/Echo/Echo");
        assert_eq!(descriptor.kind, CallKind::Unary);
        assert_eq!(descriptor.request.as_ref().and_then(|s| s.as_object()).map(|o| o.name), Some("EchoRequest"));
        assert!(matches!((descriptor.factory)(), CallValues::Unary { .. }));
    }

    #[test]
    fn test_stream_descriptor() {
        let descriptor = build("StreamEcho", Signature::stream(), stream_bound()).unwrap();
        assert_eq!(descriptor.kind, CallKind::Stream);
        assert!(descriptor.request.is_none());
        match (descriptor.factory)() {
            CallValues::Stream(session) => assert!(!session.is_bound()),
            CallValues::Unary { .. } => panic!("expected stream values"),
        }
    }

    #[test]
    fn test_wrong_param_count() {
        let signature = Signature {
            params: vec![Param::Context, Param::Value(EchoRequest::shape())],
            outcomes: vec![OutcomeKind::Status],
        };
        let message = reason(build("Echo", signature, unary_bound()).unwrap_err());
        assert!(message.starts_with("Echo.Echo"));
        assert!(message.contains("should be 3 instead of 2"));
    }

    #[test]
    fn test_wrong_outcome() {
        let signature = Signature {
            params: Signature::unary::<EchoRequest, EchoReply>().params,
            outcomes: vec![OutcomeKind::Value(EchoReply::shape())],
        };
        let message = reason(build("Echo", signature, unary_bound()).unwrap_err());
        assert!(message.contains("should be a status"));

        let signature = Signature {
            params: Signature::unary::<EchoRequest, EchoReply>().params,
            outcomes: vec![OutcomeKind::Status, OutcomeKind::Status],
        };
        let message = reason(build("Echo", signature, unary_bound()).unwrap_err());
        assert!(message.contains("should be 1 instead of 2"));
    }

    #[test]
    fn test_context_must_come_first() {
        let signature = Signature {
            params: vec![
                Param::Value(EchoRequest::shape()),
                Param::Context,
                Param::Value(EchoReply::shape()),
            ],
            outcomes: vec![OutcomeKind::Status],
        };
        let message = reason(build("Echo", signature, unary_bound()).unwrap_err());
        assert!(message.contains("first argument"));
    }

    #[test]
    fn test_stream_prefix_requires_stream_halves() {
        let message = reason(
            build("StreamEcho", Signature::unary::<EchoRequest, EchoReply>(), unary_bound()).unwrap_err(),
        );
        assert!(message.contains("receive stream"));
    }

    #[test]
    fn test_unary_requires_object_values() {
        let message = reason(build("Echo", Signature::unary::<String, EchoReply>(), unary_bound()).unwrap_err());
        assert!(message.contains("second argument"));

        let message = reason(build("Echo", Signature::stream(), stream_bound()).unwrap_err());
        assert!(message.contains("second argument"));
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct RenamedReply {
        #[serde(rename = "body")]
        text: String,
    }

    impl Shaped for RenamedReply {
        fn shape() -> Shape {
            Shape::object::<Self>("RenamedReply", || vec![Field::new::<String>("text")])
        }
    }

    #[test]
    fn test_declared_types_must_match_bound_types() {
        let message = reason(build("Echo", Signature::unary::<EchoReply, EchoReply>(), unary_bound()).unwrap_err());
        assert!(message.contains("second argument"));
        assert!(message.contains("declared as EchoReply but bound to EchoRequest"));

        let message = reason(build("Echo", Signature::unary::<EchoRequest, EchoRequest>(), unary_bound()).unwrap_err());
        assert!(message.contains("third argument"));
    }

    #[test]
    fn test_kind_must_match_bound_kind() {
        let message = reason(build("StreamEcho", Signature::stream(), unary_bound()).unwrap_err());
        assert!(message.contains("bound to a unary implementation"));
    }

    #[test]
    fn test_encoded_keys_must_be_declared() {
        let bound = BoundMethod::unary(Arc::new(Echo), |_: Arc<Echo>, _, req: EchoRequest| async move {
            Ok::<_, ApiError>(RenamedReply { text: req.text })
        });
        let message = reason(build("Echo", Signature::unary::<EchoRequest, RenamedReply>(), bound).unwrap_err());
        assert!(message.contains("RenamedReply encodes key \"body\""));
    }

    #[tokio::test]
    async fn test_unary_invoke_fills_response() {
        let descriptor = build("Echo", Signature::unary::<EchoRequest, EchoReply>(), unary_bound()).unwrap();
        let ctx = CallContext::for_method(&descriptor);
        let mut values = (descriptor.factory)();
        values
            .request_mut()
            .unwrap()
            .decode_from(br#"{"text":"hi"}"#)
            .unwrap();

        descriptor.invoker.invoke(&ctx, &mut values).await.unwrap();
        let reply = values.response().unwrap().downcast_ref::<EchoReply>().unwrap();
        assert_eq!(reply.text, "hi");
    }

    #[test]
    fn test_encoded_response_decodes_to_same_fields() {
        let mut sent: Box<dyn Message> = Box::new(EchoReply { text: "round".to_string() });
        let body = sent.encode().unwrap();

        let mut received: Box<dyn Message> = Box::new(EchoReply::default());
        received.decode_from(&body).unwrap();
        assert_eq!(received.downcast_ref::<EchoReply>().unwrap().text, "round");
        assert_eq!(sent.to_json().unwrap(), received.to_json().unwrap());
        assert!(sent.downcast_mut::<EchoRequest>().is_none());
    }

    #[tokio::test]
    async fn test_unary_invoke_passes_error_through() {
        let descriptor = build("Echo", Signature::unary::<EchoRequest, EchoReply>(), unary_bound()).unwrap();
        let ctx = CallContext::for_method(&descriptor);
        let mut values = (descriptor.factory)();
        values
            .request_mut()
            .unwrap()
            .decode_from(br#"{"text":"fail"}"#)
            .unwrap();

        let err = descriptor.invoker.invoke(&ctx, &mut values).await.unwrap_err();
        assert_eq!(err, ApiError::new(409, "conflict"));
    }

    #[tokio::test]
    async fn test_stream_peer_close_is_success() {
        let descriptor = build("StreamEcho", Signature::stream(), stream_bound()).unwrap();
        let ctx = CallContext::for_method(&descriptor);
        let mut values = (descriptor.factory)();
        let (source, sink, mut peer) = memory_channel();
        values.session_mut().unwrap().bind(source, sink);

        for text in ["a", "b", "c"] {
            peer.send(text);
        }
        peer.close();

        descriptor.invoker.invoke(&ctx, &mut values).await.unwrap();
        for text in ["a", "b", "c"] {
            assert_eq!(peer.next().await, Some(PeerFrame::Message(text.into())));
        }
    }

    #[tokio::test]
    async fn test_stream_api_error_passes_through() {
        let descriptor = build("StreamEcho", Signature::stream(), stream_bound()).unwrap();
        let ctx = CallContext::for_method(&descriptor);
        let mut values = (descriptor.factory)();
        let (source, sink, peer) = memory_channel();
        values.session_mut().unwrap().bind(source, sink);

        peer.send("boom");
        let err = descriptor.invoker.invoke(&ctx, &mut values).await.unwrap_err();
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn test_stream_unbound_session_fails() {
        let descriptor = build("StreamEcho", Signature::stream(), stream_bound()).unwrap();
        let ctx = CallContext::for_method(&descriptor);
        let mut values = (descriptor.factory)();
        assert!(descriptor.invoker.invoke(&ctx, &mut values).await.is_err());
    }
}
