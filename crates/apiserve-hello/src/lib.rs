//! Hello example service
//!
//! `Hello.SayHello` greets a required `name`; `Hello.StreamHello` answers the
//! first three messages of a websocket and then closes it.

#![warn(missing_docs)]

use apiserve_middleware::{Recover, Validator};
use apiserve_server::{
    ApiError, CallContext, Field, MethodSet, RecvStream, SendStream, ServeConfig, Server,
    ServerError, Service, Shape, Shaped, StreamError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Rounds answered by `StreamHello` before it closes
pub const STREAM_ROUNDS: usize = 3;

/// Path of the raw passthrough route
pub const RAW_PATH: &str = "/api/hello/raw";

/// Request of `SayHello`
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SayHelloRequest {
    /// Who to greet
    pub name: String,
}

impl Shaped for SayHelloRequest {
    fn shape() -> Shape {
        Shape::object::<Self>("SayHelloRequest", || {
            vec![Field::new::<String>("name")
                .required()
                .description("Required Name")]
        })
    }
}

/// Reply of `SayHello`
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SayHelloResponse {
    /// Greeting
    pub reply: String,
}

impl Shaped for SayHelloResponse {
    fn shape() -> Shape {
        Shape::object::<Self>("SayHelloResponse", || vec![Field::new::<String>("reply")])
    }
}

/// The example service
#[derive(Debug, Default)]
pub struct HelloService;

impl HelloService {
    /// Greet the caller
    pub async fn say_hello(
        self: Arc<Self>,
        _ctx: CallContext,
        req: SayHelloRequest,
    ) -> Result<SayHelloResponse, ApiError> {
        Ok(SayHelloResponse {
            reply: format!("Hello {}", req.name),
        })
    }

    /// Answer each message with a counted greeting, then close
    pub async fn stream_hello(
        self: Arc<Self>,
        ctx: CallContext,
        recv: RecvStream,
        send: SendStream,
    ) -> Result<(), StreamError> {
        for round in 1..=STREAM_ROUNDS {
            let message = recv.recv().await?;
            let name = String::from_utf8_lossy(&message);
            debug!("{} recv {}", ctx.request_id(), name);
            send.send(format!("hello {} {} times", name, round)).await?;
        }
        Ok(())
    }
}

impl Service for HelloService {
    fn name(&self) -> &str {
        "Hello"
    }

    fn methods(methods: &mut MethodSet<Self>) {
        methods
            .unary("SayHello", Self::say_hello)
            .stream("StreamHello", Self::stream_hello);
    }
}

/// Server with the recovery and validation interceptors, the Hello service
/// and a raw route
pub fn build_server(config: ServeConfig) -> Result<Server, ServerError> {
    let mut server = Server::new(config).with(Recover).with(Validator);
    server
        .register(HelloService)?
        .register_raw(RAW_PATH, || async { "HELLO RAW HTTP" })?;
    Ok(server)
}
