//! Duplex stream sessions
//!
//! A [`StreamSession`] pairs a receive half and a send half bound to one
//! connection. Transports plug in through [`MessageSource`] and
//! [`MessageSink`]; the websocket binding lives in [`crate::ws`] and an
//! in-memory pair for tests in [`memory`].

use apiserve_domain::ApiError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Close code for a call that completed normally
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code for a call that failed
pub const CLOSE_ERROR: u16 = 1011;

/// Outcome of a stream operation
#[derive(Debug, Error)]
pub enum StreamError {
    /// The peer closed the stream; treated as a successful call
    #[error("stream closed by peer")]
    Closed,

    /// The transport failed
    #[error("stream transport error: {0}")]
    Transport(String),

    /// Application error reported to the peer in the close frame
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Message could not be decoded or encoded
    #[error("stream message codec error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Receiving end of a transport
#[async_trait]
pub trait MessageSource: Send {
    /// Next message; [`StreamError::Closed`] once the peer has closed
    async fn recv(&mut self) -> Result<Bytes, StreamError>;
}

/// Sending end of a transport
#[async_trait]
pub trait MessageSink: Send {
    /// Push one message
    async fn send(&mut self, payload: Bytes) -> Result<(), StreamError>;

    /// Close the stream with a status code and reason
    async fn close(&mut self, code: u16, reason: String) -> Result<(), StreamError>;
}

type SharedSource = Arc<Mutex<Box<dyn MessageSource>>>;
type SharedSink = Arc<Mutex<Box<dyn MessageSink>>>;

/// Stream allocated for one streaming call; unbound until the transport is
/// attached
#[derive(Default)]
pub struct StreamSession {
    source: Option<SharedSource>,
    sink: Option<SharedSink>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl StreamSession {
    /// Unbound session
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a transport
    pub fn bind<R, W>(&mut self, source: R, sink: W)
    where
        R: MessageSource + 'static,
        W: MessageSink + 'static,
    {
        let source: Box<dyn MessageSource> = Box::new(source);
        let sink: Box<dyn MessageSink> = Box::new(sink);
        self.source = Some(Arc::new(Mutex::new(source)));
        self.sink = Some(Arc::new(Mutex::new(sink)));
    }

    /// Whether a transport is attached
    pub fn is_bound(&self) -> bool {
        self.source.is_some() && self.sink.is_some()
    }

    /// Receive and send handles for the implementation
    pub fn split(&self) -> Option<(RecvStream, SendStream)> {
        let source = self.source.clone()?;
        let sink = self.sink.clone()?;
        Some((RecvStream { source }, SendStream { sink }))
    }

    /// Close the transport according to the call outcome: a normal close
    /// on success, an error close carrying the message otherwise
    pub async fn finish(&self, outcome: &Result<(), ApiError>) -> Result<(), StreamError> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };
        let mut sink = sink.lock().await;
        match outcome {
            Ok(()) => sink.close(CLOSE_NORMAL, String::new()).await,
            Err(err) => sink.close(CLOSE_ERROR, err.message.clone()).await,
        }
    }
}

/// Receive half handed to stream implementations
#[derive(Clone)]
pub struct RecvStream {
    source: SharedSource,
}

impl RecvStream {
    /// Next raw message
    pub async fn recv(&self) -> Result<Bytes, StreamError> {
        let mut source = self.source.lock().await;
        source.recv().await
    }

    /// Next message decoded from JSON
    pub async fn recv_json<T: DeserializeOwned>(&self) -> Result<T, StreamError> {
        let payload = self.recv().await?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

/// Send half handed to stream implementations
#[derive(Clone)]
pub struct SendStream {
    sink: SharedSink,
}

impl SendStream {
    /// Push a raw message
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<(), StreamError> {
        let mut sink = self.sink.lock().await;
        sink.send(payload.into()).await
    }

    /// Push a message encoded as JSON
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StreamError> {
        let payload = serde_json::to_vec(value)?;
        self.send(payload).await
    }
}

pub mod memory {
    //! In-memory transport backed by tokio channels

    use super::*;
    use tokio::sync::mpsc;

    /// Frame observed by the peer
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum PeerFrame {
        /// Message sent by the implementation
        Message(Bytes),
        /// Close frame
        Close {
            /// Close code
            code: u16,
            /// Close reason
            reason: String,
        },
    }

    /// Create a connected source/sink pair plus the remote peer driving it
    pub fn memory_channel() -> (MemorySource, MemorySink, MemoryPeer) {
        let (to_source, from_peer) = mpsc::unbounded_channel();
        let (to_peer, from_sink) = mpsc::unbounded_channel();
        (
            MemorySource { rx: from_peer },
            MemorySink {
                tx: to_peer,
                closed: false,
            },
            MemoryPeer {
                tx: Some(to_source),
                rx: from_sink,
            },
        )
    }

    /// Receive half fed by [`MemoryPeer::send`]
    pub struct MemorySource {
        rx: mpsc::UnboundedReceiver<Bytes>,
    }

    #[async_trait]
    impl MessageSource for MemorySource {
        async fn recv(&mut self) -> Result<Bytes, StreamError> {
            self.rx.recv().await.ok_or(StreamError::Closed)
        }
    }

    /// Send half observed through [`MemoryPeer::next`]
    pub struct MemorySink {
        tx: mpsc::UnboundedSender<PeerFrame>,
        closed: bool,
    }

    #[async_trait]
    impl MessageSink for MemorySink {
        async fn send(&mut self, payload: Bytes) -> Result<(), StreamError> {
            if self.closed {
                return Err(StreamError::Closed);
            }
            self.tx
                .send(PeerFrame::Message(payload))
                .map_err(|_| StreamError::Closed)
        }

        async fn close(&mut self, code: u16, reason: String) -> Result<(), StreamError> {
            self.closed = true;
            self.tx
                .send(PeerFrame::Close { code, reason })
                .map_err(|_| StreamError::Closed)
        }
    }

    /// Remote end of the in-memory transport
    pub struct MemoryPeer {
        tx: Option<mpsc::UnboundedSender<Bytes>>,
        rx: mpsc::UnboundedReceiver<PeerFrame>,
    }

    impl MemoryPeer {
        /// Deliver a message to the session; false once closed
        pub fn send(&self, payload: impl Into<Bytes>) -> bool {
            match &self.tx {
                Some(tx) => tx.send(payload.into()).is_ok(),
                None => false,
            }
        }

        /// Close the peer's sending direction
        pub fn close(&mut self) {
            self.tx = None;
        }

        /// Next frame sent by the session
        pub async fn next(&mut self) -> Option<PeerFrame> {
            self.rx.recv().await
        }
    }
}
