//! Websocket binding for stream sessions

use crate::stream::{MessageSink, MessageSource, StreamError};
use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;

/// Close reasons longer than this do not fit in a control frame
const MAX_CLOSE_REASON: usize = 123;

/// Receive half of an upgraded websocket
pub struct WsSource {
    inner: SplitStream<WebSocket>,
}

impl WsSource {
    /// Wrap the receive half
    pub fn new(inner: SplitStream<WebSocket>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageSource for WsSource {
    async fn recv(&mut self) -> Result<Bytes, StreamError> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(Bytes::from(text)),
                Some(Ok(WsMessage::Binary(data))) => return Ok(Bytes::from(data)),
                // Control frames are answered by the transport
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => return Err(StreamError::Closed),
                Some(Err(err)) => return Err(StreamError::Transport(err.to_string())),
            }
        }
    }
}

/// Send half of an upgraded websocket
pub struct WsSink {
    inner: SplitSink<WebSocket, WsMessage>,
}

impl WsSink {
    /// Wrap the send half
    pub fn new(inner: SplitSink<WebSocket, WsMessage>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, payload: Bytes) -> Result<(), StreamError> {
        let message = match String::from_utf8(payload.to_vec()) {
            Ok(text) => WsMessage::Text(text),
            Err(err) => WsMessage::Binary(err.into_bytes()),
        };
        self.inner
            .send(message)
            .await
            .map_err(|err| StreamError::Transport(err.to_string()))
    }

    async fn close(&mut self, code: u16, reason: String) -> Result<(), StreamError> {
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(truncate_reason(reason)),
        };
        self.inner
            .send(WsMessage::Close(Some(frame)))
            .await
            .map_err(|err| StreamError::Transport(err.to_string()))
    }
}

fn truncate_reason(mut reason: String) -> String {
    if reason.len() > MAX_CLOSE_REASON {
        let mut end = MAX_CLOSE_REASON;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}
