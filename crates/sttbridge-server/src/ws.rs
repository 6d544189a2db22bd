use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use sttbridge_bridge::{FrameSource, TranscriptSink};
use sttbridge_core::{AudioChunk, EgressSendError, IngressError, TranscriptResult};

/// Read half of a client WebSocket. Binary frames are audio; anything else
/// except Close is skipped.
pub struct WsFrameSource {
    inner: SplitStream<WebSocket>,
    session_id: u64,
}

impl WsFrameSource {
    pub fn new(inner: SplitStream<WebSocket>, session_id: u64) -> Self {
        Self { inner, session_id }
    }
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Result<Option<AudioChunk>, IngressError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    tracing::warn!(
                        session_id = self.session_id,
                        len = text.len(),
                        "unexpected text frame ignored"
                    );
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => return Err(IngressError::ReceiveFailed(e.to_string())),
            }
        }
    }
}

/// Write half of a client WebSocket. Each transcript is one JSON text frame.
pub struct WsTranscriptSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsTranscriptSink {
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TranscriptSink for WsTranscriptSink {
    async fn send_transcript(
        &mut self,
        transcript: &TranscriptResult,
    ) -> Result<(), EgressSendError> {
        let payload = serde_json::to_string(transcript)?;
        self.inner
            .send(Message::Text(payload))
            .await
            .map_err(|e| EgressSendError::ConnectionClosed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close().await {
            tracing::trace!("websocket close: {e}");
        }
    }
}
