use async_trait::async_trait;
use sttbridge_core::{AudioChunk, EgressSendError, IngressError, TranscriptResult};

/// Receive half of a client connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Next audio frame, or `None` once the client has disconnected cleanly.
    ///
    /// Must be cancel-safe: the session races it against backend completion.
    async fn next_frame(&mut self) -> Result<Option<AudioChunk>, IngressError>;
}

/// Send half of a client connection. Exactly one task owns it.
#[async_trait]
pub trait TranscriptSink: Send {
    async fn send_transcript(&mut self, transcript: &TranscriptResult)
        -> Result<(), EgressSendError>;

    /// Best-effort close once nothing more will be sent.
    async fn close(&mut self) {}
}
